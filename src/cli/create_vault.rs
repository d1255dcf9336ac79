use govdriver::chain::RpcClient;
use govdriver::vault::create_rewards_vault;
use std::path::PathBuf;

use super::config::{parse_address, GovConfig};
use super::init_logging;

/// Create a rewards vault for the staking token through the vault factory
pub async fn execute(
    config: Option<PathBuf>,
    token: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = GovConfig::resolve(config.as_deref())?;
    init_logging(&config.logging.level);

    let token = match token {
        Some(token) => parse_address("--token", &token)?,
        None => config.token()?,
    };
    let factory_address = config.vault_factory()?;

    let client = RpcClient::new(config.rpc_settings()?)?;
    let factory = client.vault_factory(factory_address);

    println!("🏗️  Creating rewards vault");
    println!("   Factory: {}", factory_address);
    println!("   Token:   {}", token);

    let vault = create_rewards_vault(&client, &factory, token).await?;

    println!("✅ Rewards vault created at {}", vault);
    println!("   Set contracts.rewards_vault (or REWARDS_VAULT_ADDRESS) to this address before running propose.");
    Ok(())
}
