use alloy_primitives::Address;
use govdriver::chain::traits::{ChainProvider, GovernanceContract, RewardAllocator, VotingToken};
use govdriver::chain::{ProposalSpec, RpcClient};
use govdriver::governance::{Clock, GovernanceDriver, TokioClock};
use std::path::PathBuf;

use super::config::GovConfig;
use super::init_logging;

/// Show the friends-of-the-chef proposal state and the sender's voting power
///
/// Read-only: nothing is proposed, delegated or voted.
pub async fn execute(config: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = GovConfig::resolve(config.as_deref())?;
    init_logging(&config.logging.level);

    let client = RpcClient::new(config.rpc_settings()?)?;
    let chef = config.berachef()?;
    let vault = config.rewards_vault()?;

    let driver = GovernanceDriver::new(
        client.clone(),
        client.governor(config.governance()?),
        client.voting_token(config.voting_token()?),
        TokioClock::new(),
        config.poll_policy()?,
    );
    let spec = ProposalSpec::update_friends_of_the_chef(chef, vault, true);

    let lines = report(&driver, &client.bera_chef(chef), &spec, vault, client.sender()).await?;
    println!("📊 govdriver status");
    println!();
    for line in lines {
        println!("{}", line);
    }
    Ok(())
}

/// Collect the status lines for `spec`.
pub async fn report<P, G, V, C, R>(
    driver: &GovernanceDriver<P, G, V, C>,
    chef: &R,
    spec: &ProposalSpec,
    vault: Address,
    voter: Address,
) -> Result<Vec<String>, Box<dyn std::error::Error>>
where
    P: ChainProvider,
    G: GovernanceContract,
    V: VotingToken,
    C: Clock,
    R: RewardAllocator,
{
    let mut lines = Vec::new();

    let (id, state) = driver.proposal_status(spec).await?;
    lines.push(format!("  Proposal:  {}", id));
    match state {
        Some(state) => lines.push(format!("  State:     {}", state)),
        None => lines.push("  State:     not proposed yet".to_string()),
    }

    let (delay, period) = driver.voting_schedule().await?;
    lines.push(format!("  Voting:    delay {} blocks, period {} blocks", delay, period));

    let power = driver.voting_power(voter).await?;
    let marker = if power.meets_threshold() { "✅" } else { "❌" };
    lines.push(format!("  Voter:     {}", voter));
    lines.push(format!("  Delegate:  {}", power.delegatee));
    lines.push(format!("  Balance:   {}", power.balance));
    lines.push(format!(
        "  Votes:     {} {} (threshold {}, block {})",
        power.votes, marker, power.threshold, power.block
    ));

    let is_friend = chef.is_friend_of_the_chef(vault).await?;
    lines.push(format!("  Vault:     {} (friend of the chef: {})", vault, is_friend));

    Ok(lines)
}
