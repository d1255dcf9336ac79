//! Rewards vault creation through the vault factory.

use alloy_primitives::Address;
use tracing::info;

use crate::chain::traits::{ChainProvider, ChainResult, VaultFactory};

/// Deploy a rewards vault for `token` and return its address.
pub async fn create_rewards_vault<P, F>(provider: &P, factory: &F, token: Address) -> ChainResult<Address>
where
    P: ChainProvider,
    F: VaultFactory,
{
    info!(token = %token, "creating rewards vault");
    let tx = factory.create_rewards_vault(token).await?;
    let receipt = provider.wait_for_confirmation(tx).await?;

    let vault = factory.predict_rewards_vault_address(token).await?;
    info!(token = %token, vault = %vault, block = receipt.block_number, "rewards vault created");
    Ok(vault)
}

/// Address the factory deploys (or deployed) the vault for `token` at.
pub async fn predict_rewards_vault<F: VaultFactory>(factory: &F, token: Address) -> ChainResult<Address> {
    factory.predict_rewards_vault_address(token).await
}
