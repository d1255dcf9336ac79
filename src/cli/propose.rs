use alloy_primitives::Address;
use govdriver::chain::traits::{ChainProvider, GovernanceContract, RewardAllocator, VotingToken};
use govdriver::chain::{ProposalSpec, RpcClient, VoteSupport};
use govdriver::governance::{Clock, GovernanceDriver, RunOutcome, TokioClock};
use std::path::PathBuf;

use super::config::GovConfig;
use super::init_logging;

/// Propose adding the configured rewards vault to the friends of the chef
/// and drive the proposal through execution.
///
/// Safe to re-run at any point: an existing proposal is picked up where it
/// stands.
pub async fn execute(config: Option<PathBuf>, support: String) -> Result<(), Box<dyn std::error::Error>> {
    let support: VoteSupport = support.parse()?;
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

    println!("🏛️  Friends of the chef proposal");
    println!("   BeraChef: {}", chef);
    println!("   Vault:    {}", vault);
    println!("   Sender:   {}", client.sender());
    println!();

    drive(&driver, &client.bera_chef(chef), &spec, vault, client.sender(), support).await
}

/// Run the driver and report the outcome. Retryable timeouts and a lack of
/// voting power are reported, not returned as errors.
pub async fn drive<P, G, V, C, R>(
    driver: &GovernanceDriver<P, G, V, C>,
    chef: &R,
    spec: &ProposalSpec,
    vault: Address,
    voter: Address,
    support: VoteSupport,
) -> Result<(), Box<dyn std::error::Error>>
where
    P: ChainProvider,
    G: GovernanceContract,
    V: VotingToken,
    C: Clock,
    R: RewardAllocator,
{
    match driver.run(spec, voter, support).await {
        Ok(RunOutcome::Executed(id)) => {
            println!("✅ Proposal {} executed", id);

            let is_friend = chef.is_friend_of_the_chef(vault).await?;
            println!("   Is address friend of the chef: {}", is_friend);
            if !is_friend {
                println!("⚠️  The vault is still not a friend of the chef; check the proposal calldata");
            }
            Ok(())
        }
        Ok(RunOutcome::InsufficientVotingPower(snapshot)) => {
            println!("❌ Not enough voting power to create the proposal");
            println!("   Votes:     {} (block {})", snapshot.votes, snapshot.block);
            println!("   Threshold: {}", snapshot.threshold);
            println!("   Balance:   {}", snapshot.balance);
            println!("   Delegate:  {}", snapshot.delegatee);
            println!();
            println!("   Acquire more voting tokens, or have holders delegate to {}, then run propose again.", voter);
            Ok(())
        }
        Ok(RunOutcome::Closed { id, state }) => {
            Err(format!("Proposal {} is closed in state {}; nothing left to do", id, state).into())
        }
        Err(e) if e.is_retryable() => {
            println!("⏳ {}", e);
            println!("   Please try again in a few hours.");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;
    use govdriver::chain::{MockChain, ProposalState};
    use govdriver::governance::{ManualClock, PollPolicy};
    use std::time::Duration;
    use tempfile::TempDir;

    fn setup(chain: &MockChain) -> GovernanceDriver<MockChain, MockChain, MockChain, ManualClock> {
        GovernanceDriver::new(
            chain.clone(),
            chain.clone(),
            chain.clone(),
            ManualClock::new(),
            PollPolicy {
                interval: Duration::from_secs(60),
                active_timeout: Some(Duration::from_secs(3600)),
            },
        )
    }

    fn spec() -> (ProposalSpec, Address) {
        let chef = Address::repeat_byte(0xc4);
        let vault = Address::repeat_byte(0xa5);
        (ProposalSpec::update_friends_of_the_chef(chef, vault, true), vault)
    }

    #[tokio::test]
    async fn test_drive_executes_and_verifies_friend() {
        let chain = MockChain::default();
        let me = chain.sender();
        let (spec, vault) = spec();
        let id = chain.insert_proposal(&spec, ProposalState::Succeeded);
        let driver = setup(&chain);

        drive(&driver, &chain, &spec, vault, me, VoteSupport::For)
            .await
            .unwrap();

        assert_eq!(chain.state(id).await.unwrap(), ProposalState::Executed);
        assert!(chain.is_friend(vault));
    }

    #[tokio::test]
    async fn test_drive_insufficient_power_is_not_an_error() {
        let chain = MockChain::default();
        let me = chain.sender();
        chain.set_threshold(U256::from(100u64));
        let (spec, vault) = spec();
        let driver = setup(&chain);

        drive(&driver, &chain, &spec, vault, me, VoteSupport::For)
            .await
            .unwrap();

        assert_eq!(chain.counters().proposals, 0);
    }

    #[tokio::test]
    async fn test_drive_timeout_is_not_an_error() {
        let chain = MockChain::default();
        let me = chain.sender();
        let (spec, vault) = spec();
        chain.insert_proposal(&spec, ProposalState::Pending);
        let driver = setup(&chain);

        drive(&driver, &chain, &spec, vault, me, VoteSupport::For)
            .await
            .unwrap();

        assert_eq!(chain.counters().votes, 0);
    }

    #[tokio::test]
    async fn test_drive_closed_proposal_is_an_error() {
        let chain = MockChain::default();
        let me = chain.sender();
        let (spec, vault) = spec();
        chain.insert_proposal(&spec, ProposalState::Defeated);
        let driver = setup(&chain);

        let err = drive(&driver, &chain, &spec, vault, me, VoteSupport::For)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Defeated"));
    }

    #[tokio::test]
    async fn test_execute_rejects_invalid_support() {
        let err = execute(None, "maybe".to_string()).await.unwrap_err();
        assert!(err.to_string().contains("maybe"));
    }

    #[tokio::test]
    async fn test_execute_reports_missing_address() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[rpc]\nurl = \"http://127.0.0.1:9\"\nsender = \"0x00000000000000000000000000000000000000aa\"\n",
        )
        .unwrap();

        let err = execute(Some(path), "for".to_string()).await.unwrap_err();
        assert!(err.to_string().contains("contracts."));
    }
}
