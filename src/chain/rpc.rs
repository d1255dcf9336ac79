//! Ethereum JSON-RPC backend for the chain traits.
//!
//! Reads go through `eth_call` against `latest`. Transactions are submitted
//! with `eth_sendTransaction` from the configured sender, so signing stays
//! with the node or the signing proxy in front of it.

use super::abi::{self, IBeraChef, IGovernor, IRewardsVaultFactory, ITimelock, IVotesToken};
use super::traits::*;
use super::types::*;
use alloy_primitives::{Address, Bytes, B256, U256, U64};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Transport settings for [`RpcClient`].
#[derive(Debug, Clone)]
pub struct RpcSettings {
    pub url: String,
    /// Account transactions are sent from.
    pub sender: Address,
    pub receipt_interval: Duration,
    pub receipt_timeout: Duration,
}

/// Shared JSON-RPC connection.
#[derive(Clone)]
pub struct RpcClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    settings: RpcSettings,
    next_id: AtomicU64,
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    data: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: B256,
    block_number: U64,
    status: Option<U64>,
}

#[derive(Deserialize)]
struct RpcTransaction {
    from: Address,
    to: Option<Address>,
    input: Bytes,
}

impl RpcClient {
    pub fn new(settings: RpcSettings) -> ChainResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ChainError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                settings,
                next_id: AtomicU64::new(1),
            }),
        })
    }

    pub fn sender(&self) -> Address {
        self.inner.settings.sender
    }

    pub fn governor(&self, address: Address) -> RpcGovernor {
        RpcGovernor {
            client: self.clone(),
            address,
        }
    }

    pub fn voting_token(&self, address: Address) -> RpcVotingToken {
        RpcVotingToken {
            client: self.clone(),
            address,
        }
    }

    pub fn vault_factory(&self, address: Address) -> RpcVaultFactory {
        RpcVaultFactory {
            client: self.clone(),
            address,
        }
    }

    pub fn bera_chef(&self, address: Address) -> RpcBeraChef {
        RpcBeraChef {
            client: self.clone(),
            address,
        }
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> ChainResult<T> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(method, id, "rpc request");

        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response: RpcResponse = self
            .inner
            .http
            .post(&self.inner.settings.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChainError::Transport(format!("{} failed: {}", method, e)))?
            .error_for_status()
            .map_err(|e| ChainError::Transport(format!("{} failed: {}", method, e)))?
            .json()
            .await
            .map_err(|e| ChainError::Decode(format!("{} response: {}", method, e)))?;

        if let Some(error) = response.error {
            return Err(classify_rpc_error(method, error));
        }

        let result = response.result.unwrap_or(Value::Null);
        serde_json::from_value(result)
            .map_err(|e| ChainError::Decode(format!("{} result: {}", method, e)))
    }

    async fn call_raw(&self, to: Address, data: Vec<u8>, block: Value) -> ChainResult<Vec<u8>> {
        let output: Bytes = self
            .request(
                "eth_call",
                json!([{ "to": to, "data": Bytes::from(data) }, block]),
            )
            .await?;
        Ok(output.to_vec())
    }

    /// `eth_call` a view function and decode its return values.
    async fn view<C: SolCall>(&self, to: Address, call: C) -> ChainResult<C::Return> {
        let output = self.call_raw(to, call.abi_encode(), json!("latest")).await?;
        C::abi_decode_returns(&output, true)
            .map_err(|e| ChainError::Decode(format!("{}: {}", C::SIGNATURE, e)))
    }

    /// Submit a state-changing call from the sender account.
    async fn send<C: SolCall>(&self, to: Address, call: C) -> ChainResult<TxHandle> {
        let hash: B256 = self
            .request(
                "eth_sendTransaction",
                json!([{
                    "from": self.inner.settings.sender,
                    "to": to,
                    "data": Bytes::from(call.abi_encode()),
                }]),
            )
            .await?;
        debug!(signature = C::SIGNATURE, tx = %hash, "transaction submitted");
        Ok(TxHandle { hash })
    }

    /// Re-run a failed transaction as a call at its block to recover the
    /// revert payload.
    async fn replay_revert(&self, hash: B256, block: u64) -> Vec<u8> {
        let tx: Option<RpcTransaction> = match self
            .request("eth_getTransactionByHash", json!([hash]))
            .await
        {
            Ok(tx) => tx,
            Err(e) => {
                warn!(tx = %hash, error = %e, "could not fetch reverted transaction");
                return Vec::new();
            }
        };
        let Some(tx) = tx else {
            return Vec::new();
        };
        let Some(to) = tx.to else {
            return Vec::new();
        };

        let replay: ChainResult<Bytes> = self
            .request(
                "eth_call",
                json!([
                    { "from": tx.from, "to": to, "data": tx.input },
                    U64::from(block),
                ]),
            )
            .await;
        match replay {
            Err(ChainError::Reverted { data, .. }) => data,
            _ => Vec::new(),
        }
    }
}

/// Map a JSON-RPC error object onto the chain error taxonomy.
///
/// Revert payloads arrive hex-encoded in `data`, either as a bare string or
/// nested as `{ "data": "0x..." }` depending on the node.
fn classify_rpc_error(method: &str, error: RpcErrorObject) -> ChainError {
    let payload = error.data.as_ref().and_then(|data| match data {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => map.get("data").and_then(Value::as_str),
        _ => None,
    });

    if let Some(bytes) = payload.and_then(|s| hex::decode(s.trim_start_matches("0x")).ok()) {
        return ChainError::reverted(bytes);
    }

    // code 3 is "execution reverted" without a decodable payload
    if error.code == 3 || error.message.contains("revert") {
        return ChainError::Reverted {
            reason: Some(error.message),
            data: Vec::new(),
        };
    }

    ChainError::Transport(format!(
        "{} returned error {}: {}",
        method, error.code, error.message
    ))
}

#[async_trait]
impl ChainProvider for RpcClient {
    async fn block_number(&self) -> ChainResult<u64> {
        let number: U64 = self.request("eth_blockNumber", json!([])).await?;
        Ok(number.to::<u64>())
    }

    async fn wait_for_confirmation(&self, tx: TxHandle) -> ChainResult<Receipt> {
        let started = Instant::now();
        let settings = &self.inner.settings;

        loop {
            let receipt: Option<RpcReceipt> = self
                .request("eth_getTransactionReceipt", json!([tx.hash]))
                .await?;

            if let Some(receipt) = receipt {
                let block_number = receipt.block_number.to::<u64>();
                let success = receipt.status.map(|s| s == U64::from(1)).unwrap_or(true);
                if !success {
                    let data = self.replay_revert(tx.hash, block_number).await;
                    return Err(ChainError::reverted(data));
                }
                return Ok(Receipt {
                    transaction_hash: receipt.transaction_hash,
                    block_number,
                    success,
                });
            }

            if started.elapsed() >= settings.receipt_timeout {
                return Err(ChainError::Transport(format!(
                    "transaction {} not mined after {}",
                    tx.hash,
                    humantime::format_duration(settings.receipt_timeout)
                )));
            }
            tokio::time::sleep(settings.receipt_interval).await;
        }
    }
}

/// Governor contract over JSON-RPC.
#[derive(Clone)]
pub struct RpcGovernor {
    client: RpcClient,
    address: Address,
}

#[async_trait]
impl GovernanceContract for RpcGovernor {
    type Timelock = RpcTimelock;

    async fn hash_proposal(&self, spec: &ProposalSpec) -> ChainResult<ProposalId> {
        let ret = self
            .client
            .view(
                self.address,
                IGovernor::hashProposalCall {
                    targets: spec.targets().to_vec(),
                    values: spec.values().to_vec(),
                    calldatas: spec.calldatas().to_vec(),
                    descriptionHash: spec.description_hash(),
                },
            )
            .await?;
        Ok(ProposalId(ret.proposalId))
    }

    async fn state(&self, id: ProposalId) -> ChainResult<ProposalState> {
        let result = self
            .client
            .view(self.address, IGovernor::stateCall { proposalId: id.0 })
            .await;

        match result {
            Ok(ret) => ProposalState::from_u8(ret.proposalState).ok_or_else(|| {
                ChainError::Decode(format!("unknown proposal state {}", ret.proposalState))
            }),
            Err(ChainError::Reverted { data, .. }) if abi::nonexistent_proposal(&data).is_some() => {
                Err(ChainError::ProposalNotFound(id))
            }
            Err(e) => Err(e),
        }
    }

    async fn propose(&self, spec: &ProposalSpec) -> ChainResult<TxHandle> {
        self.client
            .send(
                self.address,
                IGovernor::proposeCall {
                    targets: spec.targets().to_vec(),
                    values: spec.values().to_vec(),
                    calldatas: spec.calldatas().to_vec(),
                    description: spec.description().to_string(),
                },
            )
            .await
    }

    async fn cast_vote(&self, id: ProposalId, support: VoteSupport) -> ChainResult<TxHandle> {
        self.client
            .send(
                self.address,
                IGovernor::castVoteCall {
                    proposalId: id.0,
                    support: support.as_u8(),
                },
            )
            .await
    }

    async fn has_voted(&self, id: ProposalId, voter: Address) -> ChainResult<bool> {
        let ret = self
            .client
            .view(
                self.address,
                IGovernor::hasVotedCall {
                    proposalId: id.0,
                    account: voter,
                },
            )
            .await?;
        Ok(ret.voted)
    }

    async fn queue(&self, spec: &ProposalSpec, description_hash: B256) -> ChainResult<TxHandle> {
        self.client
            .send(
                self.address,
                IGovernor::queueCall {
                    targets: spec.targets().to_vec(),
                    values: spec.values().to_vec(),
                    calldatas: spec.calldatas().to_vec(),
                    descriptionHash: description_hash,
                },
            )
            .await
    }

    async fn execute(
        &self,
        spec: &ProposalSpec,
        description_hash: B256,
    ) -> ChainResult<TxHandle> {
        self.client
            .send(
                self.address,
                IGovernor::executeCall {
                    targets: spec.targets().to_vec(),
                    values: spec.values().to_vec(),
                    calldatas: spec.calldatas().to_vec(),
                    descriptionHash: description_hash,
                },
            )
            .await
    }

    async fn voting_delay(&self) -> ChainResult<U256> {
        let ret = self
            .client
            .view(self.address, IGovernor::votingDelayCall {})
            .await?;
        Ok(ret.delay)
    }

    async fn voting_period(&self) -> ChainResult<U256> {
        let ret = self
            .client
            .view(self.address, IGovernor::votingPeriodCall {})
            .await?;
        Ok(ret.period)
    }

    async fn proposal_threshold(&self) -> ChainResult<U256> {
        let ret = self
            .client
            .view(self.address, IGovernor::proposalThresholdCall {})
            .await?;
        Ok(ret.threshold)
    }

    async fn get_votes(&self, voter: Address, block: u64) -> ChainResult<U256> {
        let ret = self
            .client
            .view(
                self.address,
                IGovernor::getVotesCall {
                    account: voter,
                    timepoint: U256::from(block),
                },
            )
            .await?;
        Ok(ret.votes)
    }

    async fn timelock(&self) -> ChainResult<Self::Timelock> {
        let ret = self
            .client
            .view(self.address, IGovernor::timelockCall {})
            .await?;
        Ok(RpcTimelock {
            client: self.client.clone(),
            address: ret.timelockAddress,
        })
    }
}

/// Timelock controller over JSON-RPC.
#[derive(Clone)]
pub struct RpcTimelock {
    client: RpcClient,
    address: Address,
}

#[async_trait]
impl TimelockContract for RpcTimelock {
    async fn min_delay(&self) -> ChainResult<u64> {
        let ret = self
            .client
            .view(self.address, ITimelock::getMinDelayCall {})
            .await?;
        u64::try_from(ret.minDelay)
            .map_err(|_| ChainError::Decode(format!("timelock delay {} overflows", ret.minDelay)))
    }
}

/// Delegable voting token over JSON-RPC.
#[derive(Clone)]
pub struct RpcVotingToken {
    client: RpcClient,
    address: Address,
}

#[async_trait]
impl VotingToken for RpcVotingToken {
    async fn balance_of(&self, account: Address) -> ChainResult<U256> {
        let ret = self
            .client
            .view(self.address, IVotesToken::balanceOfCall { account })
            .await?;
        Ok(ret.balance)
    }

    async fn delegates(&self, account: Address) -> ChainResult<Address> {
        let ret = self
            .client
            .view(self.address, IVotesToken::delegatesCall { account })
            .await?;
        Ok(ret.delegatee)
    }

    async fn delegate(&self, delegatee: Address) -> ChainResult<TxHandle> {
        self.client
            .send(self.address, IVotesToken::delegateCall { delegatee })
            .await
    }
}

/// Rewards vault factory over JSON-RPC.
#[derive(Clone)]
pub struct RpcVaultFactory {
    client: RpcClient,
    address: Address,
}

#[async_trait]
impl VaultFactory for RpcVaultFactory {
    async fn create_rewards_vault(&self, token: Address) -> ChainResult<TxHandle> {
        self.client
            .send(
                self.address,
                IRewardsVaultFactory::createRewardsVaultCall {
                    stakingToken: token,
                },
            )
            .await
    }

    async fn predict_rewards_vault_address(&self, token: Address) -> ChainResult<Address> {
        let ret = self
            .client
            .view(
                self.address,
                IRewardsVaultFactory::predictRewardsVaultAddressCall {
                    stakingToken: token,
                },
            )
            .await?;
        Ok(ret.vault)
    }
}

/// BeraChef reward allocator over JSON-RPC.
#[derive(Clone)]
pub struct RpcBeraChef {
    client: RpcClient,
    address: Address,
}

#[async_trait]
impl RewardAllocator for RpcBeraChef {
    async fn is_friend_of_the_chef(&self, vault: Address) -> ChainResult<bool> {
        let ret = self
            .client
            .view(
                self.address,
                IBeraChef::isFriendOfTheChefCall { receiver: vault },
            )
            .await?;
        Ok(ret.isFriend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_sol_types::SolError;

    fn error(code: i64, message: &str, data: Option<Value>) -> RpcErrorObject {
        RpcErrorObject {
            code,
            message: message.to_string(),
            data,
        }
    }

    #[test]
    fn test_classify_nonexistent_proposal_payload() {
        let payload = IGovernor::GovernorNonexistentProposal {
            proposalId: U256::from(9u64),
        }
        .abi_encode();
        let data = json!(format!("0x{}", hex::encode(&payload)));

        match classify_rpc_error("eth_call", error(3, "execution reverted", Some(data))) {
            ChainError::Reverted { data, .. } => {
                assert_eq!(abi::nonexistent_proposal(&data), Some(U256::from(9u64)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_classify_nested_payload() {
        let payload = IGovernor::GovernorAlreadyCastVote {
            voter: Address::ZERO,
        }
        .abi_encode();
        let data = json!({ "data": format!("0x{}", hex::encode(&payload)) });

        match classify_rpc_error("eth_sendTransaction", error(-32000, "reverted", Some(data))) {
            ChainError::Reverted { reason, .. } => {
                assert!(reason.unwrap().starts_with("GovernorAlreadyCastVote"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_classify_revert_without_payload() {
        let err = classify_rpc_error("eth_call", error(3, "execution reverted", None));
        assert_eq!(
            err,
            ChainError::Reverted {
                reason: Some("execution reverted".to_string()),
                data: vec![],
            }
        );
    }

    #[test]
    fn test_classify_node_failure_is_transport() {
        let err = classify_rpc_error("eth_blockNumber", error(-32603, "internal error", None));
        assert!(matches!(err, ChainError::Transport(msg) if msg.contains("internal error")));
    }

    #[test]
    fn test_receipt_deserializes_node_json() {
        let value = json!({
            "transactionHash": "0x1111111111111111111111111111111111111111111111111111111111111111",
            "blockNumber": "0x1b4",
            "status": "0x1",
            "gasUsed": "0x5208",
        });
        let receipt: RpcReceipt = serde_json::from_value(value).unwrap();
        assert_eq!(receipt.block_number.to::<u64>(), 436);
        assert_eq!(receipt.status, Some(U64::from(1)));
    }

    #[tokio::test]
    async fn test_unreachable_node_is_transport_error() {
        let client = RpcClient::new(RpcSettings {
            url: "http://127.0.0.1:9".to_string(),
            sender: Address::ZERO,
            receipt_interval: Duration::from_millis(10),
            receipt_timeout: Duration::from_millis(10),
        })
        .unwrap();

        let result = client.block_number().await;
        assert!(matches!(result, Err(ChainError::Transport(_))));
    }
}
