use alloy_primitives::{Address, B256, U256, hex, keccak256};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::RelayError;
use crate::event::MatchEvent;

/// The remote chain node, reduced to the calls the relayer needs. The match
/// contract itself is an opaque service behind these entry points.
#[async_trait]
pub trait ChainEndpoint: Send + Sync {
    /// Confirmed transaction count for an account at the latest block.
    async fn transaction_count(&self, address: Address) -> Result<u64, RelayError>;

    /// Submits one `recordMatch(x, y, candyType)` transaction with an
    /// explicit nonce and returns its hash without awaiting confirmation.
    async fn record_match(
        &self,
        from: Address,
        nonce: u64,
        event: &MatchEvent,
    ) -> Result<B256, RelayError>;

    /// Authoritative on-chain score for a player.
    async fn player_score(&self, player: Address) -> Result<U256, RelayError>;

    /// Authoritative number of matches recorded for a player.
    async fn matches_made(&self, player: Address) -> Result<U256, RelayError>;
}

/// JSON-RPC 2.0 client for the configured node URL.
pub struct HttpEndpoint {
    client: reqwest::Client,
    url: String,
    contract: Address,
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    #[allow(dead_code)]
    code: i64,
    message: String,
}

impl HttpEndpoint {
    pub fn new(url: impl Into<String>, contract: Address) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            contract,
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, RelayError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response: RpcResponse = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::Rpc(e.to_string()))?
            .json()
            .await
            .map_err(|e| RelayError::Rpc(e.to_string()))?;

        if let Some(error) = response.error {
            return Err(RelayError::from_rpc_message(&error.message));
        }
        response
            .result
            .ok_or_else(|| RelayError::Rpc("empty rpc result".into()))
    }

    async fn read_u256(&self, calldata: Vec<u8>) -> Result<U256, RelayError> {
        let result = self
            .call(
                "eth_call",
                json!([{ "to": self.contract, "data": hex_data(&calldata) }, "latest"]),
            )
            .await?;
        parse_u256(&result)
    }
}

#[async_trait]
impl ChainEndpoint for HttpEndpoint {
    async fn transaction_count(&self, address: Address) -> Result<u64, RelayError> {
        let result = self
            .call("eth_getTransactionCount", json!([address, "latest"]))
            .await?;
        parse_u64(&result)
    }

    async fn record_match(
        &self,
        from: Address,
        nonce: u64,
        event: &MatchEvent,
    ) -> Result<B256, RelayError> {
        let params = json!([{
            "from": from,
            "to": self.contract,
            "data": hex_data(&record_match_calldata(event)),
            "nonce": format!("{nonce:#x}"),
        }]);
        let result = self.call("eth_sendTransaction", params).await?;
        parse_hash(&result)
    }

    async fn player_score(&self, player: Address) -> Result<U256, RelayError> {
        self.read_u256(player_query_calldata("getPlayerScore(address)", player))
            .await
    }

    async fn matches_made(&self, player: Address) -> Result<U256, RelayError> {
        self.read_u256(player_query_calldata("getMatchesMade(address)", player))
            .await
    }
}

fn selector(signature: &str) -> [u8; 4] {
    let digest = keccak256(signature.as_bytes());
    [digest[0], digest[1], digest[2], digest[3]]
}

fn record_match_calldata(event: &MatchEvent) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 32 * 3);
    data.extend_from_slice(&selector("recordMatch(uint8,uint8,uint8)"));
    for value in [event.x, event.y, event.candy_type] {
        data.extend_from_slice(&U256::from(value).to_be_bytes::<32>());
    }
    data
}

fn player_query_calldata(signature: &str, player: Address) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 32);
    data.extend_from_slice(&selector(signature));
    data.extend_from_slice(&[0u8; 12]);
    data.extend_from_slice(player.as_slice());
    data
}

fn hex_data(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

fn quantity(value: &Value) -> Result<&str, RelayError> {
    value
        .as_str()
        .ok_or_else(|| RelayError::Rpc(format!("unexpected rpc result: {value}")))
}

fn parse_u64(value: &Value) -> Result<u64, RelayError> {
    let text = quantity(value)?;
    u64::from_str_radix(text.trim_start_matches("0x"), 16)
        .map_err(|e| RelayError::Rpc(format!("bad quantity {text}: {e}")))
}

fn parse_u256(value: &Value) -> Result<U256, RelayError> {
    let text = quantity(value)?;
    U256::from_str_radix(text.trim_start_matches("0x"), 16)
        .map_err(|e| RelayError::Rpc(format!("bad quantity {text}: {e}")))
}

fn parse_hash(value: &Value) -> Result<B256, RelayError> {
    let text = quantity(value)?;
    text.parse()
        .map_err(|e| RelayError::Rpc(format!("bad transaction hash {text}: {e}")))
}
