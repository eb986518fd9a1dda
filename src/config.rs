use std::env;
use std::str::FromStr;
use std::time::Duration;

use alloy_primitives::Address;
use anyhow::{Context, anyhow};

use crate::error::RelayError;
use crate::queue::BatchPolicy;
use crate::signer::Signer;
use crate::submit::SubmitPolicy;

const DEFAULT_RPC_URL: &str = "https://testnet-rpc.monad.xyz";
const DEFAULT_BATCH_SIZE: usize = 15;
const DEFAULT_BATCH_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_SEND_DELAY_MS: u64 = 200;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_HASH_CAP: usize = 50;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub rpc_url: String,
    pub contract: Option<Address>,
    pub signers: Vec<Signer>,
    pub batch_size: usize,
    pub batch_timeout: Duration,
    pub send_delay: Duration,
    pub retry_backoff: Duration,
    pub max_attempts: u32,
    pub hash_cap: usize,
    pub bind_addr: String,
}

impl RelayConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            rpc_url: env::var("MONAD_RPC_URL").unwrap_or_else(|_| DEFAULT_RPC_URL.into()),
            contract: match env::var("MATCH_CONTRACT_ADDRESS") {
                Ok(raw) => Some(
                    raw.trim()
                        .parse()
                        .context("invalid MATCH_CONTRACT_ADDRESS")?,
                ),
                Err(_) => None,
            },
            signers: parse_signers(&env::var("RELAY_SIGNERS").unwrap_or_default())?,
            batch_size: parse_or("RELAY_BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
            batch_timeout: Duration::from_millis(parse_or(
                "RELAY_BATCH_TIMEOUT_MS",
                DEFAULT_BATCH_TIMEOUT_MS,
            )?),
            send_delay: Duration::from_millis(parse_or(
                "RELAY_SEND_DELAY_MS",
                DEFAULT_SEND_DELAY_MS,
            )?),
            retry_backoff: Duration::from_millis(parse_or(
                "RELAY_RETRY_BACKOFF_MS",
                DEFAULT_RETRY_BACKOFF_MS,
            )?),
            max_attempts: parse_or("RELAY_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?,
            hash_cap: parse_or("RELAY_HASH_CAP", DEFAULT_HASH_CAP)?,
            bind_addr: env::var("RELAY_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.into()),
        })
    }

    /// Configuration errors are fatal for the whole subsystem and surfaced
    /// before anything is queued.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.signers.is_empty() {
            return Err(RelayError::NoSigner);
        }
        if self.contract.is_none() {
            return Err(RelayError::ContractUnresolved);
        }
        if self.batch_size == 0 {
            return Err(RelayError::Config("batch size must be positive".into()));
        }
        if self.max_attempts == 0 {
            return Err(RelayError::Config("max attempts must be positive".into()));
        }
        Ok(())
    }

    pub fn batch_policy(&self) -> BatchPolicy {
        BatchPolicy {
            batch_size: self.batch_size,
            batch_timeout: self.batch_timeout,
        }
    }

    pub fn submit_policy(&self) -> SubmitPolicy {
        SubmitPolicy {
            max_attempts: self.max_attempts,
            retry_backoff: self.retry_backoff,
            send_delay: self.send_delay,
        }
    }
}

/// `RELAY_SIGNERS` is a comma-separated list of `<private_key>:<address>`
/// pairs.
fn parse_signers(raw: &str) -> anyhow::Result<Vec<Signer>> {
    let mut signers = Vec::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, address) = pair
            .split_once(':')
            .ok_or_else(|| anyhow!("signer entry must be <private_key>:<address>"))?;
        signers.push(Signer {
            private_key: key.trim().parse().context("invalid signer private key")?,
            address: address.trim().parse().context("invalid signer address")?,
        });
    }
    Ok(signers)
}

fn parse_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().with_context(|| format!("invalid {key}")),
        Err(_) => Ok(default),
    }
}
