//! Scripted [`ChainClient`].

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use alloy_primitives::{hex, Address, U256};
use alloy_sol_types::SolEvent;
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::application::ingest::classify::{ProposalCreated, Upgraded};
use crate::error::SourceError;
use crate::port::outbound::chain::{ChainClient, RawLog};

/// A chain whose head, logs and failures are set by the test.
#[derive(Default)]
pub struct ScriptedChainClient {
    head: AtomicU64,
    logs: Mutex<Vec<RawLog>>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl ScriptedChainClient {
    pub fn new(head: u64) -> Self {
        Self {
            head: AtomicU64::new(head),
            ..Self::default()
        }
    }

    pub fn set_head(&self, head: u64) {
        self.head.store(head, Ordering::SeqCst);
    }

    pub fn push_log(&self, log: RawLog) {
        self.logs.lock().push(log);
    }

    /// Make every call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Calls made so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> Result<(), SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::transient("scripted", "connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainClient for ScriptedChainClient {
    async fn latest_block(&self) -> Result<u64, SourceError> {
        self.enter()?;
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn logs(
        &self,
        from_block: u64,
        to_block: u64,
        addresses: &[String],
    ) -> Result<Vec<RawLog>, SourceError> {
        self.enter()?;
        Ok(self
            .logs
            .lock()
            .iter()
            .filter(|l| (from_block..=to_block).contains(&l.block_number))
            .filter(|l| addresses.iter().any(|a| a.eq_ignore_ascii_case(&l.address)))
            .cloned()
            .collect())
    }
}

fn encoded_log(address: &str, block: u64, tx: &str, log_index: u64, event: &impl SolEvent) -> RawLog {
    let data = event.encode_log_data();
    RawLog {
        address: address.to_ascii_lowercase(),
        topics: data.topics().iter().map(hex::encode_prefixed).collect(),
        data: hex::encode_prefixed(&data.data),
        block_number: block,
        tx_hash: tx.into(),
        log_index,
    }
}

/// An `Upgraded(address)` log from `address` naming `implementation`.
///
/// `implementation` is hex, with or without `0x`, left-padded to 20 bytes.
pub fn upgraded_log(address: &str, block: u64, tx: &str, log_index: u64, implementation: &str) -> RawLog {
    let digits = implementation.trim_start_matches("0x");
    let implementation = format!("{digits:0>40}")
        .parse::<Address>()
        .unwrap_or(Address::ZERO);
    encoded_log(address, block, tx, log_index, &Upgraded { implementation })
}

/// A `ProposalCreated` log for proposal `id` with an empty action list.
pub fn proposal_created_log(address: &str, block: u64, tx: &str, log_index: u64, id: u64) -> RawLog {
    let event = ProposalCreated {
        proposalId: U256::from(id),
        proposer: Address::ZERO,
        targets: Vec::new(),
        values: Vec::new(),
        signatures: Vec::new(),
        calldatas: Vec::new(),
        voteStart: U256::from(block),
        voteEnd: U256::from(block + 100),
        description: format!("Proposal {id}"),
    };
    encoded_log(address, block, tx, log_index, &event)
}

/// Topic 0 of `ProposalCreated`, for hand-built malformed logs.
pub fn proposal_created_topic() -> String {
    hex::encode_prefixed(ProposalCreated::SIGNATURE_HASH)
}
