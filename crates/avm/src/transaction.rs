//! §8.5 Transaction / receipt, directly adapted from the teacher's
//! `avm::transaction::Transaction` / `avm::receipt::TransactionReceipt`
//! (same "collect events from this context and any nested calls"
//! aggregation, same `Display` shape).

use avm_types::{Address, Energy, TransactionResult};
use core::fmt;

#[derive(Debug, Clone)]
pub struct Transaction {
    pub from: Address,
    pub to: Address,
    pub data: Vec<u8>,
    pub value: u64,
    pub energy_limit: Energy,
    pub nonce: u64,
}

/// Everything the entry point needs that isn't already implied by the
/// `Transaction` record — block context plus the caller/origin split a
/// nested call introduces (spec §6 runtime bridge surface).
#[derive(Debug, Clone)]
pub struct TxContext {
    pub sender: Address,
    pub origin: Address,
    pub data: Vec<u8>,
    pub value: u64,
    pub energy_limit: Energy,
    pub block_epoch_seconds: u64,
    pub block_number: u64,
    pub block_difficulty: u64,
}

impl TxContext {
    pub fn top_level(tx: &Transaction, block_epoch_seconds: u64, block_number: u64, block_difficulty: u64) -> Self {
        Self {
            sender: tx.from,
            origin: tx.from,
            data: tx.data.clone(),
            value: tx.value,
            energy_limit: tx.energy_limit,
            block_epoch_seconds,
            block_number,
            block_difficulty,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Event {
    pub topics: Vec<Vec<u8>>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct TransactionReceipt {
    pub tx: Transaction,
    pub result: TransactionResult,
    pub events: Vec<Event>,
}

impl TransactionReceipt {
    pub fn new(tx: Transaction, result: TransactionResult) -> Self {
        Self { tx, result, events: Vec::new() }
    }

    pub fn set_events(mut self, events: Vec<Event>) -> Self {
        self.events = events;
        self
    }
}

impl fmt::Display for TransactionReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Transaction Receipt ===")?;
        writeln!(f, "From: {}", self.tx.from)?;
        writeln!(f, "To: {}", self.tx.to)?;
        writeln!(f, "Status: {:?}", self.result.status)?;
        writeln!(f, "Energy used: {:?}", self.result.energy_used)?;
        writeln!(f, "Events:")?;
        for (i, event) in self.events.iter().enumerate() {
            let hex = event.data.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(" ");
            writeln!(f, "  [{i}] {hex}")?;
        }
        Ok(())
    }
}
