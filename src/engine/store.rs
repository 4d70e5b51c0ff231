//! Concurrency-safe scan state.
//!
//! `ScanStore` maps each symbol to its latest record. Records are held
//! behind `Arc` and swapped whole, so a reader sees either the previous
//! record or the new one, never a mix. The lock is only taken to swap or
//! copy entries; detector work happens outside it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::engine::scanner::TickReport;
use crate::types::{BreakoutRecord, BtstRecord, Symbol};

/// Symbol → latest record for one detector.
pub struct ScanStore<R> {
    records: RwLock<HashMap<Symbol, Arc<R>>>,
}

impl<R: Clone> ScanStore<R> {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Swap in a new record for `symbol`.
    pub async fn replace(&self, symbol: Symbol, record: R) {
        self.records.write().await.insert(symbol, Arc::new(record));
    }

    /// Drop one symbol. Returns whether it was present.
    pub async fn remove(&self, symbol: &Symbol) -> bool {
        self.records.write().await.remove(symbol).is_some()
    }

    /// Window-close reset. Returns how many records were dropped.
    pub async fn remove_all(&self) -> usize {
        let mut records = self.records.write().await;
        let n = records.len();
        records.clear();
        n
    }

    pub async fn get(&self, symbol: &Symbol) -> Option<Arc<R>> {
        self.records.read().await.get(symbol).cloned()
    }

    /// Owned copy of every record, ordered by symbol.
    pub async fn snapshot(&self) -> BTreeMap<Symbol, R> {
        let records = self.records.read().await;
        records
            .iter()
            .map(|(symbol, record)| (symbol.clone(), R::clone(record)))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl<R: Clone> Default for ScanStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the scanner publishes. Shared between the scanner task
/// (sole writer) and the query façade.
#[derive(Default)]
pub struct ScanState {
    pub breakouts: ScanStore<BreakoutRecord>,
    pub btst: ScanStore<BtstRecord>,
    last_tick: RwLock<Option<TickReport>>,
}

impl ScanState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_tick(&self, report: TickReport) {
        *self.last_tick.write().await = Some(report);
    }

    pub async fn last_tick(&self) -> Option<TickReport> {
        self.last_tick.read().await.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
