//! Operator rollups.
//!
//! Totals are computed from the store and cached. They lag the journal by up
//! to one refresh interval and are for reporting only.

use super::models::{OperatorId, OperatorTotals};
use crate::{db::LedgerStore, ledger::LedgerResult};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{sync::RwLock, task::JoinHandle, time::interval};

/// Cached, eventually-consistent operator totals
#[derive(Clone)]
pub struct OperatorAggregator {
    store: Arc<dyn LedgerStore>,
    cache: Arc<RwLock<HashMap<OperatorId, OperatorTotals>>>,
}

impl OperatorAggregator {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Recompute one operator's totals and cache them
    pub async fn refresh(&self, operator_id: OperatorId) -> LedgerResult<OperatorTotals> {
        let totals = self.store.operator_totals(operator_id).await?;
        self.cache.write().await.insert(operator_id, totals.clone());
        Ok(totals)
    }

    /// Recompute every operator the store knows about
    pub async fn refresh_all(&self) -> LedgerResult<usize> {
        let operators = self.store.list_operators().await?;
        let mut refreshed = 0;
        for operator in operators {
            self.refresh(operator.id).await?;
            refreshed += 1;
        }
        Ok(refreshed)
    }

    /// Cached totals, computing them on first request
    pub async fn totals(&self, operator_id: OperatorId) -> LedgerResult<OperatorTotals> {
        if let Some(totals) = self.cache.read().await.get(&operator_id) {
            return Ok(totals.clone());
        }
        self.refresh(operator_id).await
    }

    /// Cached totals without touching the store
    pub async fn cached(&self, operator_id: OperatorId) -> Option<OperatorTotals> {
        self.cache.read().await.get(&operator_id).cloned()
    }

    /// Refresh all operators every `period` until the handle is aborted
    pub fn spawn_refresh(&self, period: Duration) -> JoinHandle<()> {
        let aggregator = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                match aggregator.refresh_all().await {
                    Ok(count) => log::debug!("Refreshed totals for {} operator(s)", count),
                    Err(e) => log::warn!("Operator rollup refresh failed: {}", e),
                }
            }
        })
    }
}
