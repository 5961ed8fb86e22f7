use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use anyhow::Error;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::{
    api::{BalanceFetcher, FetchError},
    config::{ConfigError, EngineConfig, FailurePolicy},
    types::{Address, BalanceRecord, RawBalance, Snapshot, SnapshotRow},
};

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    /// Every address failed in the same cycle; the monitor itself may be broken.
    #[error("Unable to refresh: all {attempted} balance fetches failed in cycle {cycle}")]
    AllFetchesFailed {
        cycle: u64,
        attempted: usize,
        snapshot: Arc<Snapshot>,
    },
}

struct StateTable {
    cycle: u64,
    records: Vec<BalanceRecord>, // indexed by address position
    last_checked_at_millis: Option<u64>,
}

/// Owns the per-address balance table. The table lock is held for a whole
/// cycle, so refreshes never overlap and snapshots are published under it.
pub struct SnapshotEngine {
    fetcher: Arc<dyn BalanceFetcher>,
    token: String,
    decimals: u32,
    fetch_timeout: Duration,
    failure_policy: FailurePolicy,
    addresses: Arc<[Address]>,
    table: Mutex<StateTable>,
    snapshot_sink: watch::Sender<Arc<Snapshot>>,
}

impl SnapshotEngine {
    pub fn new(
        config: &EngineConfig,
        fetcher: Arc<dyn BalanceFetcher>,
    ) -> Result<Self, ConfigError> {
        let seeds = config.validate()?;

        let (addresses, records): (Vec<_>, Vec<_>) = seeds
            .into_iter()
            .map(|(address, value)| (address, BalanceRecord::seeded(value)))
            .unzip();

        let table = StateTable {
            cycle: 0,
            records,
            last_checked_at_millis: None,
        };

        let addresses: Arc<[Address]> = addresses.into();
        let initial_snapshot = Arc::new(build_snapshot(
            &addresses,
            &table,
            &config.token,
            config.decimals,
            0,
        ));
        let (snapshot_sink, _) = watch::channel(initial_snapshot);

        debug!(
            "Engine initialized for {} addresses of {}",
            addresses.len(),
            config.token
        );

        Ok(SnapshotEngine {
            fetcher,
            token: config.token.clone(),
            decimals: config.decimals,
            fetch_timeout: config.fetch_timeout(),
            failure_policy: config.failure_policy(),
            addresses,
            table: Mutex::new(table),
            snapshot_sink,
        })
    }

    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot_sink.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshot_sink.subscribe()
    }

    /// Runs one full cycle: fetch every address concurrently, wait for all of
    /// them, merge, publish. A snapshot is published even when every fetch
    /// failed; that case is additionally reported as a `CycleError`.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>, CycleError> {
        let mut table = self.table.lock().await;
        let cycle = table.cycle + 1;

        debug!("Starting refresh cycle {}", cycle);

        let outcomes = futures::future::join_all(
            self.addresses
                .iter()
                .map(|address| self.fetch_with_timeout(address)),
        )
        .await;

        let now = now_millis();
        let mut failed_fetches = 0;

        for ((address, record), outcome) in self
            .addresses
            .iter()
            .zip(table.records.iter_mut())
            .zip(outcomes)
        {
            match outcome {
                Ok(value) => {
                    let previous = record.current;
                    if record.apply_success(value, now) {
                        info!(
                            "Balance of {} changed from {} to {} (raw)",
                            address, previous, value
                        );
                    }
                }
                Err(e) => {
                    warn!("{}", e);
                    failed_fetches += 1;
                    record.apply_failure(self.failure_policy.stale_after);
                    if record.stale {
                        warn!(
                            "Balance of {} is stale after {} failed fetches",
                            address, record.consecutive_failures
                        );
                    }
                }
            }
        }

        table.cycle = cycle;
        table.last_checked_at_millis = Some(now);

        let snapshot = Arc::new(build_snapshot(
            &self.addresses,
            &table,
            &self.token,
            self.decimals,
            failed_fetches,
        ));
        self.snapshot_sink.send_replace(snapshot.clone());

        drop(table);

        if failed_fetches == self.addresses.len() {
            error!(
                "All {} balance fetches failed in cycle {}",
                failed_fetches, cycle
            );
            return Err(CycleError::AllFetchesFailed {
                cycle,
                attempted: failed_fetches,
                snapshot,
            });
        }

        debug!(
            "Finished refresh cycle {} ({} failed fetches)",
            cycle, failed_fetches
        );

        Ok(snapshot)
    }

    async fn fetch_with_timeout(&self, address: &Address) -> Result<RawBalance, FetchError> {
        match tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(address, &self.token))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(FetchError::new(
                address,
                Error::msg(format!("Timed out after {:?}", self.fetch_timeout)),
            )),
        }
    }
}

fn build_snapshot(
    addresses: &[Address],
    table: &StateTable,
    token: &str,
    decimals: u32,
    failed_fetches: usize,
) -> Snapshot {
    Snapshot {
        cycle: table.cycle,
        token: token.to_string(),
        decimals,
        rows: addresses
            .iter()
            .zip(table.records.iter())
            .map(|(address, record)| SnapshotRow {
                address: address.clone(),
                record: record.clone(),
            })
            .collect(),
        last_checked_at_millis: table.last_checked_at_millis,
        failed_fetches,
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
