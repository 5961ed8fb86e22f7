use rust_decimal::Decimal;

use super::{scale_delta, scale_raw, Address, BalanceRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRow {
    pub address: Address,
    pub record: BalanceRecord,
}

/// Immutable copy of the balance table after one refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub cycle: u64,
    pub token: String,
    pub decimals: u32,
    pub rows: Vec<SnapshotRow>, // in configured address order
    pub last_checked_at_millis: Option<u64>,
    pub failed_fetches: usize,
}

impl Snapshot {
    pub fn get(&self, address: &Address) -> Option<&BalanceRecord> {
        self.rows
            .iter()
            .find(|row| &row.address == address)
            .map(|row| &row.record)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// True when every fetch of the cycle that produced this snapshot failed.
    pub fn is_cycle_failure(&self) -> bool {
        self.last_checked_at_millis.is_some()
            && !self.rows.is_empty()
            && self.failed_fetches == self.rows.len()
    }

    pub fn changed_rows(&self) -> impl Iterator<Item = &SnapshotRow> {
        self.rows.iter().filter(|row| row.record.changed)
    }

    /// `None` when the scaled value does not fit a `Decimal`.
    pub fn scaled_current(&self, record: &BalanceRecord) -> Option<Decimal> {
        scale_raw(record.current, self.decimals)
    }

    pub fn scaled_previous(&self, record: &BalanceRecord) -> Option<Decimal> {
        scale_raw(record.previous, self.decimals)
    }

    /// Signed `current - previous`, only for records changed this cycle.
    pub fn scaled_delta(&self, record: &BalanceRecord) -> Option<Decimal> {
        record
            .delta()
            .and_then(|delta| scale_delta(&delta, self.decimals))
    }
}
