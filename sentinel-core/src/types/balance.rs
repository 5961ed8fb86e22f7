use std::fmt::Display;

use alloy_primitives::U256;
use serde::Deserialize;

/// Raw balance in the token's smallest unit.
pub type RawBalance = U256;

/// Opaque account identifier. Compared by string equality only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Stable,
    Changed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Increase,
    Decrease,
}

/// Unsigned magnitude plus sign of `current - previous`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceDelta {
    pub direction: Direction,
    pub amount: RawBalance,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceRecord {
    pub current: RawBalance,
    pub previous: RawBalance,
    pub changed: bool,
    /// Time of the last successful fetch that moved `current`. `None` while
    /// the record still holds its seeded value.
    pub observed_at_millis: Option<u64>,
    pub consecutive_failures: u32,
    pub stale: bool,
}

impl BalanceRecord {
    pub fn seeded(value: RawBalance) -> Self {
        Self {
            current: value,
            previous: value,
            changed: false,
            observed_at_millis: None,
            consecutive_failures: 0,
            stale: false,
        }
    }

    pub fn state(&self) -> RecordState {
        if self.changed {
            RecordState::Changed
        } else {
            RecordState::Stable
        }
    }

    /// Applies a successful fetch. Returns true if `current` moved.
    pub(crate) fn apply_success(&mut self, value: RawBalance, now_millis: u64) -> bool {
        self.consecutive_failures = 0;
        self.stale = false;

        if value == self.current {
            self.changed = false;
            return false;
        }

        self.previous = self.current;
        self.current = value;
        self.observed_at_millis = Some(now_millis);
        self.changed = true;
        true
    }

    /// Applies a failed fetch. Balance fields and `changed` are left as they were.
    pub(crate) fn apply_failure(&mut self, stale_after: Option<u32>) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        if let Some(threshold) = stale_after {
            if self.consecutive_failures >= threshold {
                self.stale = true;
            }
        }
    }

    pub fn delta(&self) -> Option<BalanceDelta> {
        if !self.changed {
            return None;
        }

        match self.current.cmp(&self.previous) {
            std::cmp::Ordering::Greater => Some(BalanceDelta {
                direction: Direction::Increase,
                amount: self.current - self.previous,
            }),
            std::cmp::Ordering::Less => Some(BalanceDelta {
                direction: Direction::Decrease,
                amount: self.previous - self.current,
            }),
            std::cmp::Ordering::Equal => None,
        }
    }
}
