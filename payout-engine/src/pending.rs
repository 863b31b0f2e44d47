//! Pending payout registry
//!
//! Addresses waiting for the next disbursement plus the requester throttle.
//! An address appears at most once, a requester holds at most one entry per
//! cycle, and both sets are cleared together by `drain`.

use crate::error::{Error, Result};
use crate::funds::Payouts;
use rust_decimal::Decimal;
use std::collections::HashSet;

/// Payouts drained from the registry for one disbursement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingBatch {
    /// Address to amount
    pub payouts: Payouts,
}

impl PendingBatch {
    /// Sum of all payouts
    pub fn total(&self) -> Decimal {
        self.payouts.values().copied().sum()
    }

    /// Number of recipients
    pub fn len(&self) -> usize {
        self.payouts.len()
    }

    /// Whether nothing was pending
    pub fn is_empty(&self) -> bool {
        self.payouts.is_empty()
    }
}

/// Registry of admitted, not yet disbursed payouts
#[derive(Debug, Clone, Default)]
pub struct PendingRegistry {
    entries: Payouts,
    requesters: HashSet<String>,
    total: Decimal,
}

impl PendingRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail if `address` or `requester` already holds an entry
    pub fn check_admissible(&self, address: &str, requester: &str) -> Result<()> {
        if self.entries.contains_key(address) {
            return Err(Error::DuplicateAddress(address.to_string()));
        }
        if self.requesters.contains(requester) {
            return Err(Error::DuplicateRequester(requester.to_string()));
        }
        Ok(())
    }

    /// Record an admitted payout
    pub fn insert(&mut self, address: &str, requester: &str, amount: Decimal) -> Result<()> {
        self.check_admissible(address, requester)?;
        if amount <= Decimal::ZERO {
            return Err(Error::Other(format!(
                "refusing to queue non-positive payout {} to {}",
                amount, address
            )));
        }

        self.entries.insert(address.to_string(), amount);
        self.requesters.insert(requester.to_string());
        self.total += amount;
        Ok(())
    }

    /// Take every entry and clear the requester throttle
    pub fn drain(&mut self) -> PendingBatch {
        self.requesters.clear();
        self.total = Decimal::ZERO;
        PendingBatch {
            payouts: std::mem::take(&mut self.entries),
        }
    }

    /// Amount queued for `address`
    pub fn get(&self, address: &str) -> Option<Decimal> {
        self.entries.get(address).copied()
    }

    /// Queued payouts by address
    pub fn payouts(&self) -> &Payouts {
        &self.entries
    }

    /// Whether `requester` holds an entry this cycle
    pub fn has_requester(&self, requester: &str) -> bool {
        self.requesters.contains(requester)
    }

    /// Sum of queued payouts
    pub fn total(&self) -> Decimal {
        self.total
    }

    /// Number of queued addresses
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_total() {
        let mut registry = PendingRegistry::new();
        registry.insert("mA", "10.0.0.1", Decimal::new(1, 0)).unwrap();
        registry.insert("mB", "10.0.0.2", Decimal::new(2, 0)).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.total(), Decimal::new(3, 0));
        assert_eq!(registry.get("mA"), Some(Decimal::ONE));
        assert!(registry.has_requester("10.0.0.2"));
    }

    #[test]
    fn test_duplicate_address() {
        let mut registry = PendingRegistry::new();
        registry.insert("mA", "10.0.0.1", Decimal::ONE).unwrap();

        let err = registry.insert("mA", "10.0.0.2", Decimal::ONE).unwrap_err();
        assert!(matches!(err, Error::DuplicateAddress(a) if a == "mA"));
        assert_eq!(registry.total(), Decimal::ONE);
    }

    #[test]
    fn test_duplicate_requester() {
        let mut registry = PendingRegistry::new();
        registry.insert("mA", "10.0.0.1", Decimal::ONE).unwrap();

        let err = registry.insert("mB", "10.0.0.1", Decimal::ONE).unwrap_err();
        assert!(matches!(err, Error::DuplicateRequester(ip) if ip == "10.0.0.1"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_address_checked_before_requester() {
        let mut registry = PendingRegistry::new();
        registry.insert("mA", "10.0.0.1", Decimal::ONE).unwrap();

        let err = registry.check_admissible("mA", "10.0.0.1").unwrap_err();
        assert!(matches!(err, Error::DuplicateAddress(_)));
    }

    #[test]
    fn test_rejects_non_positive() {
        let mut registry = PendingRegistry::new();
        assert!(registry.insert("mA", "10.0.0.1", Decimal::ZERO).is_err());
        assert!(registry.is_empty());
        assert!(!registry.has_requester("10.0.0.1"));
    }

    #[test]
    fn test_drain_clears_everything() {
        let mut registry = PendingRegistry::new();
        registry.insert("mA", "10.0.0.1", Decimal::new(1, 0)).unwrap();
        registry.insert("mB", "10.0.0.2", Decimal::new(2, 0)).unwrap();

        let batch = registry.drain();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.total(), Decimal::new(3, 0));

        assert!(registry.is_empty());
        assert_eq!(registry.total(), Decimal::ZERO);
        assert!(!registry.has_requester("10.0.0.1"));

        // both may queue again next cycle
        registry.insert("mA", "10.0.0.1", Decimal::ONE).unwrap();
    }

    #[test]
    fn test_drain_empty() {
        let mut registry = PendingRegistry::new();
        let batch = registry.drain();
        assert!(batch.is_empty());
        assert_eq!(batch.total(), Decimal::ZERO);
    }
}
