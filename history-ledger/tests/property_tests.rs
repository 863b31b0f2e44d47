//! Property-based tests for history ledger invariants
//!
//! - Round-trip: a persisted ledger reloads to the identical record sequence
//! - Conservation: total paid equals the sum of appended amounts
//! - Rotation: the backup always holds the previous checkpoint

use chrono::{DateTime, Duration, TimeZone, Utc};
use history_ledger::{CheckpointStorage, HistoryLedger, PaymentRecord};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Strategy for positive disbursement amounts (8 decimal places)
fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000_000i64).prop_map(|sats| Decimal::new(sats, 8))
}

fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn build_ledger(path: &std::path::Path, amounts: &[Decimal]) -> HistoryLedger {
    let start = start_time();
    let mut ledger = HistoryLedger::open(CheckpointStorage::new(path), start);
    for (i, amount) in amounts.iter().enumerate() {
        let timestamp = start + Duration::milliseconds(1_500 * (i as i64 + 1));
        ledger.append(PaymentRecord::new(timestamp, *amount)).unwrap();
    }
    ledger
}

proptest! {
    #[test]
    fn prop_checkpoint_round_trip(amounts in prop::collection::vec(amount_strategy(), 0..40)) {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("history.bin");

        let ledger = build_ledger(&path, &amounts);
        ledger.persist().unwrap();

        let reloaded = HistoryLedger::open(CheckpointStorage::new(&path), Utc::now());
        prop_assert_eq!(reloaded.records(), ledger.records());
    }

    #[test]
    fn prop_total_paid_is_sum(amounts in prop::collection::vec(amount_strategy(), 0..40)) {
        let temp_dir = tempfile::tempdir().unwrap();
        let ledger = build_ledger(&temp_dir.path().join("history.bin"), &amounts);

        let expected: Decimal = amounts.iter().copied().sum();
        prop_assert_eq!(ledger.total_paid(), expected);
        prop_assert_eq!(ledger.payout_count(), amounts.len());
    }

    #[test]
    fn prop_backup_holds_previous_checkpoint(
        first in prop::collection::vec(amount_strategy(), 0..10),
        extra in amount_strategy(),
    ) {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("history.bin");

        let mut ledger = build_ledger(&path, &first);
        ledger.persist().unwrap();
        let previous = ledger.records().to_vec();

        ledger.append(PaymentRecord::new(Utc::now(), extra)).unwrap();
        ledger.persist().unwrap();

        let storage = CheckpointStorage::new(&path);
        let backup = CheckpointStorage::new(storage.backup_path()).load().unwrap().unwrap();
        prop_assert_eq!(backup, previous);
    }
}
