//! Property-based tests for ledger invariants
//!
//! These tests use proptest to verify critical invariants:
//! - Balance identity: balance == total_deposits - total_spent after
//!   every operation
//! - No overdraft: an over-debit changes nothing and writes no rows
//! - Read path: recent transactions are newest first and capped

use deposit_ledger::{Config, Error, Ledger, UserId};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// A single ledger operation for sequence generation
#[derive(Debug, Clone, Copy)]
enum Op {
    Credit(u64),
    Debit(u64),
}

/// Strategy for generating valid amounts (positive cents)
fn amount_strategy() -> impl Strategy<Value = u64> {
    1u64..1_000_000u64
}

/// Strategy for generating credit/debit operations
fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        amount_strategy().prop_map(Op::Credit),
        amount_strategy().prop_map(Op::Debit),
    ]
}

/// Create test ledger with temp directory
async fn create_test_ledger() -> (Ledger, tempfile::TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.data_dir = temp_dir.path().to_path_buf();

    (Ledger::open(config).await.unwrap(), temp_dir)
}

fn test_user() -> UserId {
    UserId::new("collector@example.com")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: balance == total_deposits - total_spent holds after
    /// every operation in any credit/debit sequence
    #[test]
    fn prop_balance_identity(ops in prop::collection::vec(op_strategy(), 1..12)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (ledger, _temp) = create_test_ledger().await;
            let user = test_user();

            let mut expected_balance = Decimal::ZERO;

            for op in &ops {
                match op {
                    Op::Credit(cents) => {
                        let amount = Decimal::new(*cents as i64, 2);
                        let account = ledger
                            .credit(&user, amount, "Added funds to account")
                            .await
                            .unwrap();
                        expected_balance += amount;
                        prop_assert!(account.is_consistent());
                        prop_assert_eq!(account.balance, expected_balance);
                    }
                    Op::Debit(cents) => {
                        let amount = Decimal::new(*cents as i64, 2);
                        match ledger.debit(&user, amount).await {
                            Ok(account) => {
                                expected_balance -= amount;
                                prop_assert!(account.is_consistent());
                                prop_assert_eq!(account.balance, expected_balance);
                            }
                            Err(Error::InsufficientFunds {
                                current_balance,
                                required_amount,
                            }) => {
                                prop_assert_eq!(current_balance, expected_balance);
                                prop_assert_eq!(required_amount, amount);
                                prop_assert!(amount > expected_balance);
                            }
                            Err(other) => panic!("unexpected error: {other}"),
                        }
                    }
                }
            }

            // Committed state agrees with the model
            let summary = ledger.account_summary(&user).await.unwrap();
            prop_assert_eq!(summary.balance, expected_balance);
            prop_assert_eq!(summary.balance, summary.total_deposits - summary.total_spent);
            prop_assert!(summary.balance >= Decimal::ZERO);

            ledger.shutdown().await.unwrap();
            Ok(())
        })?;
    }

    /// Property: an over-debit never changes any balance figure and
    /// appends no transaction
    #[test]
    fn prop_over_debit_is_noop(balance_cents in 0u64..100_000u64, excess_cents in 1u64..100_000u64) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (ledger, _temp) = create_test_ledger().await;
            let user = test_user();

            let mut deposits = 0usize;
            if balance_cents > 0 {
                ledger
                    .credit(&user, Decimal::new(balance_cents as i64, 2), "Added funds to account")
                    .await
                    .unwrap();
                deposits = 1;
            }

            let before = ledger.account_summary(&user).await.unwrap();

            let over = Decimal::new((balance_cents + excess_cents) as i64, 2);
            let result = ledger.debit(&user, over).await;
            let is_insufficient = matches!(result, Err(Error::InsufficientFunds { .. }));
            prop_assert!(is_insufficient);

            let after = ledger.account_summary(&user).await.unwrap();
            prop_assert_eq!(after.balance, before.balance);
            prop_assert_eq!(after.total_deposits, before.total_deposits);
            prop_assert_eq!(after.total_spent, before.total_spent);
            prop_assert_eq!(after.transactions.len(), deposits);

            ledger.shutdown().await.unwrap();
            Ok(())
        })?;
    }

    /// Property: credits with positive amounts are always accepted
    #[test]
    fn prop_positive_credits_accepted(cents in 1u64..100_000_000u64) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (ledger, _temp) = create_test_ledger().await;

            let amount = Decimal::new(cents as i64, 2);
            let account = ledger
                .credit(&test_user(), amount, "Added funds to account")
                .await
                .unwrap();
            prop_assert_eq!(account.balance, amount);

            ledger.shutdown().await.unwrap();
            Ok(())
        })?;
    }

    /// Property: the summary caps at the configured limit, newest first
    #[test]
    fn prop_summary_capped_and_ordered(count in 1usize..15) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (ledger, _temp) = create_test_ledger().await;
            let user = test_user();

            for i in 0..count {
                ledger
                    .credit(&user, Decimal::new(100 + i as i64, 0), format!("deposit {}", i))
                    .await
                    .unwrap();
                // UUIDv7 ordering is millisecond-granular
                tokio::time::sleep(std::time::Duration::from_millis(2)).await;
            }

            let summary = ledger.account_summary(&user).await.unwrap();
            prop_assert_eq!(summary.transactions.len(), count.min(10));
            prop_assert_eq!(
                summary.transactions[0].description.clone(),
                format!("deposit {}", count - 1)
            );

            ledger.shutdown().await.unwrap();
            Ok(())
        })?;
    }
}

mod integration_tests {
    use super::*;

    /// Credit 1000 into an empty account, debit 600, then reject a 500 debit
    #[tokio::test]
    async fn test_credit_debit_reject_scenario() {
        let (ledger, _temp) = create_test_ledger().await;
        let user = test_user();

        let account = ledger
            .credit(&user, Decimal::new(100000, 2), "Added funds to account")
            .await
            .unwrap();
        assert_eq!(account.balance, Decimal::new(100000, 2));
        assert_eq!(account.total_deposits, Decimal::new(100000, 2));

        let account = ledger.debit(&user, Decimal::new(60000, 2)).await.unwrap();
        assert_eq!(account.balance, Decimal::new(40000, 2));
        assert_eq!(account.total_spent, Decimal::new(60000, 2));

        let err = ledger.debit(&user, Decimal::new(50000, 2)).await.unwrap_err();
        match err {
            Error::InsufficientFunds {
                current_balance,
                required_amount,
            } => {
                assert_eq!(current_balance, Decimal::new(40000, 2));
                assert_eq!(required_amount, Decimal::new(50000, 2));
            }
            other => panic!("expected InsufficientFunds, got {other}"),
        }

        let summary = ledger.account_summary(&user).await.unwrap();
        assert_eq!(summary.balance, Decimal::new(40000, 2));

        ledger.shutdown().await.unwrap();
    }

    /// Many concurrent debits against one account never overdraw it
    #[tokio::test]
    async fn test_concurrent_debits_never_overdraw() {
        let (ledger, _temp) = create_test_ledger().await;
        let ledger = std::sync::Arc::new(ledger);
        let user = test_user();

        ledger
            .credit(&user, Decimal::new(100000, 2), "Added funds to account")
            .await
            .unwrap();

        // 10 concurrent debits of 300.00 against 1000.00: exactly 3 fit
        let mut handles = Vec::new();
        for _ in 0..10 {
            let ledger = ledger.clone();
            let user = user.clone();
            handles.push(tokio::spawn(async move {
                ledger.debit(&user, Decimal::new(30000, 2)).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 3);

        let summary = ledger.account_summary(&user).await.unwrap();
        assert_eq!(summary.balance, Decimal::new(10000, 2));
        assert_eq!(summary.total_spent, Decimal::new(90000, 2));
    }
}
