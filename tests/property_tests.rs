use std::sync::Arc;

use cafeteria_rs::models::{
    validate_amount, validate_student_id, MealType, OrderItem, PlaceOrderRequest, ServiceError,
    TransactionType, Wallet, WalletTransaction, MAX_STUDENT_ID_LENGTH, MIN_AMOUNT,
};
use cafeteria_rs::repositories::InMemoryWalletRepository;
use cafeteria_rs::services::WalletService;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[derive(Debug, Clone)]
enum LedgerOp {
    Credit(Decimal),
    Debit(Decimal),
}

prop_compose! {
    fn arb_money()(cents in 1i64..50_000) -> Decimal {
        Decimal::new(cents, 2)
    }
}

fn arb_ledger_op() -> impl Strategy<Value = LedgerOp> {
    prop_oneof![
        arb_money().prop_map(LedgerOp::Credit),
        arb_money().prop_map(LedgerOp::Debit),
    ]
}

prop_compose! {
    fn arb_meal_type()(meal_type in prop_oneof![
        Just(MealType::Breakfast),
        Just(MealType::Lunch),
        Just(MealType::Snacks),
        Just(MealType::Dinner),
        Just(MealType::Special),
    ]) -> MealType {
        meal_type
    }
}

prop_compose! {
    fn arb_order_item()(
        meal_type in arb_meal_type(),
        item_name in "[a-zA-Z ]{1,30}",
        price in arb_money(),
    ) -> OrderItem {
        OrderItem::new(meal_type, item_name, price)
    }
}

proptest! {
    #[test]
    fn test_student_id_validation(student_id in ".{0,200}") {
        let trimmed = student_id.trim();
        let result = validate_student_id(&student_id);

        if !trimmed.is_empty() && trimmed.len() <= MAX_STUDENT_ID_LENGTH {
            prop_assert!(result.is_ok());
        } else {
            prop_assert!(result.is_err());
        }
    }

    #[test]
    fn test_amount_validation(mantissa in -1_000_000i64..1_000_000, scale in 0u32..5) {
        let amount = Decimal::new(mantissa, scale);
        let result = validate_amount("amount", &amount, None);

        let valid = amount >= MIN_AMOUNT && amount.normalize().scale() <= 2;
        prop_assert_eq!(result.is_ok(), valid);
    }

    #[test]
    fn test_order_total_matches_items(items in prop::collection::vec(arb_order_item(), 1..10)) {
        let total: Decimal = items.iter().map(|item| item.price).sum();

        let request = PlaceOrderRequest { items: items.clone(), total_amount: total };
        prop_assert!(request.total_matches_items());

        let request = PlaceOrderRequest { items, total_amount: total + dec!(0.01) };
        prop_assert!(!request.total_matches_items());
    }

    #[test]
    fn test_wallet_model_never_goes_negative(ops in prop::collection::vec(arb_ledger_op(), 0..40)) {
        let mut wallet = Wallet::new("student-model".to_string(), dec!(250));

        for op in ops {
            let prior = wallet.transactions.clone();
            match op {
                LedgerOp::Credit(amount) => {
                    wallet.apply_credit(WalletTransaction::credit(amount, "Wallet top-up"));
                }
                LedgerOp::Debit(amount) => {
                    let affordable = wallet.can_afford(amount);
                    let before = wallet.clone();
                    let applied = wallet.apply_debit(WalletTransaction::debit(amount, "Order placed"));
                    prop_assert_eq!(applied, affordable);
                    if !applied {
                        prop_assert_eq!(&wallet, &before);
                    }
                }
            }
            prop_assert!(wallet.balance >= Decimal::ZERO);
            prop_assert!(wallet.is_consistent());
            prop_assert!(wallet.transactions.len() >= prior.len());
            prop_assert_eq!(&wallet.transactions[..prior.len()], &prior[..]);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_wallet_service_ledger_invariants(ops in prop::collection::vec(arb_ledger_op(), 1..25)) {
        tokio_test::block_on(async {
            let service = WalletService::new(
                Arc::new(InMemoryWalletRepository::new()),
                dec!(250),
                dec!(5000),
            );
            let student = "student-ledger";
            service.get_or_create_wallet(student).await.unwrap();

            let mut expected_balance = dec!(250);
            let mut expected_entries = 0usize;

            for op in &ops {
                let prior = service.transaction_history(student).await.unwrap();
                match op {
                    LedgerOp::Credit(amount) => {
                        service.credit(student, *amount, "Wallet top-up").await.unwrap();
                        expected_balance += *amount;
                        expected_entries += 1;
                    }
                    LedgerOp::Debit(amount) => {
                        match service.debit(student, *amount, "Order placed").await {
                            Ok(_) => {
                                expected_balance -= *amount;
                                expected_entries += 1;
                            }
                            Err(ServiceError::InsufficientBalance) => {
                                prop_assert!(expected_balance < *amount);
                            }
                            Err(other) => prop_assert!(false, "unexpected error: {}", other),
                        }
                    }
                }

                // earlier entries are never rewritten or dropped
                let ledger = service.transaction_history(student).await.unwrap();
                prop_assert!(ledger.len() >= prior.len());
                prop_assert_eq!(&ledger[..prior.len()], &prior[..]);
            }

            let wallet = service.get_or_create_wallet(student).await.unwrap();
            prop_assert_eq!(wallet.balance, expected_balance);
            prop_assert!(wallet.balance >= Decimal::ZERO);
            prop_assert_eq!(wallet.transactions.len(), expected_entries);
            prop_assert!(wallet.is_consistent());

            let credits = wallet
                .transactions
                .iter()
                .filter(|entry| entry.transaction_type == TransactionType::Credit)
                .count();
            let expected_credits = ops
                .iter()
                .filter(|op| matches!(op, LedgerOp::Credit(_)))
                .count();
            prop_assert_eq!(credits, expected_credits);

            Ok::<(), TestCaseError>(())
        })?;
    }
}
