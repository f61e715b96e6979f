use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::TransactionType;

/// Per-student wallet: balance plus the append-only ledger that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub student_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub initial_balance: Decimal,
    pub transactions: Vec<WalletTransaction>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Single ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletTransaction {
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

/// Request body for `POST /cafeteria/wallet/add`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddMoneyRequest {
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}

impl WalletTransaction {
    pub fn credit(amount: Decimal, description: impl Into<String>) -> Self {
        Self {
            transaction_type: TransactionType::Credit,
            amount,
            description: description.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn debit(amount: Decimal, description: impl Into<String>) -> Self {
        Self {
            transaction_type: TransactionType::Debit,
            amount,
            description: description.into(),
            timestamp: Utc::now(),
        }
    }

    /// Effect of this entry on the balance
    pub fn signed_amount(&self) -> Decimal {
        match self.transaction_type {
            TransactionType::Credit => self.amount,
            TransactionType::Debit => -self.amount,
        }
    }
}

impl Wallet {
    /// Create a fresh wallet holding `initial_balance` and an empty ledger
    pub fn new(student_id: String, initial_balance: Decimal) -> Self {
        let now = Utc::now();
        Self {
            student_id,
            balance: initial_balance,
            initial_balance,
            transactions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a credit entry. Callers must pass a credit.
    pub fn apply_credit(&mut self, entry: WalletTransaction) {
        debug_assert_eq!(entry.transaction_type, TransactionType::Credit);
        self.balance += entry.amount;
        self.updated_at = entry.timestamp;
        self.transactions.push(entry);
    }

    /// Apply a debit entry if the balance covers it. Returns false and leaves
    /// the wallet untouched otherwise.
    pub fn apply_debit(&mut self, entry: WalletTransaction) -> bool {
        debug_assert_eq!(entry.transaction_type, TransactionType::Debit);
        if !self.can_afford(entry.amount) {
            return false;
        }
        self.balance -= entry.amount;
        self.updated_at = entry.timestamp;
        self.transactions.push(entry);
        true
    }

    pub fn can_afford(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }

    pub fn total_credits(&self) -> Decimal {
        self.sum_of(TransactionType::Credit)
    }

    pub fn total_debits(&self) -> Decimal {
        self.sum_of(TransactionType::Debit)
    }

    /// Balance reconstructed from the ledger
    pub fn ledger_balance(&self) -> Decimal {
        self.initial_balance
            + self
                .transactions
                .iter()
                .map(WalletTransaction::signed_amount)
                .sum::<Decimal>()
    }

    /// True when the stored balance agrees with the ledger and is non-negative
    pub fn is_consistent(&self) -> bool {
        self.balance >= Decimal::ZERO && self.balance == self.ledger_balance()
    }

    fn sum_of(&self, transaction_type: TransactionType) -> Decimal {
        self.transactions
            .iter()
            .filter(|t| t.transaction_type == transaction_type)
            .map(|t| t.amount)
            .sum()
    }
}
