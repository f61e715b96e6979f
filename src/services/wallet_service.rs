use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::instrument;

use crate::models::{
    validate_amount, validate_description, validate_student_id, AddMoneyRequest, RepositoryError,
    ServiceError, ServiceResult, Wallet, WalletTransaction,
};
use crate::repositories::WalletRepository;

pub const TOP_UP_DESCRIPTION: &str = "Wallet top-up";

/// Service for student wallets and their ledgers
pub struct WalletService {
    repository: Arc<dyn WalletRepository>,
    default_balance: Decimal,
    max_top_up: Decimal,
}

impl WalletService {
    /// Create a new WalletService
    pub fn new(
        repository: Arc<dyn WalletRepository>,
        default_balance: Decimal,
        max_top_up: Decimal,
    ) -> Self {
        Self {
            repository,
            default_balance,
            max_top_up,
        }
    }

    pub fn default_balance(&self) -> Decimal {
        self.default_balance
    }

    /// Return the student's wallet, creating it with the default balance on
    /// first access
    #[instrument(skip(self), fields(student_id = %student_id))]
    pub async fn get_or_create_wallet(&self, student_id: &str) -> ServiceResult<Wallet> {
        validate_student_id(student_id)?;

        if let Some(wallet) = self.repository.find_wallet(student_id).await? {
            return Ok(wallet);
        }

        crate::info_with_trace!(
            default_balance = %self.default_balance,
            "Creating wallet on first access"
        );

        let wallet = self
            .repository
            .create_wallet_if_absent(Wallet::new(student_id.to_string(), self.default_balance))
            .await?;

        Ok(wallet)
    }

    /// Top up a wallet from an API request
    #[instrument(skip(self, request), fields(student_id = %student_id, amount = %request.amount))]
    pub async fn add_money(
        &self,
        student_id: &str,
        request: AddMoneyRequest,
    ) -> ServiceResult<Wallet> {
        self.credit(student_id, request.amount, TOP_UP_DESCRIPTION)
            .await
    }

    /// Add `amount` to the wallet and append a credit entry
    #[instrument(skip(self), fields(student_id = %student_id, amount = %amount))]
    pub async fn credit(
        &self,
        student_id: &str,
        amount: Decimal,
        description: &str,
    ) -> ServiceResult<Wallet> {
        validate_amount("amount", &amount, Some(self.max_top_up))?;
        validate_description(description)?;

        self.get_or_create_wallet(student_id).await?;

        let wallet = self
            .repository
            .apply_credit(student_id, WalletTransaction::credit(amount, description))
            .await?;

        crate::info_with_trace!(balance = %wallet.balance, "Wallet credited");
        Ok(wallet)
    }

    /// Subtract `amount` from the wallet and append a debit entry. A missing
    /// wallet or a balance below `amount` is `InsufficientBalance`.
    #[instrument(skip(self), fields(student_id = %student_id, amount = %amount))]
    pub async fn debit(
        &self,
        student_id: &str,
        amount: Decimal,
        description: &str,
    ) -> ServiceResult<Wallet> {
        validate_student_id(student_id)?;
        validate_amount("amount", &amount, None)?;
        validate_description(description)?;

        match self
            .repository
            .apply_debit(student_id, WalletTransaction::debit(amount, description))
            .await
        {
            Ok(wallet) => {
                crate::info_with_trace!(balance = %wallet.balance, "Wallet debited");
                Ok(wallet)
            }
            Err(RepositoryError::ConditionalCheckFailed) => {
                crate::warn_with_trace!("Debit rejected, insufficient balance");
                Err(ServiceError::InsufficientBalance)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Put back an amount taken by an earlier debit. Unlike `credit` this is
    /// not bounded by the top-up limit.
    #[instrument(skip(self), fields(student_id = %student_id, amount = %amount))]
    pub async fn refund(
        &self,
        student_id: &str,
        amount: Decimal,
        description: &str,
    ) -> ServiceResult<Wallet> {
        let wallet = self
            .repository
            .apply_credit(student_id, WalletTransaction::credit(amount, description))
            .await?;

        crate::info_with_trace!(balance = %wallet.balance, "Wallet refunded");
        Ok(wallet)
    }

    /// Ledger entries oldest first; empty when the student has no wallet yet
    #[instrument(skip(self), fields(student_id = %student_id))]
    pub async fn transaction_history(
        &self,
        student_id: &str,
    ) -> ServiceResult<Vec<WalletTransaction>> {
        validate_student_id(student_id)?;

        Ok(self
            .repository
            .find_wallet(student_id)
            .await?
            .map(|wallet| wallet.transactions)
            .unwrap_or_default())
    }
}
