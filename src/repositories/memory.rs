//! In-process stores used for local development (`CAFETERIA_STORAGE_BACKEND=memory`)
//! and by the test suites.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument};

use super::{CatalogRepository, OrderRepository, WalletRepository};
use crate::models::{
    MenuItem, Order, RepositoryError, RepositoryResult, Special, Wallet, WalletTransaction,
};

/// Wallet store with one mutex per wallet. The outer map lock is only held
/// long enough to look up or insert a slot, so different students never
/// wait on each other.
#[derive(Default)]
pub struct InMemoryWalletRepository {
    wallets: RwLock<HashMap<String, Arc<Mutex<Wallet>>>>,
}

impl InMemoryWalletRepository {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, student_id: &str) -> Option<Arc<Mutex<Wallet>>> {
        self.wallets.read().await.get(student_id).cloned()
    }

    pub async fn wallet_count(&self) -> usize {
        self.wallets.read().await.len()
    }
}

#[async_trait]
impl WalletRepository for InMemoryWalletRepository {
    async fn find_wallet(&self, student_id: &str) -> RepositoryResult<Option<Wallet>> {
        match self.slot(student_id).await {
            Some(slot) => Ok(Some(slot.lock().await.clone())),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, wallet), fields(student_id = %wallet.student_id))]
    async fn create_wallet_if_absent(&self, wallet: Wallet) -> RepositoryResult<Wallet> {
        let slot = {
            let mut wallets = self.wallets.write().await;
            wallets
                .entry(wallet.student_id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(wallet)))
                .clone()
        };

        let stored = slot.lock().await.clone();
        Ok(stored)
    }

    #[instrument(skip(self, entry), fields(student_id = %student_id, amount = %entry.amount))]
    async fn apply_credit(
        &self,
        student_id: &str,
        entry: WalletTransaction,
    ) -> RepositoryResult<Wallet> {
        let slot = self
            .slot(student_id)
            .await
            .ok_or(RepositoryError::NotFound)?;

        let mut wallet = slot.lock().await;
        wallet.apply_credit(entry);
        debug!(balance = %wallet.balance, "Credit applied");
        Ok(wallet.clone())
    }

    #[instrument(skip(self, entry), fields(student_id = %student_id, amount = %entry.amount))]
    async fn apply_debit(
        &self,
        student_id: &str,
        entry: WalletTransaction,
    ) -> RepositoryResult<Wallet> {
        let slot = self
            .slot(student_id)
            .await
            .ok_or(RepositoryError::ConditionalCheckFailed)?;

        // check and mutation happen under the same guard
        let mut wallet = slot.lock().await;
        if !wallet.apply_debit(entry) {
            return Err(RepositoryError::ConditionalCheckFailed);
        }
        debug!(balance = %wallet.balance, "Debit applied");
        Ok(wallet.clone())
    }
}

#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<String, Vec<Order>>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn order_count(&self) -> usize {
        self.orders.read().await.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn create_order(&self, order: Order) -> RepositoryResult<Order> {
        let mut orders = self.orders.write().await;
        let student_orders = orders.entry(order.student_id.clone()).or_default();

        if student_orders.iter().any(|o| o.order_id == order.order_id) {
            return Err(RepositoryError::ConditionalCheckFailed);
        }

        student_orders.push(order.clone());
        Ok(order)
    }

    async fn find_orders_by_student(&self, student_id: &str) -> RepositoryResult<Vec<Order>> {
        let mut orders = self
            .orders
            .read()
            .await
            .get(student_id)
            .cloned()
            .unwrap_or_default();

        orders.sort_by(|a, b| b.order_date.cmp(&a.order_date));
        Ok(orders)
    }
}

#[derive(Default)]
pub struct InMemoryCatalogRepository {
    menu: RwLock<Vec<MenuItem>>,
    specials: RwLock<Vec<Special>>,
}

impl InMemoryCatalogRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogRepository for InMemoryCatalogRepository {
    async fn find_available_menu_items(&self) -> RepositoryResult<Vec<MenuItem>> {
        Ok(self
            .menu
            .read()
            .await
            .iter()
            .filter(|item| item.available)
            .cloned()
            .collect())
    }

    async fn find_available_specials(&self) -> RepositoryResult<Vec<Special>> {
        Ok(self
            .specials
            .read()
            .await
            .iter()
            .filter(|special| special.available)
            .cloned()
            .collect())
    }

    async fn save_menu_item(&self, item: MenuItem) -> RepositoryResult<MenuItem> {
        let mut menu = self.menu.write().await;
        menu.retain(|existing| existing.id != item.id);
        menu.push(item.clone());
        Ok(item)
    }

    async fn save_special(&self, special: Special) -> RepositoryResult<Special> {
        let mut specials = self.specials.write().await;
        specials.retain(|existing| existing.id != special.id);
        specials.push(special.clone());
        Ok(special)
    }
}
