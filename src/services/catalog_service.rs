use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::instrument;

use crate::models::{
    default_menu_items, default_specials, MealType, MenuItem, ServiceResult, Special,
};
use crate::repositories::CatalogRepository;

/// Counts written by `seed_catalog`
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedSummary {
    pub menu_items: usize,
    pub specials: usize,
}

/// Available catalog entries at one point in time
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub menu: Vec<MenuItem>,
    pub specials: Vec<Special>,
}

impl CatalogSnapshot {
    pub fn price_of(&self, meal_type: MealType, item_name: &str) -> Option<Decimal> {
        if meal_type == MealType::Special {
            self.specials
                .iter()
                .find(|special| special.matches(item_name))
                .map(|special| special.price)
        } else {
            self.menu
                .iter()
                .find(|item| item.matches(meal_type, item_name))
                .map(|item| item.price)
        }
    }
}

/// Service for the menu and daily specials
pub struct CatalogService {
    repository: Arc<dyn CatalogRepository>,
}

impl CatalogService {
    pub fn new(repository: Arc<dyn CatalogRepository>) -> Self {
        Self { repository }
    }

    #[instrument(skip(self))]
    pub async fn list_available_menu_items(&self) -> ServiceResult<Vec<MenuItem>> {
        let mut menu = self.repository.find_available_menu_items().await?;
        menu.sort_by_key(|item| item.meal_type);

        crate::info_with_trace!("Found {} available menu items", menu.len());
        Ok(menu)
    }

    #[instrument(skip(self))]
    pub async fn list_today_specials(&self) -> ServiceResult<Vec<Special>> {
        let mut specials = self.repository.find_available_specials().await?;
        specials.sort_by(|a, b| a.name.cmp(&b.name));

        crate::info_with_trace!("Found {} available specials", specials.len());
        Ok(specials)
    }

    /// Catalog price of the available entry an order line names, if any
    #[instrument(skip(self), fields(meal_type = %meal_type, item_name = %item_name))]
    pub async fn find_price(
        &self,
        meal_type: MealType,
        item_name: &str,
    ) -> ServiceResult<Option<Decimal>> {
        Ok(self.snapshot().await?.price_of(meal_type, item_name))
    }

    /// Everything currently orderable, read once so a whole order can be
    /// priced against the same view of the catalog
    pub async fn snapshot(&self) -> ServiceResult<CatalogSnapshot> {
        let (menu, specials) = tokio::try_join!(
            self.repository.find_available_menu_items(),
            self.repository.find_available_specials(),
        )?;
        Ok(CatalogSnapshot { menu, specials })
    }

    /// Write the built-in catalog. Entries already present under the same
    /// name are overwritten in place.
    #[instrument(skip(self))]
    pub async fn seed_catalog(&self) -> ServiceResult<SeedSummary> {
        crate::info_with_trace!("Seeding default catalog");

        let existing_menu = self.repository.find_available_menu_items().await?;
        let existing_specials = self.repository.find_available_specials().await?;

        let mut summary = SeedSummary {
            menu_items: 0,
            specials: 0,
        };

        for mut item in default_menu_items() {
            if let Some(existing) = existing_menu
                .iter()
                .find(|e| e.matches(item.meal_type, &item.name))
            {
                item.id = existing.id.clone();
            }
            self.repository.save_menu_item(item).await?;
            summary.menu_items += 1;
        }

        for mut special in default_specials() {
            if let Some(existing) = existing_specials.iter().find(|e| e.matches(&special.name)) {
                special.id = existing.id.clone();
            }
            self.repository.save_special(special).await?;
            summary.specials += 1;
        }

        crate::info_with_trace!(
            menu_items = summary.menu_items,
            specials = summary.specials,
            "Catalog seeded"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RepositoryError;
    use crate::repositories::InMemoryCatalogRepository;
    use async_trait::async_trait;
    use mockall::mock;
    use rust_decimal_macros::dec;

    mock! {
        TestCatalogRepository {}

        #[async_trait]
        impl CatalogRepository for TestCatalogRepository {
            async fn find_available_menu_items(&self) -> Result<Vec<MenuItem>, RepositoryError>;
            async fn find_available_specials(&self) -> Result<Vec<Special>, RepositoryError>;
            async fn save_menu_item(&self, item: MenuItem) -> Result<MenuItem, RepositoryError>;
            async fn save_special(&self, special: Special) -> Result<Special, RepositoryError>;
        }
    }

    async fn seeded_service() -> CatalogService {
        let service = CatalogService::new(Arc::new(InMemoryCatalogRepository::new()));
        service.seed_catalog().await.unwrap();
        service
    }

    #[tokio::test]
    async fn test_seed_is_repeatable() {
        let service = seeded_service().await;
        let summary = service.seed_catalog().await.unwrap();

        assert_eq!(summary.menu_items, 4);
        assert_eq!(summary.specials, 3);
        assert_eq!(service.list_available_menu_items().await.unwrap().len(), 4);
        assert_eq!(service.list_today_specials().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_menu_sorted_by_meal_slot() {
        let service = seeded_service().await;

        let menu = service.list_available_menu_items().await.unwrap();
        let slots: Vec<MealType> = menu.iter().map(|item| item.meal_type).collect();

        assert_eq!(
            slots,
            vec![
                MealType::Breakfast,
                MealType::Lunch,
                MealType::Snacks,
                MealType::Dinner
            ]
        );
    }

    #[tokio::test]
    async fn test_find_price() {
        let service = seeded_service().await;

        assert_eq!(
            service.find_price(MealType::Lunch, "lunch").await.unwrap(),
            Some(dec!(120))
        );
        assert_eq!(
            service
                .find_price(MealType::Special, "Masala Dosa")
                .await
                .unwrap(),
            Some(dec!(70))
        );
        assert_eq!(
            service.find_price(MealType::Dinner, "Lunch").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_list_specials_from_repository() {
        let mut mock_repo = MockTestCatalogRepository::new();
        mock_repo.expect_find_available_specials().returning(|| {
            Ok(vec![Special::new("Fruit Bowl", "Seasonal fruit", dec!(50), 150, 4.4)])
        });

        let service = CatalogService::new(Arc::new(mock_repo));
        let specials = service.list_today_specials().await.unwrap();

        assert_eq!(specials.len(), 1);
        assert_eq!(specials[0].name, "Fruit Bowl");
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let mut mock_repo = MockTestCatalogRepository::new();
        mock_repo
            .expect_find_available_menu_items()
            .returning(|| Err(RepositoryError::Timeout));

        let service = CatalogService::new(Arc::new(mock_repo));

        assert!(service.list_available_menu_items().await.is_err());
    }
}
