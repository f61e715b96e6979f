use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn, Instrument};

use super::dynamodb::{
    decimal_attr, dynamodb_span, get_bool, get_decimal, get_f32, get_list, get_string, get_u32,
    map_dynamodb_error, Item,
};
use crate::models::{MealType, MenuItem, RepositoryError, RepositoryResult, Special};

/// Read-mostly access to the cafeteria catalog
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn find_available_menu_items(&self) -> RepositoryResult<Vec<MenuItem>>;

    async fn find_available_specials(&self) -> RepositoryResult<Vec<Special>>;

    /// Create or replace a menu item (administrative seeding only)
    async fn save_menu_item(&self, item: MenuItem) -> RepositoryResult<MenuItem>;

    /// Create or replace a special (administrative seeding only)
    async fn save_special(&self, special: Special) -> RepositoryResult<Special>;
}

/// DynamoDB implementation of the CatalogRepository trait, one table per
/// entry kind
pub struct DynamoDbCatalogRepository {
    client: Arc<DynamoDbClient>,
    menu_table_name: String,
    specials_table_name: String,
    region: String,
}

impl DynamoDbCatalogRepository {
    pub fn new(
        client: Arc<DynamoDbClient>,
        menu_table_name: String,
        specials_table_name: String,
        region: String,
    ) -> Self {
        Self {
            client,
            menu_table_name,
            specials_table_name,
            region,
        }
    }

    pub fn menu_item_to_item(&self, menu_item: &MenuItem) -> Item {
        let mut item = HashMap::new();
        item.insert("id".to_string(), AttributeValue::S(menu_item.id.clone()));
        item.insert(
            "meal_type".to_string(),
            AttributeValue::S(menu_item.meal_type.to_string()),
        );
        item.insert("name".to_string(), AttributeValue::S(menu_item.name.clone()));
        item.insert(
            "items".to_string(),
            AttributeValue::L(
                menu_item
                    .items
                    .iter()
                    .map(|dish| AttributeValue::S(dish.clone()))
                    .collect(),
            ),
        );
        item.insert("price".to_string(), decimal_attr(&menu_item.price));
        item.insert(
            "calories".to_string(),
            AttributeValue::N(menu_item.calories.to_string()),
        );
        item.insert(
            "rating".to_string(),
            AttributeValue::N(menu_item.rating.to_string()),
        );
        item.insert(
            "available".to_string(),
            AttributeValue::Bool(menu_item.available),
        );
        item
    }

    pub fn item_to_menu_item(&self, item: &Item) -> RepositoryResult<MenuItem> {
        let meal_type: MealType = get_string(item, "meal_type")?
            .parse()
            .map_err(|message| RepositoryError::InvalidRecord { message })?;

        Ok(MenuItem {
            id: get_string(item, "id")?,
            meal_type,
            name: get_string(item, "name")?,
            items: get_list(item, "items")
                .iter()
                .filter_map(|dish| dish.as_s().ok().cloned())
                .collect(),
            price: get_decimal(item, "price")?,
            calories: get_u32(item, "calories")?,
            rating: get_f32(item, "rating")?,
            available: get_bool(item, "available")?,
        })
    }

    pub fn special_to_item(&self, special: &Special) -> Item {
        let mut item = HashMap::new();
        item.insert("id".to_string(), AttributeValue::S(special.id.clone()));
        item.insert("name".to_string(), AttributeValue::S(special.name.clone()));
        item.insert(
            "description".to_string(),
            AttributeValue::S(special.description.clone()),
        );
        item.insert("price".to_string(), decimal_attr(&special.price));
        item.insert(
            "calories".to_string(),
            AttributeValue::N(special.calories.to_string()),
        );
        item.insert(
            "rating".to_string(),
            AttributeValue::N(special.rating.to_string()),
        );
        item.insert(
            "available".to_string(),
            AttributeValue::Bool(special.available),
        );
        item
    }

    pub fn item_to_special(&self, item: &Item) -> RepositoryResult<Special> {
        Ok(Special {
            id: get_string(item, "id")?,
            name: get_string(item, "name")?,
            description: get_string(item, "description")?,
            price: get_decimal(item, "price")?,
            calories: get_u32(item, "calories")?,
            rating: get_f32(item, "rating")?,
            available: get_bool(item, "available")?,
        })
    }

    /// Scan every page of `table_name` keeping entries with `available = true`
    async fn scan_available(&self, table_name: &str) -> RepositoryResult<Vec<Item>> {
        let mut items = Vec::new();
        let mut exclusive_start_key = None;

        loop {
            let scan_span = dynamodb_span(table_name, &self.region, "Scan");

            let response = async {
                self.client
                    .scan()
                    .table_name(table_name)
                    .filter_expression("available = :available")
                    .expression_attribute_values(":available", AttributeValue::Bool(true))
                    .set_exclusive_start_key(exclusive_start_key.take())
                    .send()
                    .await
                    .map_err(|e| map_dynamodb_error(e.into()))
            }
            .instrument(scan_span)
            .await?;

            items.extend(response.items.unwrap_or_default());

            match response.last_evaluated_key {
                Some(key) if !key.is_empty() => exclusive_start_key = Some(key),
                _ => break,
            }
        }

        Ok(items)
    }

    async fn put(&self, table_name: &str, item: Item) -> RepositoryResult<()> {
        let put_span = dynamodb_span(table_name, &self.region, "PutItem");

        async {
            self.client
                .put_item()
                .table_name(table_name)
                .set_item(Some(item))
                .send()
                .await
                .map_err(|e| map_dynamodb_error(e.into()))
        }
        .instrument(put_span)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl CatalogRepository for DynamoDbCatalogRepository {
    #[instrument(skip(self), fields(table = %self.menu_table_name))]
    async fn find_available_menu_items(&self) -> RepositoryResult<Vec<MenuItem>> {
        info!("Finding available menu items");

        let mut menu = Vec::new();
        for item in self.scan_available(&self.menu_table_name).await? {
            match self.item_to_menu_item(&item) {
                Ok(menu_item) => menu.push(menu_item),
                Err(e) => warn!("Failed to parse menu item: {}", e),
            }
        }

        info!("Found {} menu items", menu.len());
        Ok(menu)
    }

    #[instrument(skip(self), fields(table = %self.specials_table_name))]
    async fn find_available_specials(&self) -> RepositoryResult<Vec<Special>> {
        info!("Finding available specials");

        let mut specials = Vec::new();
        for item in self.scan_available(&self.specials_table_name).await? {
            match self.item_to_special(&item) {
                Ok(special) => specials.push(special),
                Err(e) => warn!("Failed to parse special: {}", e),
            }
        }

        info!("Found {} specials", specials.len());
        Ok(specials)
    }

    #[instrument(skip(self, item), fields(table = %self.menu_table_name, name = %item.name))]
    async fn save_menu_item(&self, item: MenuItem) -> RepositoryResult<MenuItem> {
        self.put(&self.menu_table_name, self.menu_item_to_item(&item))
            .await?;
        info!("Menu item saved");
        Ok(item)
    }

    #[instrument(skip(self, special), fields(table = %self.specials_table_name, name = %special.name))]
    async fn save_special(&self, special: Special) -> RepositoryResult<Special> {
        self.put(&self.specials_table_name, self.special_to_item(&special))
            .await?;
        info!("Special saved");
        Ok(special)
    }
}
