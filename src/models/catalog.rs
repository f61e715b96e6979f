use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::MealType;

/// Regular menu entry for a meal slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: String,
    pub meal_type: MealType,
    pub name: String,
    pub items: Vec<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub calories: u32,
    pub rating: f32,
    pub available: bool,
}

/// Daily special, ordered with `MealType::Special`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Special {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub calories: u32,
    pub rating: f32,
    pub available: bool,
}

impl MenuItem {
    pub fn new(
        meal_type: MealType,
        name: &str,
        items: &[&str],
        price: Decimal,
        calories: u32,
        rating: f32,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            meal_type,
            name: name.to_string(),
            items: items.iter().map(|s| s.to_string()).collect(),
            price,
            calories,
            rating,
            available: true,
        }
    }

    /// Whether an order line names this entry
    pub fn matches(&self, meal_type: MealType, item_name: &str) -> bool {
        self.meal_type == meal_type && self.name.eq_ignore_ascii_case(item_name.trim())
    }
}

impl Special {
    pub fn new(name: &str, description: &str, price: Decimal, calories: u32, rating: f32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.to_string(),
            price,
            calories,
            rating,
            available: true,
        }
    }

    pub fn matches(&self, item_name: &str) -> bool {
        self.name.eq_ignore_ascii_case(item_name.trim())
    }
}

/// Built-in catalog written by the admin seed endpoint
pub fn default_menu_items() -> Vec<MenuItem> {
    vec![
        MenuItem::new(
            MealType::Breakfast,
            "Breakfast",
            &["Idli", "Vada", "Sambar", "Chutney"],
            dec!(60),
            450,
            4.2,
        ),
        MenuItem::new(
            MealType::Lunch,
            "Lunch",
            &["Rice", "Dal", "Paneer Curry", "Roti", "Salad"],
            dec!(120),
            850,
            4.5,
        ),
        MenuItem::new(
            MealType::Snacks,
            "Snacks",
            &["Samosa", "Tea"],
            dec!(40),
            300,
            4.0,
        ),
        MenuItem::new(
            MealType::Dinner,
            "Dinner",
            &["Chapati", "Mixed Veg", "Jeera Rice", "Kheer"],
            dec!(100),
            750,
            4.3,
        ),
    ]
}

pub fn default_specials() -> Vec<Special> {
    vec![
        Special::new(
            "Paneer Tikka",
            "Grilled cottage cheese with mint chutney",
            dec!(80),
            320,
            4.7,
        ),
        Special::new(
            "Masala Dosa",
            "Crispy dosa with potato filling and sambar",
            dec!(70),
            400,
            4.6,
        ),
        Special::new(
            "Fruit Bowl",
            "Seasonal fruits with honey",
            dec!(50),
            180,
            4.4,
        ),
    ]
}
