use cafeteria_rs::models::{
    ApiResponse, MealType, MenuItem, OrderItem, PlaceOrderRequest, Special,
};
use rust_decimal::prelude::ToPrimitive;
use serde_json::json;

mod common;
use common::*;

#[tokio::test]
async fn test_complete_student_journey() {
    let test_env = TestEnvironment::new().await;
    let student = "64f1c2ab9e";

    // Step 1: Admin loads the catalog; a second seed must not duplicate it
    test_env.seed_catalog().await;
    test_env.seed_catalog().await;

    // Step 2: Student browses the menu and today's specials
    let response = test_env.get_as(student, "/cafeteria/menu").await;
    assert_eq!(response.status().as_u16(), 200);
    let menu: ApiResponse<Vec<MenuItem>> =
        response.json().await.expect("Failed to parse menu");
    let menu = menu.data.expect("Expected menu");
    assert_eq!(menu.len(), 4);

    let response = test_env.get_as(student, "/cafeteria/specials").await;
    let specials: ApiResponse<Vec<Special>> =
        response.json().await.expect("Failed to parse specials");
    let specials = specials.data.expect("Expected specials");
    let special = specials.first().expect("Expected at least one special");

    // Step 3: First visit to the wallet page
    assert_eq!(test_env.balance(student).await, 250.0);

    // Step 4: Top up
    let (status, _) = TestEnvironment::read(
        test_env
            .post_as(student, "/cafeteria/wallet/add", &json!({"amount": 100}))
            .await,
    )
    .await;
    assert_eq!(status, 200);

    // Step 5: Order lunch plus a special at catalog prices
    let lunch = menu
        .iter()
        .find(|item| item.name == "Lunch")
        .expect("Expected lunch on the menu");
    let order = PlaceOrderRequest {
        items: vec![
            OrderItem::new(MealType::Lunch, lunch.name.clone(), lunch.price),
            OrderItem::new(MealType::Special, special.name.clone(), special.price),
        ],
        total_amount: lunch.price + special.price,
    };
    let total = order.total_amount.to_f64().expect("Expected finite total");
    let order = serde_json::to_value(&order).expect("Failed to encode order");
    let (status, body) =
        TestEnvironment::read(test_env.post_as(student, "/cafeteria/order", &order).await).await;
    assert_eq!(status, 201);
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["items"].as_array().map(Vec::len), Some(2));

    // Step 6: Balance reflects the top-up and the order
    let expected = 350.0 - total;
    assert_eq!(test_env.balance(student).await, expected);

    // Step 7: Ledger holds the credit then the debit, oldest first
    let (_, history) = TestEnvironment::read(
        test_env
            .get_as(student, "/cafeteria/wallet/history")
            .await,
    )
    .await;
    let entries = history["data"].as_array().expect("Expected history array");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["type"], "credit");
    assert_eq!(entries[0]["description"], "Wallet top-up");
    assert_eq!(entries[1]["type"], "debit");
    assert_eq!(entries[1]["description"], "Order placed");

    // Step 8: Order history shows the single order
    let (_, orders) =
        TestEnvironment::read(test_env.get_as(student, "/cafeteria/orders").await).await;
    assert_eq!(orders["data"].as_array().map(Vec::len), Some(1));

    // Step 9: Another student's data is untouched
    let (_, other) =
        TestEnvironment::read(test_env.get_as("someone-else", "/cafeteria/orders").await).await;
    assert_eq!(other["data"], json!([]));
}

#[tokio::test]
async fn test_health_and_metrics_endpoints() {
    let test_env = TestEnvironment::new().await;

    let response = test_env
        .client
        .get(format!("{}/health/status", test_env.base_url))
        .send()
        .await
        .expect("Failed to get health");
    assert_eq!(response.status().as_u16(), 200);
    let health: serde_json::Value = response.json().await.expect("Failed to parse health");
    assert_eq!(health["status"], "healthy");

    let response = test_env
        .client
        .get(format!("{}/metrics", test_env.base_url))
        .send()
        .await
        .expect("Failed to get metrics");
    assert_eq!(response.status().as_u16(), 200);
    let text = response.text().await.expect("Failed to read metrics");
    assert!(text.contains("http_requests_total"));
}
