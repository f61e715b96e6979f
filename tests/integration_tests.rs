use cafeteria_rs::models::{ApiResponse, Order, Wallet, WalletTransaction};
use cafeteria_rs::handlers::STUDENT_ID_HEADER;
use rust_decimal_macros::dec;
use serde_json::json;

mod common;
use common::*;

fn lunch_order(total: f64) -> serde_json::Value {
    json!({
        "items": [{"mealType": "Lunch", "itemName": "Lunch", "price": 120}],
        "totalAmount": total
    })
}

#[tokio::test]
async fn test_wallet_top_up_and_order_flow() {
    let env = TestEnvironment::seeded().await;
    let student = "student-flow";

    // fresh wallet
    let response = env.get_as(student, "/cafeteria/wallet").await;
    assert_eq!(response.status().as_u16(), 200);
    let body: ApiResponse<Wallet> = response.json().await.expect("Failed to parse response");
    let wallet = body.data.expect("Expected wallet");
    assert!(body.success);
    assert_eq!(wallet.balance, dec!(250));
    assert!(wallet.transactions.is_empty());

    // top-up
    let (status, body) = TestEnvironment::read(
        env.post_as(student, "/cafeteria/wallet/add", &json!({"amount": 100}))
            .await,
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["balance"], 350.0);
    assert_eq!(body["data"]["transactions"][0]["type"], "credit");
    assert_eq!(body["data"]["transactions"][0]["amount"], 100.0);

    // order
    let response = env.post_as(student, "/cafeteria/order", &lunch_order(120.0)).await;
    assert_eq!(response.status().as_u16(), 201);
    let body: ApiResponse<Order> = response.json().await.expect("Failed to parse response");
    let order = body.data.expect("Expected order");
    assert_eq!(order.student_id, student);
    assert_eq!(order.total_amount, dec!(120));

    let (_, raw) = TestEnvironment::read(env.get_as(student, "/cafeteria/orders").await).await;
    assert_eq!(raw["data"][0]["status"], "pending");

    assert_eq!(env.balance(student).await, 230.0);
}

#[tokio::test]
async fn test_insufficient_balance_changes_nothing() {
    let env = TestEnvironment::seeded().await;
    let student = "student-broke";
    env.open_wallet(student).await;

    let order = json!({
        "items": [
            {"mealType": "Lunch", "itemName": "Lunch", "price": 120},
            {"mealType": "Dinner", "itemName": "Dinner", "price": 100},
            {"mealType": "Breakfast", "itemName": "Breakfast", "price": 60}
        ],
        "totalAmount": 280
    });

    let (status, body) =
        TestEnvironment::read(env.post_as(student, "/cafeteria/order", &order).await).await;

    assert_eq!(status, 400);
    assert_eq!(body, json!({"success": false, "message": "Insufficient balance"}));
    assert_eq!(env.balance(student).await, 250.0);

    let (_, orders) = TestEnvironment::read(env.get_as(student, "/cafeteria/orders").await).await;
    assert_eq!(orders["data"], json!([]));

    let (_, history) =
        TestEnvironment::read(env.get_as(student, "/cafeteria/wallet/history").await).await;
    assert_eq!(history["data"], json!([]));
}

#[tokio::test]
async fn test_order_history_is_newest_first() {
    let env = TestEnvironment::seeded().await;
    let student = "student-history";
    env.open_wallet(student).await;

    let first = json!({
        "items": [{"mealType": "Breakfast", "itemName": "Breakfast", "price": 60}],
        "totalAmount": 60
    });
    let second = json!({
        "items": [{"mealType": "Snacks", "itemName": "Snacks", "price": 40}],
        "totalAmount": 40
    });

    for order in [&first, &second] {
        let response = env.post_as(student, "/cafeteria/order", order).await;
        assert_eq!(response.status().as_u16(), 201);
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let response = env.get_as(student, "/cafeteria/orders").await;
    let body: ApiResponse<Vec<Order>> = response.json().await.expect("Failed to parse response");
    let orders = body.data.expect("Expected orders");

    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].items[0].item_name, "Snacks");
    assert_eq!(orders[1].items[0].item_name, "Breakfast");
    assert!(orders[0].order_date >= orders[1].order_date);

    let response = env.get_as(student, "/cafeteria/wallet/history").await;
    let body: ApiResponse<Vec<WalletTransaction>> =
        response.json().await.expect("Failed to parse response");
    let history = body.data.expect("Expected history");
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|entry| entry.description == "Order placed"));
}

#[tokio::test]
async fn test_concurrent_orders_never_overdraw() {
    let env = TestEnvironment::seeded().await;
    let student = "student-race";
    env.open_wallet(student).await;

    // 250 covers two lunches but not three
    let mut handles = Vec::new();
    for _ in 0..5 {
        let request = env
            .client
            .post(format!("{}/cafeteria/order", env.base_url))
            .header(STUDENT_ID_HEADER, student)
            .json(&lunch_order(120.0));
        handles.push(tokio::spawn(async move {
            request
                .send()
                .await
                .expect("Failed to send request")
                .status()
                .as_u16()
        }));
    }

    let mut statuses = Vec::new();
    for handle in handles {
        statuses.push(handle.await.expect("Request task panicked"));
    }

    assert_eq!(statuses.iter().filter(|status| **status == 201).count(), 2);
    assert_eq!(statuses.iter().filter(|status| **status == 400).count(), 3);
    assert_eq!(env.balance(student).await, 10.0);

    let (_, orders) = TestEnvironment::read(env.get_as(student, "/cafeteria/orders").await).await;
    assert_eq!(orders["data"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_rejected_orders_leave_wallet_untouched() {
    let env = TestEnvironment::seeded().await;
    let student = "student-invalid";

    // total does not match the items
    let (status, body) = TestEnvironment::read(
        env.post_as(student, "/cafeteria/order", &lunch_order(100.0))
            .await,
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["success"], false);

    // item not on the menu
    let unknown = json!({
        "items": [{"mealType": "Lunch", "itemName": "Lobster", "price": 20}],
        "totalAmount": 20
    });
    let (status, _) =
        TestEnvironment::read(env.post_as(student, "/cafeteria/order", &unknown).await).await;
    assert_eq!(status, 400);

    // price lower than the catalog price
    let underpriced = json!({
        "items": [{"mealType": "Lunch", "itemName": "Lunch", "price": 1}],
        "totalAmount": 1
    });
    let (status, _) =
        TestEnvironment::read(env.post_as(student, "/cafeteria/order", &underpriced).await).await;
    assert_eq!(status, 400);

    // empty order
    let (status, _) = TestEnvironment::read(
        env.post_as(student, "/cafeteria/order", &json!({"items": [], "totalAmount": 0}))
            .await,
    )
    .await;
    assert_eq!(status, 400);

    assert_eq!(env.balance(student).await, 250.0);
}

#[tokio::test]
async fn test_invalid_top_ups_are_rejected() {
    let env = TestEnvironment::seeded().await;
    let student = "student-topup";

    for amount in [json!(0), json!(-20), json!(10.005), json!(1_000_000)] {
        let (status, body) = TestEnvironment::read(
            env.post_as(student, "/cafeteria/wallet/add", &json!({ "amount": amount }))
                .await,
        )
        .await;
        assert_eq!(status, 400, "amount {} should be rejected", amount);
        assert_eq!(body["success"], false);
    }

    assert_eq!(env.balance(student).await, 250.0);
}

#[tokio::test]
async fn test_requests_without_identity_are_unauthorized() {
    let env = TestEnvironment::seeded().await;

    for path in [
        "/cafeteria/menu",
        "/cafeteria/specials",
        "/cafeteria/wallet",
        "/cafeteria/wallet/history",
        "/cafeteria/orders",
    ] {
        let response = env
            .client
            .get(format!("{}{}", env.base_url, path))
            .send()
            .await
            .expect("Failed to send request");
        let (status, body) = TestEnvironment::read(response).await;
        assert_eq!(status, 401);
        assert_eq!(body, json!({"success": false, "message": "Not authorized"}));
    }
}

#[tokio::test]
async fn test_history_of_unknown_student_is_empty() {
    let env = TestEnvironment::seeded().await;
    let student = "student-ghost";

    let (status, body) =
        TestEnvironment::read(env.get_as(student, "/cafeteria/wallet/history").await).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"], json!([]));

    // reading the wallet afterwards still shows a fresh one
    let (_, wallet) = TestEnvironment::read(env.get_as(student, "/cafeteria/wallet").await).await;
    assert_eq!(wallet["data"]["transactions"], json!([]));
    assert_eq!(wallet["data"]["balance"], 250.0);
}

#[tokio::test]
async fn test_catalog_endpoints() {
    let env = TestEnvironment::seeded().await;

    let (status, menu) = TestEnvironment::read(env.get_as("student-catalog", "/cafeteria/menu").await).await;
    assert_eq!(status, 200);
    let names: Vec<&str> = menu["data"]
        .as_array()
        .expect("Expected menu array")
        .iter()
        .filter_map(|item| item["name"].as_str())
        .collect();
    assert_eq!(names, vec!["Breakfast", "Lunch", "Snacks", "Dinner"]);

    let (status, specials) =
        TestEnvironment::read(env.get_as("student-catalog", "/cafeteria/specials").await).await;
    assert_eq!(status, 200);
    assert_eq!(specials["data"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn test_metrics_track_business_operations() {
    let env = TestEnvironment::seeded().await;
    env.open_wallet("student-metrics").await;

    let response = env
        .post_as("student-metrics", "/cafeteria/order", &lunch_order(120.0))
        .await;
    assert_eq!(response.status().as_u16(), 201);

    let text = env
        .client
        .get(format!("{}/metrics", env.base_url))
        .send()
        .await
        .expect("Failed to send request")
        .text()
        .await
        .expect("Failed to read metrics");

    assert!(text.contains("order_operations_total"));
    assert!(text.contains("order_amount"));
    assert!(text.contains("http_requests_total"));
}
