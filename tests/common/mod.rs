use std::sync::Arc;
use std::time::Duration;

use cafeteria_rs::{create_app, handlers::STUDENT_ID_HEADER, AppContext, Metrics};
use reqwest::{Client, Response};
use serde_json::Value;
use tokio::net::TcpListener;

pub struct TestEnvironment {
    pub client: Client,
    pub base_url: String,
}

#[allow(dead_code)]
impl TestEnvironment {
    /// Serve the real router over in-memory stores on an ephemeral port
    pub async fn new() -> Self {
        let metrics = Arc::new(Metrics::new().expect("Failed to create metrics"));
        let app = create_app(AppContext::in_memory(metrics));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind listener");
        let addr = listener.local_addr().expect("Failed to get local address");
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Failed to serve app");
        });

        // Wait for server to start
        tokio::time::sleep(Duration::from_millis(100)).await;

        Self {
            client: Client::new(),
            base_url,
        }
    }

    /// Environment with the default catalog already loaded
    pub async fn seeded() -> Self {
        let env = Self::new().await;
        env.seed_catalog().await;
        env
    }

    pub async fn seed_catalog(&self) {
        let response = self
            .client
            .post(format!("{}/api/admin/seed", self.base_url))
            .send()
            .await
            .expect("Failed to seed catalog");

        assert_eq!(response.status().as_u16(), 200);
    }

    pub async fn get_as(&self, student_id: &str, path: &str) -> Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .header(STUDENT_ID_HEADER, student_id)
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn post_as(&self, student_id: &str, path: &str, body: &Value) -> Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .header(STUDENT_ID_HEADER, student_id)
            .json(body)
            .send()
            .await
            .expect("Failed to send request")
    }

    /// Status code and parsed envelope of a response
    pub async fn read(response: Response) -> (u16, Value) {
        let status = response.status().as_u16();
        let body = response.json().await.expect("Failed to parse response");
        (status, body)
    }

    /// First visit to the wallet page, which creates the wallet
    pub async fn open_wallet(&self, student_id: &str) {
        let response = self.get_as(student_id, "/cafeteria/wallet").await;
        assert_eq!(response.status().as_u16(), 200);
    }

    pub async fn balance(&self, student_id: &str) -> f64 {
        let (_, body) = Self::read(self.get_as(student_id, "/cafeteria/wallet").await).await;
        body["data"]["balance"]
            .as_f64()
            .expect("Expected numeric balance")
    }
}
