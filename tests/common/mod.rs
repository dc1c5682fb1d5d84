//! Common test utilities

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use bank_backoffice::api::{self, AppState};
use bank_backoffice::domain::{Balance, Branch, User};
use bank_backoffice::identifiers::IdentifierGenerator;
use bank_backoffice::MemoryBankStore;
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;
use uuid::Uuid;

/// A seeded in-memory bank with one branch and its router
pub struct TestBank {
    pub store: MemoryBankStore,
    pub branch: Branch,
    pub app: Router,
}

/// A user and the bearer token that authenticates them
pub struct TestUser {
    pub user: User,
    pub token: String,
}

impl TestBank {
    pub async fn new() -> Self {
        let store = MemoryBankStore::new();
        let branch = store
            .insert_branch(Branch::new("Centro", "Av. Corrientes 1234", Some("011-4444".into())))
            .await
            .expect("Failed to seed branch");

        let state = AppState::new(Arc::new(store.clone()), IdentifierGenerator::random());
        let app = api::build_router(state, None);

        Self { store, branch, app }
    }

    pub async fn customer(&self, username: &str) -> TestUser {
        let user = User::customer(username, Some(self.branch.id));
        self.register(user).await
    }

    pub async fn employee(&self, username: &str, branch_id: Uuid) -> TestUser {
        self.register(User::employee(username, branch_id)).await
    }

    async fn register(&self, user: User) -> TestUser {
        let user = self.store.insert_user(user).await.expect("Failed to seed user");
        let token = format!("token-{}", user.username);
        self.store
            .issue_token(user.id, &token)
            .await
            .expect("Failed to issue token");
        TestUser { user, token }
    }

    /// Set the peso balance of an account directly
    pub async fn fund(&self, account_id: Uuid, pesos: Decimal) {
        self.store
            .set_balances(account_id, Balance::new(pesos).unwrap(), Balance::zero())
            .await
            .expect("Failed to fund account");
    }

    /// Send a request and decode the JSON body (Null when empty)
    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => Body::from(json.to_string()),
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    /// Open an account for `user` over HTTP and return its JSON
    pub async fn open_account(&self, user: &TestUser) -> Value {
        let (status, body) = self
            .call(
                "POST",
                "/api/cuentas/",
                Some(&user.token),
                Some(serde_json::json!({ "tipo_cuenta": "ahorro" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "account creation failed: {body}");
        body
    }
}

/// Uuid field of a JSON object
pub fn id_of(value: &Value) -> Uuid {
    value["id"].as_str().unwrap().parse().unwrap()
}

/// Decimal field of a JSON object, whether serialized as string or number
pub fn decimal_of(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().unwrap(),
        other => other.to_string().parse().unwrap(),
    }
}
