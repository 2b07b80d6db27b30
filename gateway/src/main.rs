// StampPay Gateway Service - deposit account and checkout entry point
// Authenticates the principal, validates payloads, and drives the
// ledger and checkout engine.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use checkout::{CheckoutConfig, CheckoutEngine};
use deposit_ledger::{Config as LedgerConfig, Ledger};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info};

mod auth;
mod metrics;
mod models;

use auth::Principal;
use metrics::METRICS;
use models::{AccountResponse, CheckoutPayload, CheckoutResponse, CreditRequest};

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub engine: Arc<CheckoutEngine>,
}

#[derive(Debug, serde::Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

// Error handling
pub enum GatewayError {
    Validation(String),
    InsufficientFunds {
        current_balance: Decimal,
        required_amount: Decimal,
    },
    AmountMismatch {
        submitted: Decimal,
        computed: Decimal,
    },
    Forbidden,
    Internal(String),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self {
            GatewayError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": msg })),
            )
                .into_response(),
            GatewayError::InsufficientFunds {
                current_balance,
                required_amount,
            } => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "error": "Insufficient funds",
                    "currentBalance": current_balance,
                    "requiredAmount": required_amount,
                })),
            )
                .into_response(),
            GatewayError::AmountMismatch { submitted, computed } => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "error": "Cart total mismatch",
                    "submittedAmount": submitted,
                    "computedAmount": computed,
                })),
            )
                .into_response(),
            GatewayError::Forbidden => (
                StatusCode::FORBIDDEN,
                Json(serde_json::json!({ "error": "Forbidden" })),
            )
                .into_response(),
            GatewayError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": msg })),
            )
                .into_response(),
        }
    }
}

impl From<deposit_ledger::Error> for GatewayError {
    fn from(err: deposit_ledger::Error) -> Self {
        match err {
            deposit_ledger::Error::Validation(msg) => GatewayError::Validation(msg),
            deposit_ledger::Error::InsufficientFunds {
                current_balance,
                required_amount,
            } => GatewayError::InsufficientFunds {
                current_balance,
                required_amount,
            },
            other => GatewayError::Internal(other.to_string()),
        }
    }
}

impl From<checkout::Error> for GatewayError {
    fn from(err: checkout::Error) -> Self {
        match err {
            checkout::Error::Ledger(inner) => inner.into(),
            checkout::Error::Validation(msg) => GatewayError::Validation(msg),
            checkout::Error::AmountMismatch { submitted, computed } => {
                GatewayError::AmountMismatch { submitted, computed }
            }
            // Client sees an opaque failure; full context is already
            // logged by the engine for reconciliation
            partial @ checkout::Error::PartialCommit { .. } => {
                GatewayError::Internal(format!("Failed to finalize payment: {}", partial))
            }
            other => GatewayError::Internal(other.to_string()),
        }
    }
}

// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "stampay-gateway",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// Prometheus metrics endpoint (gateway + ledger registries)
async fn metrics_handler(State(state): State<AppState>) -> Result<String, GatewayError> {
    let mut text = METRICS
        .export()
        .map_err(|e| GatewayError::Internal(format!("Failed to export metrics: {}", e)))?;

    let ledger_text = state
        .ledger
        .metrics()
        .export()
        .map_err(|e| GatewayError::Internal(format!("Failed to export metrics: {}", e)))?;
    text.push_str(&ledger_text);

    Ok(text)
}

// GET /account - balances plus recent transactions
async fn get_account(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<AccountResponse>, GatewayError> {
    METRICS.http_requests_total.inc();

    let summary = state.ledger.account_summary(&principal.user_id).await?;
    Ok(Json(AccountResponse::from_summary(summary)))
}

// POST /account/credit - add funds to the deposit account
async fn credit_account(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<CreditRequest>,
) -> Result<Json<AccountResponse>, GatewayError> {
    METRICS.http_requests_total.inc();
    let start = std::time::Instant::now();

    state
        .ledger
        .credit(&principal.user_id, request.amount, "Added funds to account")
        .await?;
    METRICS.deposits_total.inc();

    // Respond with the dashboard shape: updated balances + recent rows
    let summary = state.ledger.account_summary(&principal.user_id).await?;

    METRICS
        .request_duration_seconds
        .observe(start.elapsed().as_secs_f64());

    Ok(Json(AccountResponse::from_summary(summary)))
}

// POST /checkout - settle a cart against the deposit account
async fn post_checkout(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<CheckoutPayload>,
) -> Result<Json<CheckoutResponse>, GatewayError> {
    METRICS.http_requests_total.inc();
    let start = std::time::Instant::now();

    let result = state
        .engine
        .checkout(&principal.user_id, payload.into_request())
        .await;

    METRICS
        .request_duration_seconds
        .observe(start.elapsed().as_secs_f64());

    match result {
        Ok(receipt) => {
            METRICS.checkouts_total.inc();
            Ok(Json(CheckoutResponse::from_receipt(receipt)))
        }
        Err(err) => {
            match &err {
                checkout::Error::Ledger(deposit_ledger::Error::InsufficientFunds { .. }) => {
                    METRICS.insufficient_funds_total.inc();
                    METRICS.checkouts_rejected_total.inc();
                }
                checkout::Error::PartialCommit { .. } => {
                    METRICS.partial_commits_total.inc();
                    error!(user_id = %principal.user_id, error = %err, "Checkout partially committed");
                }
                _ => {
                    METRICS.checkouts_rejected_total.inc();
                }
            }
            Err(err.into())
        }
    }
}

// GET /orders - order history, newest first
async fn list_orders(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Vec<models::OrderJson>>, GatewayError> {
    METRICS.http_requests_total.inc();

    let orders = state
        .ledger
        .recent_orders(&principal.user_id, 20)
        .map_err(GatewayError::from)?;

    Ok(Json(orders.into_iter().map(models::OrderJson::from_order).collect()))
}

// GET /admin/stats - operator dashboard, privileged roles only
async fn admin_stats(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<serde_json::Value>, GatewayError> {
    METRICS.http_requests_total.inc();

    if !principal.role.is_privileged() {
        return Err(GatewayError::Forbidden);
    }

    let stats = state
        .ledger
        .stats()
        .map_err(|e| GatewayError::Internal(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "totalAccounts": stats.total_accounts,
        "totalTransactions": stats.total_transactions,
        "totalOrders": stats.total_orders,
    })))
}

pub fn build_router(state: AppState) -> Router {
    use tower_http::cors::{Any, CorsLayer};

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/account", get(get_account))
        .route("/account/credit", post(credit_account))
        .route("/checkout", post(post_checkout))
        .route("/orders", get(list_orders))
        .route("/admin/stats", get(admin_stats))
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting StampPay Gateway Service");

    // Load configuration from environment
    let bind_addr =
        std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let ledger_config = LedgerConfig::from_env()?;

    // Open the ledger (explicitly constructed, injected into handlers)
    let ledger = Arc::new(Ledger::open(ledger_config).await?);
    info!("Deposit ledger opened");

    let engine = Arc::new(CheckoutEngine::new(ledger.clone(), CheckoutConfig::default()));

    let state = AppState { ledger, engine };
    let app = build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Gateway listening on: {}", bind_addr);
    info!("   GET  /account         - balances + recent transactions");
    info!("   POST /account/credit  - add funds");
    info!("   POST /checkout        - settle a cart");
    info!("   GET  /orders          - order history");
    info!("   GET  /admin/stats     - operator stats (privileged)");
    info!("   GET  /health          - health check");
    info!("   GET  /metrics         - Prometheus metrics");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    info!("Shutting down gateway");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use auth::Role;
    use deposit_ledger::UserId;

    async fn test_state() -> (AppState, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = LedgerConfig::default();
        config.data_dir = temp_dir.path().to_path_buf();

        let ledger = Arc::new(Ledger::open(config).await.unwrap());
        let engine = Arc::new(CheckoutEngine::new(ledger.clone(), CheckoutConfig::default()));

        (AppState { ledger, engine }, temp_dir)
    }

    fn principal(user: &str) -> Principal {
        Principal {
            user_id: UserId::new(user),
            role: Role::User,
        }
    }

    fn checkout_payload(json: &str) -> CheckoutPayload {
        serde_json::from_str(json).unwrap()
    }

    #[tokio::test]
    async fn test_get_account_creates_empty_account() {
        let (state, _temp) = test_state().await;

        let response = get_account(State(state), principal("collector@example.com"))
            .await
            .unwrap_or_else(|_| panic!("expected account response"));

        assert_eq!(response.0.balance, Decimal::ZERO);
        assert!(response.0.transactions.is_empty());
    }

    #[tokio::test]
    async fn test_credit_then_account_shows_transaction() {
        let (state, _temp) = test_state().await;
        let caller = principal("collector@example.com");

        let response = credit_account(
            State(state.clone()),
            caller.clone(),
            Json(CreditRequest {
                amount: Decimal::new(100000, 2),
            }),
        )
        .await
        .unwrap_or_else(|_| panic!("expected credit to succeed"));

        assert_eq!(response.0.balance, Decimal::new(100000, 2));
        assert_eq!(response.0.transactions.len(), 1);
        assert_eq!(response.0.transactions[0].kind, "deposit");
        assert_eq!(response.0.transactions[0].description, "Added funds to account");
    }

    #[tokio::test]
    async fn test_credit_rejects_non_positive_amount() {
        let (state, _temp) = test_state().await;

        let result = credit_account(
            State(state),
            principal("collector@example.com"),
            Json(CreditRequest {
                amount: Decimal::ZERO,
            }),
        )
        .await;

        assert!(matches!(result, Err(GatewayError::Validation(_))));
    }

    #[tokio::test]
    async fn test_checkout_flow_over_handlers() {
        let (state, _temp) = test_state().await;
        let caller = principal("collector@example.com");

        credit_account(
            State(state.clone()),
            caller.clone(),
            Json(CreditRequest {
                amount: Decimal::new(100000, 2),
            }),
        )
        .await
        .unwrap_or_else(|_| panic!("expected credit to succeed"));

        let payload = checkout_payload(
            r#"{
                "amount": 600,
                "orderReference": "ORD-gateway-1",
                "items": [
                    {"id": "emerald", "name": "1903 Emerald 2d", "price": 300, "quantity": 2}
                ]
            }"#,
        );

        let response = post_checkout(State(state.clone()), caller.clone(), Json(payload))
            .await
            .unwrap_or_else(|_| panic!("expected checkout to succeed"));

        assert!(response.0.success);
        assert_eq!(response.0.order.order_number, "ORD-gateway-1");
        assert_eq!(response.0.order.status, "completed");
        assert_eq!(response.0.account.balance, Decimal::new(40000, 2));

        // Insufficient funds on the next cart surfaces both figures
        let payload = checkout_payload(
            r#"{
                "amount": 500,
                "orderReference": "ORD-gateway-2",
                "items": [
                    {"id": "penny", "name": "Penny Black", "price": 500, "quantity": 1}
                ]
            }"#,
        );

        let result = post_checkout(State(state), caller, Json(payload)).await;
        match result {
            Err(GatewayError::InsufficientFunds {
                current_balance,
                required_amount,
            }) => {
                assert_eq!(current_balance, Decimal::new(40000, 2));
                assert_eq!(required_amount, Decimal::new(500, 0));
            }
            _ => panic!("expected InsufficientFunds"),
        }
    }

    #[tokio::test]
    async fn test_checkout_rejects_mismatched_total() {
        let (state, _temp) = test_state().await;
        let caller = principal("collector@example.com");

        credit_account(
            State(state.clone()),
            caller.clone(),
            Json(CreditRequest {
                amount: Decimal::new(100000, 2),
            }),
        )
        .await
        .unwrap_or_else(|_| panic!("expected credit to succeed"));

        let payload = checkout_payload(
            r#"{
                "amount": 500,
                "items": [
                    {"id": "emerald", "name": "1903 Emerald 2d", "price": 300, "quantity": 2}
                ]
            }"#,
        );

        let result = post_checkout(State(state), caller, Json(payload)).await;
        assert!(matches!(result, Err(GatewayError::AmountMismatch { .. })));
    }

    #[tokio::test]
    async fn test_list_orders_after_checkout() {
        let (state, _temp) = test_state().await;
        let caller = principal("collector@example.com");

        credit_account(
            State(state.clone()),
            caller.clone(),
            Json(CreditRequest {
                amount: Decimal::new(100000, 2),
            }),
        )
        .await
        .unwrap_or_else(|_| panic!("expected credit to succeed"));

        let payload = checkout_payload(
            r#"{
                "amount": 600,
                "orderReference": "ORD-history-1",
                "items": [
                    {"id": "emerald", "name": "1903 Emerald 2d", "price": 600, "quantity": 1}
                ]
            }"#,
        );
        post_checkout(State(state.clone()), caller.clone(), Json(payload))
            .await
            .unwrap_or_else(|_| panic!("expected checkout to succeed"));

        let response = list_orders(State(state), caller)
            .await
            .unwrap_or_else(|_| panic!("expected order history"));
        assert_eq!(response.0.len(), 1);
        assert_eq!(response.0[0].order_number, "ORD-history-1");
    }

    #[tokio::test]
    async fn test_admin_stats_requires_privilege() {
        let (state, _temp) = test_state().await;

        let result = admin_stats(State(state.clone()), principal("collector@example.com")).await;
        assert!(matches!(result, Err(GatewayError::Forbidden)));

        let author = Principal {
            user_id: UserId::new("curator@example.com"),
            role: Role::Author,
        };
        let response = admin_stats(State(state), author)
            .await
            .unwrap_or_else(|_| panic!("expected stats for author"));
        assert!(response.0.get("totalAccounts").is_some());
    }
}
