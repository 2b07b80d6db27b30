// Wire DTOs - schema-validated request types (unknown fields rejected)
// and response shapes matching the account/checkout API surface.

use checkout::{CheckoutReceipt, CheckoutRequest};
use chrono::{DateTime, Utc};
use deposit_ledger::{AccountSummary, LineItem, Order};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// POST /account/credit body
///
/// Amounts arrive as JSON numbers; storage keeps exact decimals.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreditRequest {
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}

/// POST /checkout body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CheckoutPayload {
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(default)]
    pub order_reference: Option<String>,
    pub items: Vec<ItemPayload>,
}

/// One cart item on the wire
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ItemPayload {
    pub id: String,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub quantity: u32,
    #[serde(default)]
    pub speed_post: bool,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl CheckoutPayload {
    /// Convert to the orchestrator's request type
    pub fn into_request(self) -> CheckoutRequest {
        CheckoutRequest {
            amount: self.amount,
            order_number: self.order_reference,
            items: self.items.into_iter().map(ItemPayload::into_line_item).collect(),
        }
    }
}

impl ItemPayload {
    fn into_line_item(self) -> LineItem {
        LineItem {
            id: self.id,
            name: self.name,
            unit_price: self.price,
            quantity: self.quantity,
            speed_post: self.speed_post,
            image_url: self.image_url,
        }
    }
}

/// GET /account and POST /account/credit response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub user_id: String,
    pub balance: Decimal,
    pub total_deposits: Decimal,
    pub total_spent: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub transactions: Vec<TransactionJson>,
}

impl AccountResponse {
    pub fn from_summary(summary: AccountSummary) -> Self {
        Self {
            user_id: summary.user_id.to_string(),
            balance: summary.balance,
            total_deposits: summary.total_deposits,
            total_spent: summary.total_spent,
            created_at: summary.created_at,
            updated_at: summary.updated_at,
            transactions: summary
                .transactions
                .into_iter()
                .map(|view| TransactionJson {
                    id: view.id,
                    kind: view.kind,
                    amount: view.amount,
                    description: view.description,
                    created_at: view.created_at,
                })
                .collect(),
        }
    }
}

/// Minimal stable transaction shape for the dashboard
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionJson {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub amount: Decimal,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Order as served to clients
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderJson {
    pub id: String,
    pub order_number: String,
    pub total_amount: Decimal,
    pub status: String,
    pub items: Vec<OrderItemJson>,
    pub created_at: DateTime<Utc>,
}

/// One purchased item as served to clients
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemJson {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl OrderJson {
    pub fn from_order(order: Order) -> Self {
        Self {
            id: order.order_id.to_string(),
            order_number: order.order_number,
            total_amount: order.total_amount,
            status: order.status.as_str().to_string(),
            items: order
                .items
                .into_iter()
                .map(|item| OrderItemJson {
                    id: item.id,
                    name: item.name,
                    price: item.unit_price,
                    quantity: item.quantity,
                    image_url: item.image_url,
                })
                .collect(),
            created_at: order.created_at,
        }
    }
}

/// POST /checkout response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub success: bool,
    pub message: String,
    pub order: OrderJson,
    pub account: SnapshotJson,
}

impl CheckoutResponse {
    pub fn from_receipt(receipt: CheckoutReceipt) -> Self {
        let message = if receipt.duplicate {
            "Order already settled".to_string()
        } else {
            "Payment processed successfully".to_string()
        };

        Self {
            success: true,
            message,
            account: SnapshotJson {
                balance: receipt.account.balance,
                total_deposits: receipt.account.total_deposits,
                total_spent: receipt.account.total_spent,
            },
            order: OrderJson::from_order(receipt.order),
        }
    }
}

/// Balance figures alone
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotJson {
    pub balance: Decimal,
    pub total_deposits: Decimal,
    pub total_spent: Decimal,
}
