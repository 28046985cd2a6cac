//! Shared helpers for flow scenario tests.
//!
//! Provides backend step-list fixtures, a client builder pointed at an
//! httpmock server, and a scripted checkout handler.

use std::sync::Arc;
use std::sync::Mutex;

use alloy::primitives::{TxHash, U256};
use async_trait::async_trait;
use httpmock::prelude::*;
use serde_json::{Value, json};

use marketflow::{
    ActionRequest, CheckoutError, CheckoutHandler, CheckoutQuote, ClientConfig, FlowSettings,
    MarketplaceClient, OrderId, TransactionFlow,
};
use marketflow_wallet::MockWallet;

pub const CHAIN_ID: u64 = 1;

pub fn client_for(server: &MockServer) -> Arc<MarketplaceClient> {
    let config = ClientConfig::new(server.base_url().parse().unwrap());
    Arc::new(MarketplaceClient::new(&config).unwrap())
}

/// Settings short enough for real-time confirmation/timeout tests.
pub fn fast_settings() -> FlowSettings {
    FlowSettings {
        confirmation_timeout_ms: 200,
        receipt_poll_interval_ms: 20,
    }
}

pub fn flow_for(
    server: &MockServer,
    wallet: MockWallet,
    action: ActionRequest,
) -> (TransactionFlow<MockWallet>, Arc<MockWallet>) {
    let wallet = Arc::new(wallet);
    let flow = TransactionFlow::new(
        client_for(server),
        wallet.clone(),
        action,
        CHAIN_ID,
        fast_settings(),
    );
    (flow, wallet)
}

pub fn sell_action(order_id: &str) -> ActionRequest {
    ActionRequest::Sell {
        order_id: OrderId::new(order_id).unwrap(),
        quantity: U256::from(1),
    }
}

pub fn buy_action(order_id: &str) -> ActionRequest {
    ActionRequest::Buy {
        order_id: OrderId::new(order_id).unwrap(),
        quantity: U256::from(1),
    }
}

// ── Backend step fixtures ────────────────────────────────────────────

pub fn approval_step() -> Value {
    json!({
        "id": "tokenApproval",
        "to": "0x00000000000000000000000000000000000000aa",
        "data": "0x095ea7b3"
    })
}

pub fn transaction_step(id: &str) -> Value {
    json!({
        "id": id,
        "to": "0x0000000000000000000000000000000000000abc",
        "data": "0x01"
    })
}

pub fn typed_data_step(with_post: bool) -> Value {
    let mut step = json!({
        "id": "signEIP712",
        "signature": {
            "domain": { "name": "Marketplace", "version": "1", "chainId": 1 },
            "types": { "Order": [{ "name": "maker", "type": "address" }] },
            "primaryType": "Order",
            "message": { "maker": "0x00000000000000000000000000000000000000ef" }
        }
    });
    if with_post {
        step["post"] = json!({
            "method": "POST",
            "endpoint": "/orders/create",
            "body": {}
        });
    }
    step
}

pub fn mock_steps<'a>(
    server: &'a MockServer,
    endpoint: &str,
    steps: Vec<Value>,
) -> httpmock::Mock<'a> {
    let path = format!("/{endpoint}");
    server.mock(|when, then| {
        when.method(POST).path(path);
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({ "steps": steps }));
    })
}

pub fn mock_execute<'a>(server: &'a MockServer, order_id: &str) -> httpmock::Mock<'a> {
    let body = json!({ "orderId": order_id });
    server.mock(|when, then| {
        when.method(POST).path("/execute");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(body);
    })
}

pub fn mock_checkout_endpoints(server: &MockServer, order_id: &str) {
    let order_id = order_id.to_string();
    server.mock(|when, then| {
        when.method(POST).path("/checkoutOptionsMarketplace");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "currencies": ["0x00000000000000000000000000000000000000cc"],
                "providers": ["card"]
            }));
    });
    server.mock(move |when, then| {
        when.method(POST).path("/getOrders");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "orders": [{
                    "orderId": order_id,
                    "price": "0x2710",
                    "currency": "0x00000000000000000000000000000000000000cc"
                }]
            }));
    });
}

// ── Checkout handler double ──────────────────────────────────────────

/// Payment UI double resolving with a fixed hash.
pub struct ScriptedCheckout {
    hash: TxHash,
    pub quotes: Mutex<Vec<CheckoutQuote>>,
}

impl ScriptedCheckout {
    pub fn resolving_with(hash: TxHash) -> Self {
        Self {
            hash,
            quotes: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CheckoutHandler for ScriptedCheckout {
    async fn collect_payment(&self, quote: CheckoutQuote) -> Result<TxHash, CheckoutError> {
        self.quotes.lock().unwrap().push(quote);
        Ok(self.hash)
    }
}
