//! Marketplace backend HTTP client.
//!
//! One POST/JSON endpoint per action type produces that action's
//! ordered step list; a generic `execute` endpoint accepts signature
//! submissions; `checkoutOptionsMarketplace` and `getOrders` feed the
//! buy-side payment sub-flow. Every call is a fresh request — the
//! backend owns pricing and expiry, so nothing here is cached.

use alloy::primitives::{Address, ChainId, Signature, U256, hex};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::action::{ActionRequest, OrderId, OrderTerms};
use crate::config::ClientConfig;
use crate::error::{
    GenerateStepsError, MalformedStepError, NoExecutionStepError, StepGenerationError,
};
use crate::step::{PostStep, Step, WireStep};

/// Errors from the marketplace backend HTTP surface.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend returned {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error(transparent)]
    MalformedStep(#[from] MalformedStepError),
}

/// Backend-accepted payment currencies and providers for a buy.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutOptions {
    #[serde(default)]
    pub currencies: Vec<Address>,
    #[serde(default)]
    pub providers: Vec<String>,
}

/// Canonical order record, the authoritative price source for checkout.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    pub order_id: OrderId,
    pub price: U256,
    pub currency: Address,
    #[serde(default)]
    pub quantity_remaining: Option<U256>,
}

#[derive(Debug, Deserialize)]
struct StepsResponse {
    steps: Vec<WireStep>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteResponse {
    order_id: OrderId,
}

#[derive(Debug, Deserialize)]
struct OrdersResponse {
    orders: Vec<OrderDetail>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderActionRequest<'a> {
    chain_id: ChainId,
    wallet_address: Address,
    order_id: &'a OrderId,
    #[serde(skip_serializing_if = "Option::is_none")]
    quantity: Option<U256>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateOrderRequest {
    chain_id: ChainId,
    wallet_address: Address,
    token_id: U256,
    price: U256,
    currency: Address,
    expiry: u64,
}

impl CreateOrderRequest {
    fn new(terms: &OrderTerms, chain_id: ChainId, wallet_address: Address) -> Self {
        Self {
            chain_id,
            wallet_address,
            token_id: terms.token_id,
            price: terms.price,
            currency: terms.currency,
            expiry: terms.expiry,
        }
    }
}

/// Marketplace backend JSON-RPC-over-HTTP client.
#[derive(Debug, Clone)]
pub struct MarketplaceClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl MarketplaceClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let headers = HeaderMap::from_iter([(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        )]);

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http_client,
            base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Requests the ordered step list for an action.
    ///
    /// The backend is trusted to return steps in execution order
    /// (approval, if present, before the action step); the list is
    /// validated and filtered but never reordered. Raises
    /// [`NoExecutionStepError`] when no transaction and no signature
    /// step is present among the results.
    #[tracing::instrument(skip(self, action), fields(action = %action.kind()), level = tracing::Level::DEBUG)]
    pub async fn generate_steps(
        &self,
        action: &ActionRequest,
        chain_id: ChainId,
        wallet_address: Address,
    ) -> Result<Vec<Step>, GenerateStepsError> {
        let kind = action.kind();

        let result = match action {
            ActionRequest::Buy { order_id, quantity } => {
                let request = OrderActionRequest {
                    chain_id,
                    wallet_address,
                    order_id,
                    quantity: Some(*quantity),
                };
                self.post::<StepsResponse, _>("generateBuyTransaction", &request)
                    .await
            }
            ActionRequest::Sell { order_id, quantity } => {
                let request = OrderActionRequest {
                    chain_id,
                    wallet_address,
                    order_id,
                    quantity: Some(*quantity),
                };
                self.post::<StepsResponse, _>("generateSellTransaction", &request)
                    .await
            }
            ActionRequest::Cancel { order_id } => {
                let request = OrderActionRequest {
                    chain_id,
                    wallet_address,
                    order_id,
                    quantity: None,
                };
                self.post::<StepsResponse, _>("generateCancelTransaction", &request)
                    .await
            }
            ActionRequest::CreateListing(terms) => {
                let request = CreateOrderRequest::new(terms, chain_id, wallet_address);
                self.post::<StepsResponse, _>("generateListingTransaction", &request)
                    .await
            }
            ActionRequest::CreateOffer(terms) => {
                let request = CreateOrderRequest::new(terms, chain_id, wallet_address);
                self.post::<StepsResponse, _>("generateOfferTransaction", &request)
                    .await
            }
        };

        let response = result.map_err(|source| StepGenerationError {
            action: kind,
            source,
        })?;

        let steps = response
            .steps
            .into_iter()
            .map(Step::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| StepGenerationError {
                action: kind,
                source: ApiError::MalformedStep(err),
            })?;

        if !steps.iter().any(Step::is_execution) {
            return Err(NoExecutionStepError { action: kind }.into());
        }

        debug!(count = steps.len(), "received step list");
        Ok(steps)
    }

    /// Submits a produced signature through the step's `post`
    /// descriptor; the backend's response supplies the resulting
    /// order id.
    pub async fn execute_signature(
        &self,
        signature: &Signature,
        post: &PostStep,
    ) -> Result<OrderId, ApiError> {
        let body = json!({
            "signature": hex::encode_prefixed(signature.as_bytes()),
            "method": post.method,
            "endpoint": post.endpoint,
            "body": post.body,
        });

        debug!(endpoint = %post.endpoint, "submitting signature to execute endpoint");

        let response: ExecuteResponse = self.post("execute", &body).await?;
        Ok(response.order_id)
    }

    /// Accepted payment currencies/providers for a buy action.
    pub async fn checkout_options(
        &self,
        order_id: &OrderId,
    ) -> Result<CheckoutOptions, ApiError> {
        self.post(
            "checkoutOptionsMarketplace",
            &json!({ "orderId": order_id }),
        )
        .await
    }

    /// Fetches the canonical order record, `None` when the backend no
    /// longer knows the order.
    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<OrderDetail>, ApiError> {
        let response: OrdersResponse = self
            .post("getOrders", &json!({ "orderIds": [order_id] }))
            .await?;

        Ok(response
            .orders
            .into_iter()
            .find(|order| &order.order_id == order_id))
    }

    async fn post<T: serde::de::DeserializeOwned + Send, B: Serialize + Sync>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = format!("{}/{method}", self.base_url);
        let response = self.http_client.post(&url).json(body).send().await?;

        self.handle_response(response).await
    }

    async fn handle_response<T: serde::de::DeserializeOwned + Send>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let error_body = response.text().await.unwrap_or_default();

        Err(ApiError::Api {
            status,
            body: error_body,
        })
    }
}
