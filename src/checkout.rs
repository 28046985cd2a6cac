//! Buy-side payment facilitation sub-flow.
//!
//! A buy whose execution step needs payment facilitation (e.g. the
//! buyer pays in a different currency than the listing's) is not
//! executed through the step executor. The flow resolves the
//! authoritative price and the accepted payment options, then hands
//! control to an external payment UI which performs the on-chain
//! transaction and/or an off-platform payment rail itself.

use alloy::primitives::{Address, Bytes, TxHash, U256};
use async_trait::async_trait;
use tracing::info;

use crate::action::OrderId;
use crate::api::{CheckoutOptions, MarketplaceClient};
use crate::error::CheckoutError;
use crate::step::TransactionStep;

/// Everything the external payment UI needs to collect payment.
#[derive(Debug, Clone)]
pub struct CheckoutQuote {
    pub order_id: OrderId,
    /// Authoritative price from the canonical order record, not from
    /// whatever the UI last displayed.
    pub price: U256,
    pub currency: Address,
    pub to: Option<Address>,
    pub data: Option<Bytes>,
    pub options: CheckoutOptions,
}

/// External payment UI capability.
///
/// The flow suspends on `collect_payment` until the UI reports a
/// terminal outcome; the resulting hash feeds the confirmation waiter.
#[async_trait]
pub trait CheckoutHandler: Send + Sync + 'static {
    async fn collect_payment(&self, quote: CheckoutQuote) -> Result<TxHash, CheckoutError>;
}

/// Resolves checkout options and the canonical order concurrently,
/// then hands off to the payment UI. Either fetch failing aborts the
/// sub-flow before any side effect.
pub(crate) async fn run_checkout(
    client: &MarketplaceClient,
    handler: &dyn CheckoutHandler,
    order_id: &OrderId,
    step: &TransactionStep,
) -> Result<TxHash, CheckoutError> {
    let (options, order) = tokio::try_join!(
        async {
            client
                .checkout_options(order_id)
                .await
                .map_err(CheckoutError::Options)
        },
        async {
            client
                .fetch_order(order_id)
                .await
                .map_err(CheckoutError::Orders)
        },
    )?;

    let order = order.ok_or_else(|| CheckoutError::OrderNotFound(order_id.clone()))?;

    info!(%order_id, price = %order.price, "handing off to payment ui");

    handler
        .collect_payment(CheckoutQuote {
            order_id: order_id.clone(),
            price: order.price,
            currency: order.currency,
            to: step.to,
            data: step.data.clone(),
            options,
        })
        .await
}
