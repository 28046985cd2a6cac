//! Concrete side effects for a single step.
//!
//! Transaction-shaped steps become a wallet broadcast returning a
//! hash; signature-shaped steps become a wallet signature followed by
//! a backend submission returning an order id. The wallet interaction
//! (which may prompt the user) strictly happens-before any backend
//! submission for the same step.

use std::sync::Arc;

use alloy::primitives::{ChainId, TxHash};
use marketflow_wallet::{TransactionEnvelope, WalletProvider};
use tracing::info;

use crate::action::OrderId;
use crate::api::MarketplaceClient;
use crate::error::StepError;
use crate::step::{SignMessageStep, SignTypedDataStep, Step, StepKind, TransactionStep};

/// Outcome of running one execution-phase step.
///
/// Exactly one of the two payloads exists on success: a broadcast
/// hash still awaiting confirmation, or an order id whose signature
/// submission was itself the confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    Transaction { hash: TxHash },
    Signature { order_id: OrderId },
}

/// Runs individual steps against the wallet and backend.
pub struct StepExecutor<W> {
    wallet: Arc<W>,
    client: Arc<MarketplaceClient>,
}

impl<W: WalletProvider> StepExecutor<W> {
    pub fn new(wallet: Arc<W>, client: Arc<MarketplaceClient>) -> Self {
        Self { wallet, client }
    }

    /// Performs the step's side effect on the given chain.
    ///
    /// Approval steps are transaction-shaped and handled identically
    /// to other transaction steps; treating their completion as a gate
    /// is the orchestrator's concern.
    pub async fn execute(
        &self,
        step: &Step,
        chain_id: ChainId,
    ) -> Result<ExecutionResult, StepError> {
        match step {
            Step::Transaction(tx) => self.send_transaction(tx, chain_id).await,
            Step::SignTypedData(sign) => self.sign_typed_data(sign).await,
            Step::SignMessage(sign) => self.sign_message(sign).await,
            Step::Unknown { id } => Err(StepError::UnknownKind { id: id.clone() }),
        }
    }

    async fn send_transaction(
        &self,
        step: &TransactionStep,
        chain_id: ChainId,
    ) -> Result<ExecutionResult, StepError> {
        if step.to.is_none() && step.data.is_none() {
            return Err(StepError::MissingStepData { kind: step.kind });
        }

        let envelope = TransactionEnvelope {
            to: step.to,
            data: step.data.clone(),
            value: step.value,
            gas_limit: step.gas.gas_limit,
            max_fee_per_gas: step.gas.max_fee_per_gas,
            max_priority_fee_per_gas: step.gas.max_priority_fee_per_gas,
            chain_id,
        };

        let hash = self.wallet.send_transaction(envelope).await?;
        info!(%hash, kind = %step.kind, "transaction broadcast");

        Ok(ExecutionResult::Transaction { hash })
    }

    async fn sign_typed_data(
        &self,
        step: &SignTypedDataStep,
    ) -> Result<ExecutionResult, StepError> {
        let post = step.post.as_ref().ok_or(StepError::MissingPost {
            kind: StepKind::SignTypedData,
        })?;

        let signature = self.wallet.sign_typed_data(&step.typed_data).await?;

        let order_id = self
            .client
            .execute_signature(&signature, post)
            .await
            .map_err(|source| StepError::Execution {
                kind: StepKind::SignTypedData,
                source,
            })?;
        info!(%order_id, "typed-data signature accepted");

        Ok(ExecutionResult::Signature { order_id })
    }

    async fn sign_message(&self, step: &SignMessageStep) -> Result<ExecutionResult, StepError> {
        let post = step.post.as_ref().ok_or(StepError::MissingPost {
            kind: StepKind::SignMessage,
        })?;

        let signature = self.wallet.sign_message(&step.message).await?;

        let order_id = self
            .client
            .execute_signature(&signature, post)
            .await
            .map_err(|source| StepError::Execution {
                kind: StepKind::SignMessage,
                source,
            })?;
        info!(%order_id, "message signature accepted");

        Ok(ExecutionResult::Signature { order_id })
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{Address, Bytes, U256};
    use httpmock::prelude::*;
    use marketflow_wallet::{MockWallet, WalletError};

    use super::*;
    use crate::config::ClientConfig;
    use crate::step::{GasOverrides, PostStep, WireStep};

    fn executor_with(
        wallet: MockWallet,
        server: &MockServer,
    ) -> (StepExecutor<MockWallet>, Arc<MockWallet>) {
        let config = ClientConfig::new(server.base_url().parse().unwrap());
        let client = Arc::new(MarketplaceClient::new(&config).unwrap());
        let wallet = Arc::new(wallet);
        (StepExecutor::new(wallet.clone(), client), wallet)
    }

    fn transaction_step(kind: StepKind) -> Step {
        Step::Transaction(TransactionStep {
            kind,
            to: Some(Address::repeat_byte(0xab)),
            data: Some(Bytes::from_static(&[0x01])),
            value: None,
            gas: GasOverrides::default(),
        })
    }

    fn typed_data_step(post: Option<PostStep>) -> Step {
        let wire: WireStep = serde_json::from_value(serde_json::json!({
            "id": "signEIP712",
            "signature": {
                "domain": { "name": "Marketplace", "version": "1", "chainId": 1 },
                "types": { "Order": [{ "name": "maker", "type": "address" }] },
                "primaryType": "Order",
                "message": { "maker": "0x00000000000000000000000000000000000000ef" }
            }
        }))
        .unwrap();
        let Step::SignTypedData(mut step) = Step::try_from(wire).unwrap() else {
            panic!("expected typed-data step");
        };
        step.post = post;
        Step::SignTypedData(step)
    }

    #[tokio::test]
    async fn transaction_step_broadcasts_and_returns_hash() {
        let server = MockServer::start();
        let (executor, wallet) = executor_with(MockWallet::on_chain(1), &server);

        let result = executor
            .execute(&transaction_step(StepKind::Sell), 1)
            .await
            .unwrap();

        assert!(matches!(result, ExecutionResult::Transaction { .. }));
        let sent = wallet.sent_transactions();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].chain_id, 1);
        assert_eq!(sent[0].to, Some(Address::repeat_byte(0xab)));
    }

    #[tokio::test]
    async fn step_without_to_and_data_never_reaches_wallet() {
        let server = MockServer::start();
        let (executor, wallet) = executor_with(MockWallet::on_chain(1), &server);

        let step = Step::Transaction(TransactionStep {
            kind: StepKind::Buy,
            to: None,
            data: None,
            value: None,
            gas: GasOverrides::default(),
        });

        let err = executor.execute(&step, 1).await.unwrap_err();

        assert!(matches!(
            err,
            StepError::MissingStepData {
                kind: StepKind::Buy
            }
        ));
        assert!(wallet.sent_transactions().is_empty());
    }

    #[tokio::test]
    async fn signature_step_without_post_fails_before_signing() {
        let server = MockServer::start();
        let (executor, _wallet) = executor_with(MockWallet::on_chain(1), &server);

        let err = executor
            .execute(&typed_data_step(None), 1)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StepError::MissingPost {
                kind: StepKind::SignTypedData
            }
        ));
    }

    #[tokio::test]
    async fn signature_step_submits_to_backend() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/execute");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(serde_json::json!({ "orderId": "0xbeef" }));
        });
        let (executor, _wallet) = executor_with(MockWallet::on_chain(1), &server);

        let step = typed_data_step(Some(PostStep {
            method: "POST".to_string(),
            endpoint: "/orders/create".to_string(),
            body: serde_json::json!({}),
        }));

        let result = executor.execute(&step, 1).await.unwrap();

        mock.assert();
        let ExecutionResult::Signature { order_id } = result else {
            panic!("expected signature result, got {result:?}");
        };
        assert_eq!(order_id.as_str(), "0xbeef");
    }

    #[tokio::test]
    async fn backend_rejection_is_not_retried() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/execute");
            then.status(400)
                .header("content-type", "application/json")
                .json_body(serde_json::json!({ "message": "order expired" }));
        });
        let (executor, _wallet) = executor_with(MockWallet::on_chain(1), &server);

        let step = typed_data_step(Some(PostStep {
            method: "POST".to_string(),
            endpoint: "/orders/create".to_string(),
            body: serde_json::json!({}),
        }));

        let err = executor.execute(&step, 1).await.unwrap_err();

        mock.assert_hits(1);
        assert!(matches!(
            err,
            StepError::Execution {
                kind: StepKind::SignTypedData,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn user_rejection_surfaces_as_wallet_error() {
        let server = MockServer::start();
        let (executor, _wallet) =
            executor_with(MockWallet::on_chain(1).rejecting_transactions(), &server);

        let err = executor
            .execute(&transaction_step(StepKind::Sell), 1)
            .await
            .unwrap_err();

        assert!(matches!(err, StepError::Wallet(WalletError::Rejected)));
    }

    #[tokio::test]
    async fn unknown_step_is_never_actionable() {
        let server = MockServer::start();
        let (executor, _wallet) = executor_with(MockWallet::on_chain(1), &server);

        let step = Step::Unknown {
            id: "futureStepKind".to_string(),
        };

        let err = executor.execute(&step, 1).await.unwrap_err();

        assert!(matches!(err, StepError::UnknownKind { id } if id == "futureStepKind"));
    }
}
