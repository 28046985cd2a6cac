//! Active-network guard.
//!
//! Every action names a required chain; no step may execute while the
//! wallet is connected elsewhere.

use alloy::primitives::ChainId;
use marketflow_wallet::WalletProvider;
use tracing::{debug, info};

use crate::error::ChainSwitchError;

/// Ensures the wallet's active network matches `required`.
///
/// Idempotent: succeeds immediately with no observable effect when the
/// chains already match. Otherwise requests a wallet-driven network
/// switch, which may suspend on user confirmation in the wallet UI.
pub async fn ensure_chain<W: WalletProvider>(
    wallet: &W,
    required: ChainId,
) -> Result<(), ChainSwitchError> {
    let current = match wallet.chain_id().await {
        Ok(chain_id) => chain_id,
        Err(source) => {
            return Err(ChainSwitchError {
                current: None,
                required,
                source,
            });
        }
    };

    if current == required {
        debug!(chain = required, "wallet already on required chain");
        return Ok(());
    }

    info!(from = current, to = required, "requesting wallet network switch");

    wallet
        .switch_chain(required)
        .await
        .map_err(|source| ChainSwitchError {
            current: Some(current),
            required,
            source,
        })
}

#[cfg(test)]
mod tests {
    use marketflow_wallet::MockWallet;

    use super::*;

    #[tokio::test]
    async fn matching_chain_is_a_no_op() {
        let wallet = MockWallet::on_chain(1);

        ensure_chain(&wallet, 1).await.unwrap();

        assert!(wallet.requested_switches().is_empty());
    }

    #[tokio::test]
    async fn mismatched_chain_triggers_switch() {
        let wallet = MockWallet::on_chain(1);

        ensure_chain(&wallet, 137).await.unwrap();

        assert_eq!(wallet.requested_switches(), vec![137]);
        assert_eq!(wallet.chain_id().await.unwrap(), 137);
    }

    #[tokio::test]
    async fn rejected_switch_reports_both_chains() {
        let wallet = MockWallet::on_chain(1).rejecting_switch();

        let err = ensure_chain(&wallet, 137).await.unwrap_err();

        assert_eq!(err.current, Some(1));
        assert_eq!(err.required, 137);
    }
}
