//! Receipt polling with a hard deadline.

use std::time::Duration;

use alloy::primitives::TxHash;
use marketflow_wallet::{TxReceipt, WalletProvider};
use tokio::time::{interval, sleep};
use tracing::{debug, warn};

use crate::error::ConfirmationError;

/// Waits for the receipt of a broadcast transaction.
///
/// Polls the wallet's receipt lookup on `poll_interval`, raced against
/// a `timeout` deadline; whichever resolves first wins and the loser
/// is dropped. Three outcomes: a success receipt is returned, a
/// failure receipt raises [`ConfirmationError::Reverted`], and the
/// deadline raises [`ConfirmationError::TimedOut`] — the transaction
/// may still land later, so timeout is kept distinct from failure.
pub async fn await_receipt<W: WalletProvider>(
    wallet: &W,
    hash: TxHash,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<TxReceipt, ConfirmationError> {
    let deadline = sleep(timeout);
    tokio::pin!(deadline);

    let mut poll = interval(poll_interval);

    loop {
        tokio::select! {
            () = &mut deadline => {
                warn!(%hash, ?timeout, "no receipt before deadline");
                return Err(ConfirmationError::TimedOut { hash, timeout });
            }
            _ = poll.tick() => {
                match wallet.transaction_receipt(hash).await {
                    Ok(Some(receipt)) if receipt.status => {
                        debug!(%hash, block = ?receipt.block_number, "transaction confirmed");
                        return Ok(receipt);
                    }
                    Ok(Some(receipt)) => {
                        return Err(ConfirmationError::Reverted { hash: receipt.hash });
                    }
                    Ok(None) => debug!(%hash, "receipt not yet available"),
                    Err(source) => {
                        return Err(ConfirmationError::Receipt { hash, source });
                    }
                }
            }
        }
    }
}
