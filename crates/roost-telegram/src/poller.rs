//! Long-polling loop for Telegram Bot API `getUpdates`.
//!
//! Forwards raw [`Update`]s through a channel; the dispatch layer decides
//! what each update means. Errors back off exponentially up to one minute.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::api::TelegramApi;
use crate::types::Update;

/// Run the long-polling loop until the cancellation token fires or the
/// update channel is closed.
pub async fn poll_loop(
    api: Arc<TelegramApi>,
    poll_timeout: u64,
    update_tx: mpsc::Sender<Update>,
    mut cancel: watch::Receiver<bool>,
) {
    let mut offset: Option<i64> = None;
    let mut backoff_secs = 1u64;

    info!("telegram poller started");

    loop {
        if *cancel.borrow() {
            info!("telegram poller shutting down");
            return;
        }

        let updates = tokio::select! {
            result = api.get_updates(offset, poll_timeout) => result,
            _ = cancel.changed() => {
                info!("telegram poller cancelled");
                return;
            }
        };

        match updates {
            Ok(updates) => {
                backoff_secs = 1;
                for update in updates {
                    // Advance offset to acknowledge this update.
                    offset = Some(update.update_id + 1);
                    if update_tx.send(update).await.is_err() {
                        warn!("update channel closed, stopping poller");
                        return;
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, backoff_secs, "getUpdates failed, backing off");
                tokio::time::sleep(std::time::Duration::from_secs(backoff_secs)).await;
                backoff_secs = (backoff_secs * 2).min(60);
            }
        }
    }
}
