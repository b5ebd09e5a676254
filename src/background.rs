use crate::domain::ports::{Notifier, TemplateFields};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{error, info, info_span, warn, Instrument};

pub fn notification_channel() -> (mpsc::UnboundedSender<TemplateFields>, mpsc::UnboundedReceiver<TemplateFields>) {
    mpsc::unbounded_channel()
}

/// Delivers queued notifications one at a time until every sender is gone.
pub async fn start_notification_worker(
    mut queue: mpsc::UnboundedReceiver<TemplateFields>,
    notifier: Arc<dyn Notifier>,
    send_timeout: Duration,
) {
    info!("Starting notification worker...");

    while let Some(fields) = queue.recv().await {
        let subject = fields.get("_subject").cloned().unwrap_or_default();
        let span = info_span!("notification", subject = %subject);

        async {
            match timeout(send_timeout, notifier.send(&fields)).await {
                Ok(Ok(())) => info!("Notification delivered"),
                Ok(Err(e)) => error!("Notification failed: {}", e),
                Err(_) => warn!("Notification timed out after {:?}", send_timeout),
            }
        }
        .instrument(span)
        .await;
    }

    info!("Notification queue closed, worker stopping");
}
