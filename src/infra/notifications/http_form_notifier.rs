use crate::domain::ports::{Notifier, TemplateFields};
use crate::error::AppError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::error;

/// Posts the template fields as a urlencoded form to a mail relay.
pub struct HttpFormNotifier {
    client: Client,
    url: String,
}

impl HttpFormNotifier {
    pub fn new(url: String, timeout: Duration) -> Self {
        Self {
            client: Client::builder().timeout(timeout).build().unwrap_or_else(|_| Client::new()),
            url,
        }
    }
}

#[async_trait]
impl Notifier for HttpFormNotifier {
    async fn send(&self, fields: &TemplateFields) -> Result<(), AppError> {
        let res = self.client.post(&self.url)
            .form(fields)
            .send()
            .await
            .map_err(|e| {
                let msg = format!("Notifier connection error: {}", e);
                error!("{}", msg);
                AppError::Internal(msg)
            })?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            let msg = format!("Notifier failed. Status: {}, Body: {}", status, text);
            error!("{}", msg);
            return Err(AppError::Internal(msg));
        }

        Ok(())
    }
}
