use crate::domain::models::settings::AdminSettings;
use crate::domain::ports::CollectionRepository;
use crate::error::AppError;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Admin settings, read from the store on first use and cached afterwards.
pub struct SettingsService {
    repo: Arc<dyn CollectionRepository<AdminSettings>>,
    cache: RwLock<Option<AdminSettings>>,
}

impl SettingsService {
    pub fn new(repo: Arc<dyn CollectionRepository<AdminSettings>>) -> Self {
        Self { repo, cache: RwLock::new(None) }
    }

    pub async fn get(&self) -> Result<AdminSettings, AppError> {
        if let Some(settings) = self.cache.read().await.as_ref() {
            return Ok(settings.clone());
        }

        let mut cache = self.cache.write().await;
        if let Some(settings) = cache.as_ref() {
            return Ok(settings.clone());
        }

        let loaded = self.repo.read_all().await?.into_iter().next().unwrap_or_default();
        *cache = Some(loaded.clone());
        Ok(loaded)
    }

    pub async fn save(&self, settings: AdminSettings) -> Result<AdminSettings, AppError> {
        let mut cache = self.cache.write().await;
        self.repo.write_all(std::slice::from_ref(&settings)).await?;
        *cache = Some(settings.clone());

        info!(
            auto_block_sundays = settings.auto_block_sundays,
            require_deposit = settings.require_deposit,
            email_notifications = settings.email_notifications,
            "Admin settings saved"
        );
        Ok(settings)
    }
}
