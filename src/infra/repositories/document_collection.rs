use crate::domain::ports::{CollectionRepository, DocumentStore};
use crate::error::AppError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;

/// Typed view over one named collection of a `DocumentStore`.
pub struct DocumentCollection<T> {
    store: Arc<dyn DocumentStore>,
    name: &'static str,
    _items: PhantomData<fn() -> T>,
}

impl<T> DocumentCollection<T> {
    pub fn new(store: Arc<dyn DocumentStore>, name: &'static str) -> Self {
        Self { store, name, _items: PhantomData }
    }
}

#[async_trait]
impl<T> CollectionRepository<T> for DocumentCollection<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn read_all(&self) -> Result<Vec<T>, AppError> {
        self.store
            .read_all(self.name)
            .await?
            .into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(AppError::from))
            .collect()
    }

    async fn write_all(&self, items: &[T]) -> Result<(), AppError> {
        let docs = items
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        self.store.write_all(self.name, &docs).await
    }
}
