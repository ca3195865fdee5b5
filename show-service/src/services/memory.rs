use crate::error::ShowError;
use crate::models::{Show, ShowFilter};
use crate::services::store::ShowStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-local store with the same matching rules as [`ShowDb`], including
/// the one-show-per-release-date constraint.
///
/// [`ShowDb`]: crate::services::ShowDb
#[derive(Clone, Default)]
pub struct InMemoryShowStore {
    shows: Arc<RwLock<Vec<Show>>>,
}

impl InMemoryShowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.shows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.shows.read().await.is_empty()
    }
}

#[async_trait]
impl ShowStore for InMemoryShowStore {
    async fn release_date_exists(&self, release_date: DateTime<Utc>) -> Result<bool, ShowError> {
        Ok(self
            .shows
            .read()
            .await
            .iter()
            .any(|show| show.release_date == release_date))
    }

    async fn insert(&self, mut show: Show) -> Result<Show, ShowError> {
        let mut shows = self.shows.write().await;
        if shows.iter().any(|s| s.release_date == show.release_date) {
            return Err(ShowError::DuplicateReleaseDate);
        }

        show.id = Some(ObjectId::new());
        shows.push(show.clone());
        Ok(show)
    }

    async fn list(&self, filter: ShowFilter) -> Result<Vec<Show>, ShowError> {
        Ok(self
            .shows
            .read()
            .await
            .iter()
            .filter(|show| filter.matches(show))
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<Show>, ShowError> {
        Ok(self
            .shows
            .read()
            .await
            .iter()
            .find(|show| show.id == Some(id))
            .cloned())
    }

    async fn mark_accepted(&self, id: ObjectId) -> Result<bool, ShowError> {
        let mut shows = self.shows.write().await;
        match shows
            .iter_mut()
            .find(|show| show.id == Some(id) && !show.accepted)
        {
            Some(show) => {
                show.accepted = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn health_check(&self) -> Result<(), ShowError> {
        Ok(())
    }
}
