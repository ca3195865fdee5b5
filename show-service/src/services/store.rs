use crate::error::ShowError;
use crate::models::{Show, ShowFilter};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;

/// Persistence for shows, shared by the HTTP handlers and the acceptance
/// updater. Each call is atomic on its own; nothing spans calls.
#[async_trait]
pub trait ShowStore: Send + Sync {
    async fn release_date_exists(&self, release_date: DateTime<Utc>) -> Result<bool, ShowError>;

    /// Inserts and returns the stored show with its generated id.
    ///
    /// Fails with [`ShowError::DuplicateReleaseDate`] when the store itself
    /// rejects a second show for the same release date.
    async fn insert(&self, show: Show) -> Result<Show, ShowError>;

    /// Records that cannot be decoded are skipped.
    async fn list(&self, filter: ShowFilter) -> Result<Vec<Show>, ShowError>;

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<Show>, ShowError>;

    /// Sets `accepted` on a show that is not accepted yet.
    ///
    /// Returns `false` when nothing matched: unknown id or already accepted.
    async fn mark_accepted(&self, id: ObjectId) -> Result<bool, ShowError>;

    async fn health_check(&self) -> Result<(), ShowError>;
}
