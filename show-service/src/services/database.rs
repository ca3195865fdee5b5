use crate::error::ShowError;
use crate::models::{Show, ShowFilter};
use crate::services::store::ShowStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc, oid::ObjectId, DateTime as BsonDateTime, Document},
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
    Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;

const DUPLICATE_KEY_CODE: i32 = 11000;

const DUPLICATE_RELEASE_DATES_HINT: &str =
    "the collection already holds shows sharing a release date; remove the duplicates and restart";

#[derive(Clone)]
pub struct ShowDb {
    client: MongoClient,
    db: Database,
    collection: String,
}

impl ShowDb {
    pub async fn connect(uri: &str, database: &str, collection: &str) -> Result<Self, AppError> {
        tracing::info!(database = %database, collection = %collection, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::from(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self {
            client,
            db,
            collection: collection.to_string(),
        })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for show-service");

        // One show per release date; also closes the check-then-insert race in add
        let release_date_index = IndexModel::builder()
            .keys(doc! { "release_date": 1 })
            .options(
                IndexOptions::builder()
                    .name("release_date_unique".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        let accepted_index = IndexModel::builder()
            .keys(doc! { "accepted": 1 })
            .options(
                IndexOptions::builder()
                    .name("accepted_idx".to_string())
                    .build(),
            )
            .build();

        self.shows()
            .create_indexes([release_date_index, accepted_index], None)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    tracing::error!(
                        collection = %self.collection,
                        "Cannot create unique release_date index, {}: {}",
                        DUPLICATE_RELEASE_DATES_HINT,
                        e
                    );
                    return AppError::DatabaseError(anyhow::anyhow!(
                        "Unique release_date index failed, {}: {}",
                        DUPLICATE_RELEASE_DATES_HINT,
                        e
                    ));
                }
                tracing::error!(
                    collection = %self.collection,
                    "Failed to create show indexes: {}",
                    e
                );
                AppError::from(e)
            })?;

        tracing::info!("Created indexes on shows.release_date and shows.accepted");
        Ok(())
    }

    pub fn shows(&self) -> Collection<Show> {
        self.db.collection(&self.collection)
    }

    /// Untyped view used where a single bad record must not fail a listing.
    fn raw_shows(&self) -> Collection<Document> {
        self.db.collection(&self.collection)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

/// Duplicate key from an insert (write error) or from building a unique
/// index over existing data (command error).
fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY_CODE
        }
        ErrorKind::Command(command_error) => command_error.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}

/// Decodes one stored record, logging and skipping it when it does not
/// match the `Show` shape.
fn decode_show(document: Document) -> Option<Show> {
    match bson::from_document::<Show>(document) {
        Ok(show) => Some(show),
        Err(e) => {
            tracing::warn!("Skipping undecodable show record: {}", e);
            None
        }
    }
}

#[async_trait]
impl ShowStore for ShowDb {
    async fn release_date_exists(&self, release_date: DateTime<Utc>) -> Result<bool, ShowError> {
        let filter = doc! { "release_date": BsonDateTime::from_chrono(release_date) };
        let existing = self.raw_shows().find_one(filter, None).await.map_err(|e| {
            tracing::error!("Failed to look up show by release date: {}", e);
            ShowError::from(e)
        })?;

        Ok(existing.is_some())
    }

    async fn insert(&self, mut show: Show) -> Result<Show, ShowError> {
        let result = self.shows().insert_one(&show, None).await.map_err(|e| {
            if is_duplicate_key(&e) {
                tracing::warn!(release_date = %show.release_date, "Duplicate release date rejected by index");
                ShowError::DuplicateReleaseDate
            } else {
                tracing::error!("Failed to insert show: {}", e);
                ShowError::from(e)
            }
        })?;

        let id = result.inserted_id.as_object_id().ok_or_else(|| {
            ShowError::Store(anyhow::anyhow!(
                "Inserted show id is not an ObjectId: {}",
                result.inserted_id
            ))
        })?;
        show.id = Some(id);
        Ok(show)
    }

    async fn list(&self, filter: ShowFilter) -> Result<Vec<Show>, ShowError> {
        let mut cursor = self
            .raw_shows()
            .find(filter.to_document(), None)
            .await
            .map_err(|e| {
                tracing::error!(filter = filter.as_str(), "Failed to list shows: {}", e);
                ShowError::from(e)
            })?;

        let mut shows = Vec::new();
        while let Some(document) = cursor.try_next().await.map_err(|e| {
            tracing::error!(filter = filter.as_str(), "Failed to iterate shows: {}", e);
            ShowError::from(e)
        })? {
            shows.extend(decode_show(document));
        }

        Ok(shows)
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<Show>, ShowError> {
        let raw = self
            .raw_shows()
            .find_one(doc! { "_id": id }, None)
            .await
            .map_err(|e| {
                tracing::error!(show_id = %id, "Failed to find show: {}", e);
                ShowError::from(e)
            })?;

        raw.map(|document| {
            bson::from_document(document).map_err(|e| {
                ShowError::Store(anyhow::anyhow!("Show {} could not be decoded: {}", id, e))
            })
        })
        .transpose()
    }

    async fn mark_accepted(&self, id: ObjectId) -> Result<bool, ShowError> {
        let filter = doc! { "_id": id, "accepted": { "$ne": true } };
        let update = doc! { "$set": { "accepted": true } };

        let result = self
            .shows()
            .update_one(filter, update, None)
            .await
            .map_err(|e| {
                tracing::error!(show_id = %id, "Failed to mark show accepted: {}", e);
                ShowError::from(e)
            })?;

        Ok(result.matched_count > 0)
    }

    async fn health_check(&self) -> Result<(), ShowError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                ShowError::from(e)
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn undecodable_records_are_skipped() {
        let release_date = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let documents = vec![
            doc! { "name": "no release date" },
            doc! {
                "_id": ObjectId::new(),
                "name": "Quarks",
                "release_date": BsonDateTime::from_chrono(release_date),
                "accepted": false,
            },
            doc! { "release_date": "next tuesday" },
            doc! { "release_date": BsonDateTime::from_chrono(release_date) },
        ];

        let shows: Vec<Show> = documents.into_iter().filter_map(decode_show).collect();

        assert_eq!(shows.len(), 2);
        assert_eq!(shows[0].name.as_deref(), Some("Quarks"));
        assert_eq!(shows[1].release_date, release_date);
        assert!(!shows[1].accepted);
    }

    async fn test_db() -> ShowDb {
        let uri = std::env::var("TEST_MONGODB_URI")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
        let db = ShowDb::connect(
            &uri,
            &format!("show_test_{}", ObjectId::new().to_hex()),
            "shows",
        )
        .await
        .expect("Failed to connect to MongoDB");
        db.initialize_indexes()
            .await
            .expect("Failed to create indexes");
        db
    }

    #[tokio::test]
    #[ignore] // Requires running MongoDB
    async fn unique_index_rejects_second_show_for_same_date() {
        let db = test_db().await;
        let release_date = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();

        let first = db
            .insert(Show::new(Some("Quarks".into()), release_date, None, vec![]))
            .await
            .unwrap();
        assert!(first.id.is_some());

        let second = db
            .insert(Show::new(Some("Leptons".into()), release_date, None, vec![]))
            .await;
        assert!(matches!(second, Err(ShowError::DuplicateReleaseDate)));

        let _ = db.database().drop(None).await;
    }

    #[tokio::test]
    #[ignore] // Requires running MongoDB
    async fn mark_accepted_is_idempotent_and_lists_follow() {
        let db = test_db().await;
        let release_date = Utc.with_ymd_and_hms(2024, 5, 2, 10, 0, 0).unwrap();
        let stored = db
            .insert(Show::new(Some("Quarks".into()), release_date, None, vec![]))
            .await
            .unwrap();
        let id = stored.id.unwrap();

        assert_eq!(db.list(ShowFilter::Unaccepted).await.unwrap().len(), 1);
        assert!(db.mark_accepted(id).await.unwrap());
        assert!(!db.mark_accepted(id).await.unwrap());

        let accepted = db.list(ShowFilter::Accepted).await.unwrap();
        assert_eq!(accepted.len(), 1);
        assert!(accepted[0].accepted);
        assert!(db.list(ShowFilter::Unaccepted).await.unwrap().is_empty());

        let _ = db.database().drop(None).await;
    }

    #[tokio::test]
    #[ignore] // Requires running MongoDB
    async fn listing_skips_undecodable_records() {
        let db = test_db().await;
        db.raw_shows()
            .insert_one(doc! { "name": "no release date" }, None)
            .await
            .unwrap();
        db.insert(Show::new(None, Utc::now(), None, vec![]))
            .await
            .unwrap();

        assert_eq!(db.list(ShowFilter::All).await.unwrap().len(), 1);

        let _ = db.database().drop(None).await;
    }

    #[tokio::test]
    #[ignore] // Requires running MongoDB
    async fn index_creation_names_duplicate_release_dates() {
        let uri = std::env::var("TEST_MONGODB_URI")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
        let db = ShowDb::connect(
            &uri,
            &format!("show_test_{}", ObjectId::new().to_hex()),
            "shows",
        )
        .await
        .expect("Failed to connect to MongoDB");
        let release_date =
            BsonDateTime::from_chrono(Utc.with_ymd_and_hms(2024, 5, 3, 10, 0, 0).unwrap());
        db.raw_shows()
            .insert_many(
                [
                    doc! { "release_date": release_date },
                    doc! { "release_date": release_date },
                ],
                None,
            )
            .await
            .unwrap();

        let err = db.initialize_indexes().await.unwrap_err();

        assert!(err.to_string().contains(DUPLICATE_RELEASE_DATES_HINT));
        let _ = db.database().drop(None).await;
    }
}
