use crate::models::Show;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Body of `POST /show/add`.
///
/// Every field except `releaseDate` is free text and may be empty. The size
/// limits only guard against oversized payloads. Any `accepted` value sent
/// by the caller is ignored; new shows always start unaccepted.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateShowRequest {
    #[validate(length(max = 1024))]
    pub name: Option<String>,
    pub release_date: DateTime<Utc>,
    #[validate(length(max = 65536))]
    pub description: Option<String>,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub performers: Vec<String>,
}

impl CreateShowRequest {
    pub fn into_show(self) -> Show {
        Show::new(
            self.name,
            self.release_date,
            self.description,
            self.performers,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShowResponse {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub release_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub performers: Vec<String>,
    pub accepted: bool,
}

impl From<Show> for ShowResponse {
    fn from(show: Show) -> Self {
        Self {
            id: show.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: show.name,
            release_date: show.release_date,
            description: show.description,
            performers: show.performers,
            accepted: show.accepted,
        }
    }
}
