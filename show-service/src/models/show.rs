use chrono::{DateTime, SubsecRound, Utc};
use mongodb::bson::{
    doc, oid::ObjectId, serde_helpers::chrono_datetime_as_bson_datetime, Document,
};
use serde::{Deserialize, Serialize};

/// A festival show submission as persisted in the store.
///
/// `accepted` is absent on documents written without it and decodes as
/// `false`. It is only ever flipped to `true` by the acceptance updater.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Show {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub release_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub performers: Vec<String>,
    #[serde(default)]
    pub accepted: bool,
}

impl Show {
    pub fn new(
        name: Option<String>,
        release_date: DateTime<Utc>,
        description: Option<String>,
        performers: Vec<String>,
    ) -> Self {
        Self {
            id: None,
            name,
            release_date: normalize_release_date(release_date),
            description,
            performers,
            accepted: false,
        }
    }
}

/// Truncates to the millisecond precision of BSON datetimes so duplicate
/// checks compare the same instant the store will hold.
pub fn normalize_release_date(release_date: DateTime<Utc>) -> DateTime<Utc> {
    release_date.trunc_subsecs(3)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowFilter {
    All,
    Accepted,
    /// Anything not yet accepted, whether `accepted` is `false` or missing.
    Unaccepted,
}

impl ShowFilter {
    pub fn to_document(self) -> Document {
        match self {
            ShowFilter::All => doc! {},
            ShowFilter::Accepted => doc! { "accepted": true },
            ShowFilter::Unaccepted => doc! { "accepted": { "$ne": true } },
        }
    }

    pub fn matches(self, show: &Show) -> bool {
        match self {
            ShowFilter::All => true,
            ShowFilter::Accepted => show.accepted,
            ShowFilter::Unaccepted => !show.accepted,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ShowFilter::All => "all",
            ShowFilter::Accepted => "accepted",
            ShowFilter::Unaccepted => "unaccepted",
        }
    }
}
