use crate::error::ShowError;
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Queue payload asking for a show to be marked accepted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AcceptanceMessage {
    #[serde(rename = "showId")]
    pub show_id: String,
}

impl AcceptanceMessage {
    pub fn from_slice(payload: &[u8]) -> Result<Self, ShowError> {
        Ok(serde_json::from_slice(payload)?)
    }

    pub fn object_id(&self) -> Result<ObjectId, ShowError> {
        ObjectId::parse_str(&self.show_id)
            .map_err(|_| ShowError::InvalidIdentifier(self.show_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_show_id() {
        let message = AcceptanceMessage::from_slice(br#"{"showId":"65f0c0ffee0000000000beef"}"#)
            .unwrap();
        assert_eq!(
            message.object_id().unwrap().to_hex(),
            "65f0c0ffee0000000000beef"
        );
    }

    #[test]
    fn rejects_non_json_payload() {
        let err = AcceptanceMessage::from_slice(b"accept 42").unwrap_err();
        assert!(matches!(err, ShowError::MessageDecode(_)));
    }

    #[test]
    fn rejects_malformed_identifier() {
        let message = AcceptanceMessage::from_slice(br#"{"showId":"not-hex"}"#).unwrap();
        assert!(matches!(
            message.object_id(),
            Err(ShowError::InvalidIdentifier(id)) if id == "not-hex"
        ));
    }
}
