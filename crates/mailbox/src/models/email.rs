//! Email records produced by a fetch

use serde::{Deserialize, Serialize};

/// One fetched message, flattened for export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRecord {
    /// Provider-assigned message ID
    pub id: String,
    pub subject: Option<String>,
    pub from: Option<String>,
    /// Date header exactly as the provider sent it
    pub date: Option<String>,
    pub body: Option<String>,
    pub attachments: Vec<AttachmentRef>,
}

/// Descriptor for a message attachment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRef {
    pub filename: String,
    pub mime_type: String,
    #[serde(rename = "size")]
    pub size_bytes: Option<u64>,
    pub attachment_id: Option<String>,
    /// Raw bytes, present only when fetched eagerly. Serialized as base64.
    #[serde(default, with = "base64_bytes")]
    pub content: Option<Vec<u8>>,
}

mod base64_bytes {
    use base64::prelude::*;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => s.serialize_some(&BASE64_STANDARD.encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|text| BASE64_STANDARD.decode(text).map_err(serde::de::Error::custom))
            .transpose()
    }
}
