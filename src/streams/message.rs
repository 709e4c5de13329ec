//! Decoded stream messages

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One news record delivered through a subscription
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreamMessage {
    /// Record id
    #[serde(default)]
    pub id: String,
    /// Record fields, including `action`
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Vec<StreamMessage>,
}

impl StreamMessage {
    /// Decode a queue payload of the form `{"data": [{"id", "attributes"}]}`
    ///
    /// The envelope carries a single record; extra entries are ignored.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let envelope: Envelope = serde_json::from_slice(payload)?;
        envelope
            .data
            .into_iter()
            .next()
            .ok_or_else(|| Error::InvalidResponse("stream message envelope has no record".into()))
    }

    /// Change kind (`add`, `rep`, `del`, ...), if present
    pub fn action(&self) -> Option<&str> {
        self.attributes.get("action").and_then(Value::as_str)
    }

    /// Document id (`an`), if present
    pub fn document_id(&self) -> Option<&str> {
        self.attributes.get("an").and_then(Value::as_str)
    }
}
