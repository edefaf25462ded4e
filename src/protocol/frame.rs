use super::MessageKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Server → Client frame.
///
/// Only `type` is required. The monitor service wraps every push in an
/// envelope that also carries a human-readable `message`, the `labId` it was
/// scoped to and an epoch-millis `timestamp`. Those are best-effort: a field
/// of an unexpected shape decodes as `None` and never drops the frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundFrame {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default)]
    pub data: Value,
    #[serde(
        default,
        deserialize_with = "envelope::message",
        skip_serializing_if = "Option::is_none"
    )]
    pub message: Option<String>,
    #[serde(
        rename = "labId",
        default,
        deserialize_with = "envelope::lab_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub lab_id: Option<u64>,
    #[serde(
        default,
        deserialize_with = "envelope::timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<i64>,
}

/// Lenient decoders for the optional envelope fields
mod envelope {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub(super) fn message<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(text) => Some(text),
            _ => None,
        })
    }

    /// Numeric id, also accepted as a numeric string
    pub(super) fn lab_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Number(n) => n.as_u64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        })
    }

    /// Epoch millis; a whole-valued float is accepted
    pub(super) fn timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Number(n) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| f as i64)
            }),
            _ => None,
        })
    }
}

impl InboundFrame {
    /// Decode one text payload received on the channel
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| FrameError::InvalidJson(e.to_string()))?;

        let object = value.as_object().ok_or(FrameError::NotAnObject)?;
        match object.get("type") {
            Some(Value::String(_)) => {}
            Some(_) => return Err(FrameError::InvalidKind),
            None => return Err(FrameError::MissingKind),
        }

        serde_json::from_value(value).map_err(|e| FrameError::InvalidEnvelope(e.to_string()))
    }
}

/// Client → Server frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundFrame {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl OutboundFrame {
    pub fn new(kind: impl Into<MessageKind>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data: Some(data),
        }
    }

    /// Keep-alive frame: `{"type":"PING"}`
    pub fn ping() -> Self {
        Self {
            kind: MessageKind::Ping,
            data: None,
        }
    }
}

/// Inbound frame decoding errors
#[derive(Debug, PartialEq, Clone)]
pub enum FrameError {
    /// Payload is not JSON at all
    InvalidJson(String),
    /// JSON, but not an object
    NotAnObject,
    /// Object without a `type` field
    MissingKind,
    /// `type` present but not a string
    InvalidKind,
    /// Object that still fails to decode as a frame
    InvalidEnvelope(String),
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameError::InvalidJson(e) => write!(f, "Frame is not valid JSON: {}", e),
            FrameError::NotAnObject => write!(f, "Frame must be a JSON object"),
            FrameError::MissingKind => write!(f, "Frame has no 'type' field"),
            FrameError::InvalidKind => write!(f, "Frame 'type' must be a string"),
            FrameError::InvalidEnvelope(e) => write!(f, "Frame envelope is invalid: {}", e),
        }
    }
}

impl std::error::Error for FrameError {}
