//! Message envelope (JSON).
//!
//! `data` is kept as `RawValue`: the relay forwards payloads byte-for-byte and
//! only validators parse them (see `payload`).

use serde::{Deserialize, Serialize};
use serde_json::value::{to_raw_value, RawValue};

use crate::error::{Result, SigRelayError};
use crate::protocol::command::Command;
use crate::protocol::rtc::RtcConfiguration;

/// Wire envelope for requests, responses and relayed messages.
///
/// A message with `ok` set is a response; one without is a command request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Message {
    /// Request identifier, echoed in responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Command name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,
    /// Success flag, responses only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    /// Recipient identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Sender identity, stamped by the relay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    /// Command-specific payload, unparsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Box<RawValue>>,
}

#[derive(Serialize)]
struct ErrorData<'a> {
    message: &'a str,
}

#[derive(Serialize)]
struct WelcomeData<'a> {
    id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<&'a RtcConfiguration>,
}

impl Message {
    /// Decode a text frame. Only a JSON object is an envelope; the derived
    /// `Deserialize` would also take a positional array.
    pub fn from_text(s: &str) -> Result<Self> {
        if !s.trim_start_matches([' ', '\t', '\n', '\r']).starts_with('{') {
            return Err(SigRelayError::BadRequest("message must be a json object".into()));
        }
        serde_json::from_str(s)
            .map_err(|e| SigRelayError::BadRequest(format!("invalid message json: {e}")))
    }

    /// Encode for a text frame.
    pub fn to_text(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| SigRelayError::Internal(format!("json encode failed: {e}")))
    }

    /// Request id, if present and non-empty.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|s| !s.is_empty())
    }

    pub fn cmd(&self) -> Option<&str> {
        self.cmd.as_deref().filter(|s| !s.is_empty())
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref().filter(|s| !s.is_empty())
    }

    pub fn data(&self) -> Option<&RawValue> {
        self.data.as_deref()
    }

    /// Responses are never routed or forwarded.
    pub fn is_response(&self) -> bool {
        self.ok.is_some()
    }

    /// `{id, ok: true}`
    pub fn ack(id: &str) -> Self {
        Self {
            id: Some(id.to_owned()),
            ok: Some(true),
            ..Self::default()
        }
    }

    /// `{id, ok: false, data: {message}}`
    pub fn nack(id: &str, message: &str) -> Result<Self> {
        Ok(Self {
            id: Some(id.to_owned()),
            ok: Some(false),
            data: Some(raw(&ErrorData { message })?),
            ..Self::default()
        })
    }

    /// Message relayed to a target: fresh id, same command, stamped origin.
    pub fn relay(id: String, cmd: &str, origin: &str, data: Option<Box<RawValue>>) -> Self {
        Self {
            id: Some(id),
            cmd: Some(cmd.to_owned()),
            origin: Some(origin.to_owned()),
            data,
            ..Self::default()
        }
    }

    /// Identity announcement sent once per connection.
    pub fn welcome(id: String, peer_id: &str, config: Option<&RtcConfiguration>) -> Result<Self> {
        Ok(Self {
            id: Some(id),
            cmd: Some(Command::Welcome.as_str().to_owned()),
            data: Some(raw(&WelcomeData { id: peer_id, config })?),
            ..Self::default()
        })
    }
}

fn raw<T: Serialize>(v: &T) -> Result<Box<RawValue>> {
    to_raw_value(v).map_err(|e| SigRelayError::Internal(format!("json encode failed: {e}")))
}
