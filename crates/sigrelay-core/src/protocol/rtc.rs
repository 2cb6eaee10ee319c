//! Negotiated session configuration (`RTCConfiguration` mirror).
//!
//! Field names follow the browser dictionary (camelCase) both on the wire and
//! in the gateway YAML, so the block can be pasted from client code.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RtcConfiguration {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ice_servers: Vec<IceServer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ice_transport_policy: Option<IceTransportPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_policy: Option<BundlePolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtcp_mux_policy: Option<RtcpMuxPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ice_candidate_pool_size: Option<u8>,
}

/// STUN/TURN server entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IceTransportPolicy {
    All,
    Relay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BundlePolicy {
    Balanced,
    MaxCompat,
    MaxBundle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RtcpMuxPolicy {
    Require,
}

impl RtcConfiguration {
    /// Every server needs at least one url, and TURN urls need credentials.
    pub fn validate(&self) -> std::result::Result<(), String> {
        for (i, s) in self.ice_servers.iter().enumerate() {
            if s.urls.is_empty() {
                return Err(format!("rtc.iceServers[{i}].urls must not be empty"));
            }
            let turn = s.urls.iter().any(|u| u.starts_with("turn:") || u.starts_with("turns:"));
            if turn && (s.username.is_none() || s.credential.is_none()) {
                return Err(format!(
                    "rtc.iceServers[{i}] uses TURN and needs username and credential"
                ));
            }
        }
        Ok(())
    }
}
