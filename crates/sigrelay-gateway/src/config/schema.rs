use std::collections::HashSet;

use serde::Deserialize;

use sigrelay_core::error::{ErrorKind, Result, SigRelayError};
use sigrelay_core::protocol::RtcConfiguration;

use crate::pipeline::ExposurePolicy;
use crate::session::is_valid_identity;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub version: u32,

    #[serde(default)]
    pub gateway: GatewaySection,

    #[serde(default)]
    pub identity: IdentitySection,

    #[serde(default)]
    pub errors: ErrorsSection,

    /// Negotiated session configuration, delivered once in `welcome`.
    #[serde(default)]
    pub rtc: Option<RtcConfiguration>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            version: 1,
            gateway: GatewaySection::default(),
            identity: IdentitySection::default(),
            errors: ErrorsSection::default(),
            rtc: None,
        }
    }
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(SigRelayError::BadRequest(format!(
                "unsupported config version: {}",
                self.version
            )));
        }

        self.gateway.validate()?;
        self.identity.validate()?;
        self.errors.validate()?;

        if let Some(rtc) = &self.rtc {
            rtc.validate().map_err(SigRelayError::BadRequest)?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewaySection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,

    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,

    /// Per-connection outbound queue length; relays to a full queue fail.
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            ping_interval_ms: default_ping_interval_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
            max_frame_bytes: default_max_frame_bytes(),
            outbound_queue: default_outbound_queue(),
        }
    }
}

impl GatewaySection {
    pub fn validate(&self) -> Result<()> {
        if !(5000..=120000).contains(&self.ping_interval_ms) {
            return Err(SigRelayError::BadRequest(
                "gateway.ping_interval_ms must be between 5000 and 120000".into(),
            ));
        }
        if !(10000..=600000).contains(&self.idle_timeout_ms) {
            return Err(SigRelayError::BadRequest(
                "gateway.idle_timeout_ms must be between 10000 and 600000".into(),
            ));
        }
        if self.idle_timeout_ms <= self.ping_interval_ms {
            return Err(SigRelayError::BadRequest(
                "gateway.idle_timeout_ms must be greater than ping_interval_ms".into(),
            ));
        }
        if !(1024..=1_048_576).contains(&self.max_frame_bytes) {
            return Err(SigRelayError::BadRequest(
                "gateway.max_frame_bytes must be between 1024 and 1048576".into(),
            ));
        }
        if !(1..=65536).contains(&self.outbound_queue) {
            return Err(SigRelayError::BadRequest(
                "gateway.outbound_queue must be between 1 and 65536".into(),
            ));
        }
        Ok(())
    }
}

fn default_listen() -> String {
    "0.0.0.0:3003".into()
}
fn default_ping_interval_ms() -> u64 {
    20000
}
fn default_idle_timeout_ms() -> u64 {
    60000
}
fn default_max_frame_bytes() -> usize {
    65536
}
fn default_outbound_queue() -> usize {
    256
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentitySection {
    /// Honour `?id=` on upgrade.
    #[serde(default)]
    pub allow_requested_id: bool,

    /// Identities created at startup; they survive disconnects.
    #[serde(default)]
    pub provisioned: Vec<String>,
}

impl IdentitySection {
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for id in &self.provisioned {
            if !is_valid_identity(id) {
                return Err(SigRelayError::BadRequest(format!(
                    "identity.provisioned contains invalid id: {id:?}"
                )));
            }
            if !seen.insert(id.as_str()) {
                return Err(SigRelayError::BadRequest(format!(
                    "identity.provisioned contains duplicate id: {id}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorsSection {
    /// Protocol conditions that close the connection instead of being answered.
    #[serde(default = "default_close_on")]
    pub close_on: Vec<ErrorKind>,
}

impl Default for ErrorsSection {
    fn default() -> Self {
        Self {
            close_on: default_close_on(),
        }
    }
}

impl ErrorsSection {
    pub fn validate(&self) -> Result<()> {
        if self.close_on.contains(&ErrorKind::MissingId) {
            return Err(SigRelayError::BadRequest(
                "errors.close_on must not list missing-id (it always closes)".into(),
            ));
        }
        Ok(())
    }

    pub fn policy(&self) -> ExposurePolicy {
        ExposurePolicy::new(self.close_on.iter().copied())
    }
}

fn default_close_on() -> Vec<ErrorKind> {
    vec![ErrorKind::MissingTarget, ErrorKind::MissingPayload]
}
