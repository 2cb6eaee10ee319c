//! Typed payloads keyed by command.
//!
//! The wire keeps `data` raw; negotiation commands decode it here so a missing
//! field is a shape mismatch reported as a coded `SignalError`.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::SignalError;
use crate::protocol::command::Command;

/// Which payload a command requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    IceCandidate,
    Sdp,
}

impl PayloadKind {
    fn missing(self) -> SignalError {
        match self {
            PayloadKind::IceCandidate => SignalError::MissingCandidate,
            PayloadKind::Sdp => SignalError::MissingSdp,
        }
    }
}

/// Browser `RTCIceCandidateInit`. An empty `candidate` marks end-of-candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Pranswer,
    Answer,
    Rollback,
}

/// Browser `RTCSessionDescriptionInit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpType,
    pub sdp: String,
}

/// Decoded payload of a negotiation command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalPayload {
    Ice(IceCandidate),
    Offer(SessionDescription),
    Answer(SessionDescription),
}

#[derive(Deserialize)]
struct IceData {
    candidate: Option<IceCandidate>,
}

/// SDP may arrive flat (`{sdp}`) or as a structured description
/// (`{offer: {type, sdp}}` / `{answer: {type, sdp}}`).
#[derive(Deserialize)]
struct SdpData {
    #[serde(default)]
    sdp: Option<String>,
    #[serde(default)]
    offer: Option<SessionDescription>,
    #[serde(default)]
    answer: Option<SessionDescription>,
}

impl SignalPayload {
    /// Payload a command requires, if any.
    pub fn required_for(cmd: Command) -> Option<PayloadKind> {
        match cmd {
            Command::Ice => Some(PayloadKind::IceCandidate),
            Command::Offer | Command::Answer => Some(PayloadKind::Sdp),
            _ => None,
        }
    }

    /// Decode the payload for `cmd`. Commands without a payload yield `None`.
    pub fn decode(cmd: Command, data: Option<&RawValue>) -> Result<Option<Self>, SignalError> {
        let Some(kind) = Self::required_for(cmd) else {
            return Ok(None);
        };
        let raw = data.ok_or_else(|| kind.missing())?;

        match cmd {
            Command::Ice => {
                let d: IceData = parse(raw, kind)?;
                let c = d.candidate.ok_or_else(|| kind.missing())?;
                Ok(Some(SignalPayload::Ice(c)))
            }
            Command::Offer => {
                let d: SdpData = parse(raw, kind)?;
                let desc = pick_sdp(d.sdp, d.offer, &[SdpType::Offer], SdpType::Offer)?;
                Ok(Some(SignalPayload::Offer(desc)))
            }
            Command::Answer => {
                let d: SdpData = parse(raw, kind)?;
                let desc = pick_sdp(
                    d.sdp,
                    d.answer,
                    &[SdpType::Answer, SdpType::Pranswer],
                    SdpType::Answer,
                )?;
                Ok(Some(SignalPayload::Answer(desc)))
            }
            _ => Ok(None),
        }
    }
}

fn parse<'a, T: Deserialize<'a>>(raw: &'a RawValue, kind: PayloadKind) -> Result<T, SignalError> {
    serde_json::from_str(raw.get()).map_err(|e| {
        tracing::debug!(error = %e, "payload shape mismatch");
        kind.missing()
    })
}

fn pick_sdp(
    flat: Option<String>,
    structured: Option<SessionDescription>,
    allowed: &[SdpType],
    flat_kind: SdpType,
) -> Result<SessionDescription, SignalError> {
    if let Some(desc) = structured {
        if allowed.contains(&desc.kind) && !desc.sdp.is_empty() {
            return Ok(desc);
        }
        return Err(SignalError::MissingSdp);
    }
    match flat {
        Some(sdp) if !sdp.is_empty() => Ok(SessionDescription { kind: flat_kind, sdp }),
        _ => Err(SignalError::MissingSdp),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn raw(s: &str) -> Box<RawValue> {
        RawValue::from_string(s.to_owned()).unwrap()
    }

    #[test]
    fn session_commands_need_nothing() {
        assert_eq!(SignalPayload::decode(Command::SessionStart, None), Ok(None));
    }

    #[test]
    fn ice_requires_candidate_object() {
        assert_eq!(
            SignalPayload::decode(Command::Ice, None),
            Err(SignalError::MissingCandidate)
        );
        let d = raw(r#"{"other":1}"#);
        assert_eq!(
            SignalPayload::decode(Command::Ice, Some(&d)),
            Err(SignalError::MissingCandidate)
        );
        let d = raw(r#"{"candidate":{"candidate":"","sdpMid":"0","sdpMLineIndex":0}}"#);
        let p = SignalPayload::decode(Command::Ice, Some(&d)).unwrap().unwrap();
        match p {
            SignalPayload::Ice(c) => {
                assert_eq!(c.sdp_mid.as_deref(), Some("0"));
                assert_eq!(c.sdp_m_line_index, Some(0));
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn offer_accepts_flat_and_structured() {
        let d = raw(r#"{"sdp":"v=0"}"#);
        assert!(SignalPayload::decode(Command::Offer, Some(&d)).unwrap().is_some());

        let d = raw(r#"{"offer":{"type":"offer","sdp":"v=0"}}"#);
        assert!(SignalPayload::decode(Command::Offer, Some(&d)).unwrap().is_some());
    }

    #[test]
    fn answer_rejects_mismatched_type_and_empty_sdp() {
        let d = raw(r#"{"answer":{"type":"offer","sdp":"v=0"}}"#);
        assert_eq!(
            SignalPayload::decode(Command::Answer, Some(&d)),
            Err(SignalError::MissingSdp)
        );
        let d = raw(r#"{"sdp":""}"#);
        assert_eq!(
            SignalPayload::decode(Command::Answer, Some(&d)),
            Err(SignalError::MissingSdp)
        );
    }
}
