//! Decode-once codec for the transport layer.
//!
//! - Text frames => `Message` (lazy `RawValue` for data)
//! - Binary frames are not part of the protocol
//! - Ping/Pong/Close are surfaced for lifecycle management

use std::borrow::Cow;

use axum::extract::ws::{CloseFrame, Message as WsMessage};

use sigrelay_core::error::{close, Result, SigRelayError};
use sigrelay_core::protocol::Message;

use crate::context::{CloseReason, Outbound};

#[derive(Debug)]
pub enum Inbound {
    Text(Message),
    Ping,
    Pong,
    Close,
}

/// Why a frame could not become an `Inbound`.
#[derive(Debug)]
pub enum Rejected {
    TooLarge(usize),
    Binary,
    Invalid(SigRelayError),
}

impl Rejected {
    pub fn close_reason(&self) -> CloseReason {
        match self {
            Rejected::TooLarge(_) => CloseReason::new(close::MESSAGE_TOO_BIG, "Message Too Big"),
            Rejected::Binary => CloseReason::new(close::UNSUPPORTED_DATA, "Binary Frames Unsupported"),
            Rejected::Invalid(e) => CloseReason::from_error(e),
        }
    }
}

pub fn decode(frame: WsMessage, max_frame_bytes: usize) -> std::result::Result<Inbound, Rejected> {
    match frame {
        WsMessage::Text(s) => {
            if s.len() > max_frame_bytes {
                return Err(Rejected::TooLarge(s.len()));
            }
            let msg = Message::from_text(&s).map_err(Rejected::Invalid)?;
            Ok(Inbound::Text(msg))
        }
        WsMessage::Binary(_) => Err(Rejected::Binary),
        WsMessage::Ping(_) => Ok(Inbound::Ping),
        WsMessage::Pong(_) => Ok(Inbound::Pong),
        WsMessage::Close(_) => Ok(Inbound::Close),
    }
}

pub fn encode(out: Outbound) -> Result<WsMessage> {
    Ok(match out {
        Outbound::Message(m) => WsMessage::Text(m.to_text()?),
        Outbound::Ping => WsMessage::Ping(Vec::new()),
        Outbound::Close(c) => WsMessage::Close(Some(CloseFrame {
            code: c.code,
            reason: Cow::Owned(c.reason),
        })),
    })
}
