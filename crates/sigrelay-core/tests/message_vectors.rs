//! Envelope + payload vector tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use sigrelay_core::protocol::{Command, Message, SignalPayload};

use vector_loader::load;

#[test]
fn message_vectors() {
    let files = [
        "offer_flat.json",
        "answer_structured.json",
        "ice_candidate.json",
        "ice_missing_candidate.json",
        "offer_missing_sdp.json",
        "session_start.json",
        "response_frame.json",
    ];

    for f in files {
        let v = load(f);
        let msg = Message::from_text(&v.frame_text()).expect("frame must decode");

        if msg.is_response() {
            let ex = v.expect.expect("missing expect block");
            assert_eq!(ex["response"], true, "vector={}", v.description);
            assert_eq!(msg.id(), ex["id"].as_str(), "vector={}", v.description);
            continue;
        }

        let cmd = Command::parse(msg.cmd().unwrap()).expect("known command");
        let res = SignalPayload::decode(cmd, msg.data());

        if let Some(err) = v.expect_error {
            let e = res.expect_err("expected error");
            assert_eq!(e.close_code(), err.close_code, "vector={}", v.description);
            assert_eq!(e.to_string(), err.message, "vector={}", v.description);
            continue;
        }

        let payload = res.expect("expected payload");
        let ex = v.expect.expect("missing expect block");
        assert_eq!(msg.id(), ex["id"].as_str(), "vector={}", v.description);
        assert_eq!(msg.cmd(), ex["cmd"].as_str(), "vector={}", v.description);
        assert_eq!(msg.target(), ex["target"].as_str(), "vector={}", v.description);

        match (payload, ex.get("sdp_type").and_then(|t| t.as_str())) {
            (Some(SignalPayload::Offer(d)), Some("offer")) => assert!(!d.sdp.is_empty()),
            (Some(SignalPayload::Answer(d)), Some("answer")) => assert!(!d.sdp.is_empty()),
            (Some(SignalPayload::Ice(c)), None) => assert!(!c.candidate.is_empty()),
            (None, None) => {}
            (p, t) => panic!("vector={} unexpected payload {p:?} for {t:?}", v.description),
        }
    }
}

#[test]
fn garbage_is_bad_request() {
    let err = Message::from_text("not json").expect_err("must fail");
    assert_eq!(err.close_code(), 1007);
    assert_eq!(err.close_reason(), "Invalid Message");
}

#[test]
fn rejected_frame_vectors() {
    for f in ["array_frame.json", "scalar_frame.json"] {
        let v = load(f);
        let err = Message::from_text(&v.frame_text()).expect_err("frame must be rejected");
        let ex = v.expect_error.expect("missing expect_error block");
        assert_eq!(err.close_code(), ex.close_code, "vector={}", v.description);
        assert_eq!(err.close_reason(), ex.message, "vector={}", v.description);
    }
}
