use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::audio::AudioFormat;

/// Wire envelope. Every message on the stream, in either direction, is one
/// JSON-encoded envelope tagged by `type`. Audio payloads travel base64-encoded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    SessionOpen {
        audio_format: AudioFormat,
        system_prompt: String,
        tool_schemas: Vec<Value>,
    },
    AudioInput {
        sequence: u64,
        payload: String,
    },
    AudioOutput {
        payload: String,
    },
    TranscriptDelta {
        text: String,
    },
    ToolUseRequest {
        invocation_id: String,
        tool_name: String,
        input: Value,
    },
    ToolResult {
        invocation_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    TurnComplete,
    SessionClose,
    StreamError {
        code: u32,
        message: String,
    },
}

impl Envelope {
    pub fn audio_input(sequence: u64, pcm: &[u8]) -> Self {
        Envelope::AudioInput {
            sequence,
            payload: BASE64.encode(pcm),
        }
    }

    pub fn tool_result(invocation_id: String, result: Result<Value, String>) -> Self {
        match result {
            Ok(output) => Envelope::ToolResult {
                invocation_id,
                output: Some(output),
                error: None,
            },
            Err(error) => Envelope::ToolResult {
                invocation_id,
                output: None,
                error: Some(error),
            },
        }
    }
}

/// Decoded inbound event, ready for dispatch. Audio arrives already
/// base64-decoded to raw PCM.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    AudioChunk(Bytes),
    TranscriptDelta(String),
    ToolUseRequest {
        invocation_id: String,
        tool_name: String,
        input: Value,
    },
    TurnComplete,
    StreamError {
        code: u32,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// The buffer ends mid-envelope. Callers keep the bytes and retry once
    /// more arrive.
    Truncated,
    /// Complete JSON, but the `type` tag is unknown or not valid inbound.
    UnknownEventType,
    /// Audio payload exceeds the configured bound.
    OversizedPayload,
    /// Complete JSON with a known tag but structurally invalid fields.
    MalformedEnvelope,
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DecodeErrorKind::Truncated => "truncated envelope",
            DecodeErrorKind::UnknownEventType => "unknown event type",
            DecodeErrorKind::OversizedPayload => "oversized payload",
            DecodeErrorKind::MalformedEnvelope => "malformed envelope",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} ({len} bytes)")]
pub struct DecodeError {
    pub kind: DecodeErrorKind,
    /// Length of the offending input.
    pub len: usize,
}

impl DecodeError {
    fn new(kind: DecodeErrorKind, len: usize) -> Self {
        Self { kind, len }
    }

    pub fn is_truncated(&self) -> bool {
        self.kind == DecodeErrorKind::Truncated
    }
}

const INBOUND_TYPES: &[&str] = &[
    "audio_output",
    "transcript_delta",
    "tool_use_request",
    "turn_complete",
    "stream_error",
];

/// Stateless translation between wire bytes and tagged events. Carries only
/// configured bounds, never buffers.
#[derive(Debug, Clone)]
pub struct EventCodec {
    pub max_audio_bytes: usize,
}

impl Default for EventCodec {
    fn default() -> Self {
        Self {
            max_audio_bytes: 256 * 1024,
        }
    }
}

impl EventCodec {
    /// Encoding is total over well-formed envelopes; every variant serializes
    /// to a JSON object with string keys.
    pub fn encode(&self, envelope: &Envelope) -> Vec<u8> {
        serde_json::to_vec(envelope).unwrap_or_default()
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<InboundEvent, DecodeError> {
        let len = bytes.len();
        let value: Value = serde_json::from_slice(bytes).map_err(|e| {
            let kind = if e.classify() == serde_json::error::Category::Eof {
                DecodeErrorKind::Truncated
            } else {
                DecodeErrorKind::MalformedEnvelope
            };
            DecodeError::new(kind, len)
        })?;

        let tag = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(DecodeError::new(DecodeErrorKind::MalformedEnvelope, len))?;
        if !INBOUND_TYPES.contains(&tag) {
            return Err(DecodeError::new(DecodeErrorKind::UnknownEventType, len));
        }

        if tag == "audio_output" {
            // Bound the base64 text before decoding it.
            if let Some(payload) = value.get("payload").and_then(Value::as_str) {
                if payload.len() > self.max_audio_bytes / 3 * 4 + 4 {
                    return Err(DecodeError::new(DecodeErrorKind::OversizedPayload, len));
                }
            }
        }

        let envelope: Envelope = serde_json::from_value(value)
            .map_err(|_| DecodeError::new(DecodeErrorKind::MalformedEnvelope, len))?;

        match envelope {
            Envelope::AudioOutput { payload } => {
                let pcm = BASE64
                    .decode(payload.as_bytes())
                    .map_err(|_| DecodeError::new(DecodeErrorKind::MalformedEnvelope, len))?;
                if pcm.is_empty() {
                    return Err(DecodeError::new(DecodeErrorKind::MalformedEnvelope, len));
                }
                if pcm.len() > self.max_audio_bytes {
                    return Err(DecodeError::new(DecodeErrorKind::OversizedPayload, len));
                }
                Ok(InboundEvent::AudioChunk(Bytes::from(pcm)))
            }
            Envelope::TranscriptDelta { text } => Ok(InboundEvent::TranscriptDelta(text)),
            Envelope::ToolUseRequest {
                invocation_id,
                tool_name,
                input,
            } => Ok(InboundEvent::ToolUseRequest {
                invocation_id,
                tool_name,
                input,
            }),
            Envelope::TurnComplete => Ok(InboundEvent::TurnComplete),
            Envelope::StreamError { code, message } => {
                Ok(InboundEvent::StreamError { code, message })
            }
            // Outbound-only kinds were filtered by the tag check above.
            _ => Err(DecodeError::new(DecodeErrorKind::UnknownEventType, len)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn codec() -> EventCodec {
        EventCodec::default()
    }

    #[test]
    fn session_open_round_trips_through_json() {
        let open = Envelope::SessionOpen {
            audio_format: AudioFormat::default(),
            system_prompt: "be brief".into(),
            tool_schemas: vec![json!({"name": "current_time"})],
        };
        let bytes = codec().encode(&open);
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["type"], "session_open");
        assert_eq!(value["system_prompt"], "be brief");
        assert_eq!(value["audio_format"]["sample_rate"], 16000);
    }

    #[test]
    fn decodes_audio_output_to_raw_pcm() {
        let wire = json!({"type": "audio_output", "payload": BASE64.encode([1u8, 2, 3, 4])});
        let event = codec().decode(wire.to_string().as_bytes()).unwrap();
        assert_eq!(
            event,
            InboundEvent::AudioChunk(Bytes::from_static(&[1, 2, 3, 4]))
        );
    }

    #[test]
    fn truncated_input_is_reported_and_completes_later() {
        let wire = json!({"type": "transcript_delta", "text": "hello"}).to_string();
        let (head, tail) = wire.as_bytes().split_at(12);

        let err = codec().decode(head).unwrap_err();
        assert!(err.is_truncated());
        assert_eq!(err.len, 12);

        let mut buf = head.to_vec();
        buf.extend_from_slice(tail);
        let event = codec().decode(&buf).unwrap();
        assert_eq!(event, InboundEvent::TranscriptDelta("hello".into()));
    }

    #[test]
    fn unknown_tag_is_classified() {
        let err = codec()
            .decode(br#"{"type":"telemetry","value":1}"#)
            .unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::UnknownEventType);
    }

    #[test]
    fn outbound_only_tag_is_not_valid_inbound() {
        let err = codec().decode(br#"{"type":"session_close"}"#).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::UnknownEventType);
    }

    #[test]
    fn oversized_audio_payload_is_rejected() {
        let small = EventCodec { max_audio_bytes: 8 };
        let wire = json!({"type": "audio_output", "payload": BASE64.encode([0u8; 64])});
        let err = small.decode(wire.to_string().as_bytes()).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::OversizedPayload);
    }

    #[test]
    fn missing_fields_are_malformed_not_fatal() {
        let err = codec()
            .decode(br#"{"type":"tool_use_request","tool_name":"x"}"#)
            .unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::MalformedEnvelope);
    }

    #[test]
    fn tool_result_serializes_error_xor_output() {
        let ok = Envelope::tool_result("inv-1".into(), Ok(json!({"sum": 3})));
        let v: Value = serde_json::from_slice(&codec().encode(&ok)).unwrap();
        assert_eq!(v["output"]["sum"], 3);
        assert!(v.get("error").is_none());

        let failed = Envelope::tool_result("inv-2".into(), Err("boom".into()));
        let v: Value = serde_json::from_slice(&codec().encode(&failed)).unwrap();
        assert_eq!(v["error"], "boom");
        assert!(v.get("output").is_none());
    }
}
