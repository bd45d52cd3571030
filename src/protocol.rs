//! Wire format of the DevTools protocol: JSON text frames, one value per frame.
//!
//! Outbound frames are commands. Inbound frames are either responses (carry an
//! `id`) or events (carry a `method` but no `id`); classification is by `id`
//! first, so a frame with both is a response.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CdpError, CdpResult};

/// One outgoing command frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub id: u64,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// Error body of a failed [`Response`].
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseError {
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
}

/// Reply to a previously issued [`Command`], correlated by `id`.
///
/// Exactly one of `result` and `error` is meaningful; a success with no
/// `result` member is normalized downstream to an empty object.
#[derive(Debug, Clone)]
pub struct Response {
    pub id: u64,
    pub result: Option<Value>,
    pub error: Option<ResponseError>,
}

/// Unsolicited notification. Carries no `id` and expects no reply; a missing
/// `params` member decodes as an empty object.
#[derive(Debug, Clone)]
pub struct Event {
    pub method: String,
    pub params: Value,
}

/// An inbound frame, classified.
#[derive(Debug, Clone)]
pub enum IncomingFrame {
    Response(Response),
    Event(Event),
}

/// Marker for commands that take no parameters; serializes to nothing at all
/// (the `params` member is left off the frame, never sent as `null`).
#[derive(Debug, Clone, Serialize)]
pub struct NoParams;

// Tolerant shape every inbound frame is read into before classification;
// unknown members are ignored.
#[derive(Deserialize)]
struct RawFrame {
    id: Option<u64>,
    result: Option<Value>,
    error: Option<ResponseError>,
    method: Option<String>,
    params: Option<Value>,
}

pub(crate) fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Serializes one command frame. Params that serialize to `null` (unit types
/// such as [`NoParams`], or `Option::None`) are dropped from the frame.
pub fn encode<P: Serialize>(id: u64, method: &str, params: P) -> CdpResult<String> {
    let params = match serde_json::to_value(params)? {
        Value::Null => None,
        value => Some(value),
    };
    let command = Command {
        id,
        method: method.to_owned(),
        params,
    };
    Ok(serde_json::to_string(&command)?)
}

/// Classifies one inbound frame.
///
/// The `id` wins: a frame carrying both an `id` and a `method` is a response.
/// A frame carrying neither is [`CdpError::UnroutableFrame`]; invalid JSON is
/// [`CdpError::Json`]. Neither error is fatal to a connection, the dispatcher
/// logs and skips the frame.
pub fn decode(text: &str) -> CdpResult<IncomingFrame> {
    let raw: RawFrame = serde_json::from_str(text)?;
    if let Some(id) = raw.id {
        Ok(IncomingFrame::Response(Response {
            id,
            result: raw.result,
            error: raw.error,
        }))
    } else if let Some(method) = raw.method {
        Ok(IncomingFrame::Event(Event {
            method,
            params: raw.params.unwrap_or_else(empty_object),
        }))
    } else {
        Err(CdpError::UnroutableFrame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encodes_command_with_params() {
        let frame = encode(7, "Page.navigate", json!({"url": "https://example.com"})).unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["method"], "Page.navigate");
        assert_eq!(value["params"]["url"], "https://example.com");
    }

    #[test]
    fn encodes_no_params_without_a_params_member() {
        let frame = encode(1, "Page.enable", NoParams).unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert!(value.get("params").is_none(), "params must be absent, not null");

        let frame = encode(2, "Runtime.enable", Option::<Value>::None).unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert!(value.get("params").is_none());
    }

    #[test]
    fn command_round_trips() {
        let frame = encode(42, "Runtime.evaluate", json!({"expression": "1"})).unwrap();
        let command: Command = serde_json::from_str(&frame).unwrap();
        assert_eq!(command.id, 42);
        assert_eq!(command.method, "Runtime.evaluate");
        assert_eq!(command.params, Some(json!({"expression": "1"})));
    }

    #[test]
    fn decodes_success_response() {
        let frame = decode(r#"{"id": 3, "result": {"frameId": "F1"}}"#).unwrap();
        match frame {
            IncomingFrame::Response(response) => {
                assert_eq!(response.id, 3);
                assert_eq!(response.result.unwrap()["frameId"], "F1");
                assert!(response.error.is_none());
            }
            other => panic!("expected a response, got {:?}", other),
        }
    }

    #[test]
    fn decodes_error_response() {
        let frame = decode(r#"{"id": 9, "error": {"code": -32601, "message": "no such method"}}"#)
            .unwrap();
        match frame {
            IncomingFrame::Response(response) => {
                let error = response.error.unwrap();
                assert_eq!(error.code, -32601);
                assert_eq!(error.message, "no such method");
                assert!(error.data.is_none());
            }
            other => panic!("expected a response, got {:?}", other),
        }
    }

    #[test]
    fn decodes_event_and_defaults_missing_params() {
        let frame = decode(r#"{"method": "Page.loadEventFired", "params": {"timestamp": 1.5}}"#)
            .unwrap();
        match frame {
            IncomingFrame::Event(event) => {
                assert_eq!(event.method, "Page.loadEventFired");
                assert_eq!(event.params["timestamp"], 1.5);
            }
            other => panic!("expected an event, got {:?}", other),
        }

        let frame = decode(r#"{"method": "Inspector.detached"}"#).unwrap();
        match frame {
            IncomingFrame::Event(event) => assert_eq!(event.params, json!({})),
            other => panic!("expected an event, got {:?}", other),
        }
    }

    #[test]
    fn id_wins_over_method() {
        let frame = decode(r#"{"id": 5, "method": "Page.enable", "result": {}}"#).unwrap();
        assert!(matches!(frame, IncomingFrame::Response(ref r) if r.id == 5));
    }

    #[test]
    fn frame_with_neither_id_nor_method_is_unroutable() {
        match decode(r#"{"banana": true}"#) {
            Err(CdpError::UnroutableFrame) => {}
            other => panic!("expected UnroutableFrame, got {:?}", other),
        }
    }

    #[test]
    fn invalid_json_is_a_serialization_error() {
        assert!(matches!(decode("not json"), Err(CdpError::Json(_))));
    }

    #[test]
    fn unknown_members_are_ignored() {
        let frame = decode(r#"{"id": 1, "result": {}, "sessionId": "S1"}"#).unwrap();
        assert!(matches!(frame, IncomingFrame::Response(_)));
    }
}
