// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Wire protocol for the telemetry backend command interface.
//!
//! The backend speaks a line-delimited JSON request/response protocol.
//! Each request is a single line `{"cmd": "<name>"}` and each reply is a
//! single line `{"ok": <value>}` or `{"err": "<message>"}`. Replies arrive
//! in request order; there are no correlation IDs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur while encoding or decoding protocol lines.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid reply format: {0}")]
    InvalidFormat(String),

    #[error("reply carried neither 'ok' nor 'err'")]
    EmptyReply,

    #[error("expected {expected} in reply, got {got}")]
    UnexpectedType {
        expected: &'static str,
        got: String,
    },
}

/// Commands in the backend's fixed request/response table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Latitude of the tracked object in degrees.
    GetLat,
    /// Longitude of the tracked object in degrees.
    GetLong,
    /// Altitude of the tracked object in meters.
    GetAlt,
    /// Bearing reported by the backend, if it has one.
    GetHeading,
    /// Whether the APRS link has produced data.
    IsAprsActive,
    /// Whether the Iridium link has produced data.
    IsIridiumActive,
    /// Per-instance validity flags for the APRS link.
    GetAprsValidity,
    /// Per-instance validity flags for the Iridium link.
    GetIridiumValidity,
}

impl Command {
    /// Wire name of the command.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Command::GetLat => "get_lat",
            Command::GetLong => "get_long",
            Command::GetAlt => "get_alt",
            Command::GetHeading => "get_heading",
            Command::IsAprsActive => "is_aprs_active",
            Command::IsIridiumActive => "is_iridium_active",
            Command::GetAprsValidity => "get_aprs_validity",
            Command::GetIridiumValidity => "get_iridium_validity",
        }
    }
}

#[derive(Serialize)]
struct Request<'a> {
    cmd: &'a str,
}

#[derive(Deserialize)]
struct WireReply {
    #[serde(default)]
    ok: Option<Value>,
    #[serde(default)]
    err: Option<String>,
}

/// A decoded backend reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Successful reply payload.
    Ok(Value),
    /// Backend-reported command failure.
    Err(String),
}

impl Reply {
    /// Extract a numeric payload.
    pub fn into_f64(self) -> Result<f64, ParseError> {
        match self {
            Reply::Ok(value) => value.as_f64().ok_or(ParseError::UnexpectedType {
                expected: "number",
                got: type_name(&value).to_string(),
            }),
            Reply::Err(msg) => Err(ParseError::InvalidFormat(msg)),
        }
    }

    /// Extract a boolean payload.
    pub fn into_bool(self) -> Result<bool, ParseError> {
        match self {
            Reply::Ok(value) => value.as_bool().ok_or(ParseError::UnexpectedType {
                expected: "boolean",
                got: type_name(&value).to_string(),
            }),
            Reply::Err(msg) => Err(ParseError::InvalidFormat(msg)),
        }
    }

    /// Extract an ordered boolean sequence payload.
    pub fn into_bool_seq(self) -> Result<Vec<bool>, ParseError> {
        match self {
            Reply::Ok(Value::Array(items)) => items
                .into_iter()
                .map(|item| {
                    item.as_bool().ok_or(ParseError::UnexpectedType {
                        expected: "boolean array",
                        got: type_name(&item).to_string(),
                    })
                })
                .collect(),
            Reply::Ok(value) => Err(ParseError::UnexpectedType {
                expected: "boolean array",
                got: type_name(&value).to_string(),
            }),
            Reply::Err(msg) => Err(ParseError::InvalidFormat(msg)),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Encode a command as a single request line (without trailing newline).
#[must_use]
pub fn encode_request(cmd: Command) -> String {
    // Serializing a single &str field cannot fail
    serde_json::to_string(&Request { cmd: cmd.name() }).unwrap_or_default()
}

/// Decode a single reply line.
pub fn decode_reply(line: &str) -> Result<Reply, ParseError> {
    let wire: WireReply =
        serde_json::from_str(line).map_err(|e| ParseError::InvalidFormat(e.to_string()))?;

    match (wire.ok, wire.err) {
        (Some(value), _) => Ok(Reply::Ok(value)),
        (None, Some(msg)) => Ok(Reply::Err(msg)),
        (None, None) => Err(ParseError::EmptyReply),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_request() {
        assert_eq!(encode_request(Command::GetLat), r#"{"cmd":"get_lat"}"#);
        assert_eq!(
            encode_request(Command::GetIridiumValidity),
            r#"{"cmd":"get_iridium_validity"}"#
        );
    }

    #[test]
    fn test_decode_ok_number() {
        let reply = decode_reply(r#"{"ok": 45.123}"#).unwrap();
        assert_eq!(reply.into_f64().unwrap(), 45.123);
    }

    #[test]
    fn test_decode_ok_bool() {
        let reply = decode_reply(r#"{"ok": true}"#).unwrap();
        assert!(reply.into_bool().unwrap());
    }

    #[test]
    fn test_decode_bool_seq() {
        let reply = decode_reply(r#"{"ok": [true, false, true]}"#).unwrap();
        assert_eq!(reply.into_bool_seq().unwrap(), vec![true, false, true]);
    }

    #[test]
    fn test_decode_err_reply() {
        let reply = decode_reply(r#"{"err": "no fix"}"#).unwrap();
        assert_eq!(reply, Reply::Err("no fix".to_string()));
        assert!(matches!(
            Reply::Err("no fix".to_string()).into_f64(),
            Err(ParseError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_reply("not json").is_err());
        assert!(matches!(decode_reply("{}"), Err(ParseError::EmptyReply)));
    }

    #[test]
    fn test_type_mismatch() {
        let reply = Reply::Ok(json!("12.5"));
        assert!(matches!(
            reply.into_f64(),
            Err(ParseError::UnexpectedType { expected: "number", .. })
        ));
    }
}
