//! Shared protocol types for communication between the native client and the
//! Windows bridge process that hosts Word automation.
//!
//! The protocol is JSON-over-stdio: one JSON object per line in each direction.
//! It is deliberately late-bound: the client names members as strings and the
//! bridge resolves them through `IDispatch`, so the object model of the
//! automated application never has to be mirrored here.

use serde::{Deserialize, Serialize};

/// Identifier of a remote automation object held in the bridge's handle table.
///
/// Ids are never reused within one bridge process. Id 0 is never issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u64);

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A command sent from the client to the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Monotonically increasing request ID for correlating responses.
    pub id: u64,
    /// The command to execute.
    #[serde(flatten)]
    pub command: Command,
}

/// Commands the client can send to the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", content = "params")]
pub enum Command {
    /// Initialize COM on the bridge's single apartment thread.
    Init,

    /// Create a top-level automation object from a ProgID (e.g. `Word.Application`).
    CreateObject { prog_id: String },

    /// Read a property, optionally indexed (`Bookmarks.Item("x")`, `Cell(2, 3)`).
    GetProperty {
        object: ObjectId,
        name: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<Value>,
    },

    /// Assign a property.
    SetProperty {
        object: ObjectId,
        name: String,
        value: Value,
    },

    /// Call a method. Arguments are in natural (left to right) order.
    Invoke {
        object: ObjectId,
        name: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<Value>,
    },

    /// Drop the bridge's reference to an object.
    Release { object: ObjectId },

    /// Forcefully terminate an OS process by id.
    TerminateProcess { pid: u32 },

    /// Release every remaining object, uninitialize COM and exit.
    Shutdown,
}

/// A value crossing the protocol boundary, mirroring the VARIANT subset
/// the report generator needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    Empty,
    Bool(bool),
    Int(i32),
    Double(f64),
    Text(String),
    Object(ObjectId),
}

/// A response sent from the bridge back to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// The request ID this response corresponds to.
    pub id: u64,
    /// The result of the command.
    #[serde(flatten)]
    pub result: ResponseResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum ResponseResult {
    #[serde(rename = "ok")]
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
    },
    #[serde(rename = "error")]
    Error {
        message: String,
        #[serde(default)]
        kind: FaultKind,
    },
}

/// Coarse classification of a bridge-side failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// The automated application raised an exception or the call failed.
    #[default]
    Exception,
    /// The request named an object id the bridge does not hold.
    UnknownObject,
    /// No process could be opened for termination (it has most likely exited).
    ProcessNotFound,
    /// The process was opened but could not be terminated.
    TerminateFailed,
    /// The request could not be parsed.
    Protocol,
}

impl Value {
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Value::Object(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(n) => Some(*n != 0),
            _ => None,
        }
    }

    /// Integer view, accepting whole doubles since automation servers often
    /// report `Long` properties as `VT_R8` through late binding.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Double(d) if d.fract() == 0.0 && *d >= i32::MIN as f64 && *d <= i32::MAX as f64 => {
                Some(*d as i32)
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::Object(id)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Empty => write!(f, "<empty>"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Double(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Object(id) => write!(f, "object {id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_request_wire_shape() {
        let request = Request {
            id: 7,
            command: Command::GetProperty {
                object: ObjectId(3),
                name: "Cell".into(),
                args: vec![Value::Int(2), Value::Int(5)],
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": 7,
                "cmd": "GetProperty",
                "params": {
                    "object": 3,
                    "name": "Cell",
                    "args": [{"type": "Int", "value": 2}, {"type": "Int", "value": 5}]
                }
            })
        );
    }

    #[test]
    fn test_error_response_defaults_kind() {
        let line = r#"{"id":4,"status":"error","message":"boom"}"#;
        let response: Response = serde_json::from_str(line).unwrap();
        assert_eq!(
            response.result,
            ResponseResult::Error {
                message: "boom".into(),
                kind: FaultKind::Exception,
            }
        );
    }

    #[test]
    fn test_unit_commands_parse() {
        let request: Request = serde_json::from_str(r#"{"id":1,"cmd":"Shutdown"}"#).unwrap();
        assert_eq!(request.command, Command::Shutdown);
    }

    #[test]
    fn test_value_integer_view() {
        assert_eq!(Value::Double(4.0).as_i32(), Some(4));
        assert_eq!(Value::Double(4.5).as_i32(), None);
        assert_eq!(Value::Text("4".into()).as_i32(), None);
    }
}
