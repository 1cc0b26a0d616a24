//! Wire records.
//!
//! Every record is one JSON object with a `type` tag. Inbound records tagged
//! `EVENT` are unsolicited notifications; everything else answers the query
//! currently in flight.

use serde::Serialize;
use serde_json::{Map, Value};

/// `type` tag of unsolicited notifications.
pub const EVENT_TYPE: &str = "EVENT";

/// `type` tag of error responses.
pub const ERROR_TYPE: &str = "error";

/// `type` tag of the generic command wrapper.
pub const COMMAND_TYPE: &str = "COMMAND";

/// Which sink an inbound record is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Event,
    Response,
}

/// One inbound record.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    kind: String,
    fields: Map<String, Value>,
    seq: u64,
}

impl Message {
    /// Build from a decoded JSON value. Returns `None` for anything that is not an object.
    pub fn from_value(value: Value, seq: u64) -> Option<Self> {
        let Value::Object(mut fields) = value else {
            return None;
        };
        let kind = match fields.remove("type") {
            Some(Value::String(s)) => s,
            _ => String::new(),
        };
        Some(Self { kind, fields, seq })
    }

    pub fn new(kind: impl Into<String>, fields: Map<String, Value>, seq: u64) -> Self {
        Self {
            kind: kind.into(),
            fields,
            seq,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Arrival order within the process.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn channel(&self) -> Channel {
        if self.kind == EVENT_TYPE {
            Channel::Event
        } else {
            Channel::Response
        }
    }

    /// The remote side signals failure either with an `error` type or an `error` field.
    pub fn is_error(&self) -> bool {
        self.kind == ERROR_TYPE || self.fields.contains_key("error")
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn f64_field(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(Value::as_f64)
    }

    pub fn i64_field(&self, name: &str) -> Option<i64> {
        self.fields.get(name).and_then(Value::as_i64)
    }

    pub fn bool_field(&self, name: &str) -> Option<bool> {
        self.fields.get(name).and_then(Value::as_bool)
    }
}

/// One outbound query or command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outbound {
    #[serde(rename = "type")]
    kind: String,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl Outbound {
    pub fn query(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: Map::new(),
        }
    }

    /// `{"type":"COMMAND","command":..,"args":..}`
    pub fn command(command: impl Into<String>, args: impl Into<String>) -> Self {
        Self::query(COMMAND_TYPE)
            .with("command", command.into())
            .with("args", args.into())
    }

    /// Add a payload field. The `type` key is reserved and ignored.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if key != "type" {
            self.fields.insert(key, value.into());
        }
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Serialize as one newline-terminated line.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut bytes = serde_json::to_vec(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}
