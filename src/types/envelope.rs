//! Wire envelope shared by inbound messages and outbound commands

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Command name the relay uses for pushed data
pub const CMD_JSON_DATA: &str = "krtJSONData";

/// Command a client sends to subscribe to a polled URL
pub const CMD_SUBSCRIBE: &str = "subscribe";

/// Command a client sends to drop a subscription
pub const CMD_UNSUBSCRIBE: &str = "unsubscribe";

/// `{ "cmd": string, "data": object }`
///
/// Field order is part of the wire format: `cmd` is always serialized first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub cmd: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(cmd: impl Into<String>, data: Value) -> Self {
        Self {
            cmd: cmd.into(),
            data,
        }
    }

    /// `{"cmd":"subscribe","data":{"key":..,"url":..}}`
    pub fn subscribe(key: &str, url: &str) -> Self {
        Self::new(CMD_SUBSCRIBE, json!({ "key": key, "url": url }))
    }

    /// `{"cmd":"unsubscribe","data":{"url":..}}`
    pub fn unsubscribe(url: &str) -> Self {
        Self::new(CMD_UNSUBSCRIBE, json!({ "url": url }))
    }

    /// Encode as a JSON text frame
    pub fn to_json(&self) -> String {
        // Serializing a String and a Value cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}
