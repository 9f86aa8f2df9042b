//! Client → relay message parsing

use serde::Deserialize;

use crate::types::{Envelope, UpdateKey, CMD_SUBSCRIBE, CMD_UNSUBSCRIBE};

/// What a dashboard asked the relay to do
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientCommand {
    /// Poll `url` and push its JSON under `key`
    Subscribe { key: UpdateKey, url: String },

    /// Stop pushing `url`
    Unsubscribe { url: String },

    /// A well-formed command the relay has no use for
    Other { cmd: String },
}

#[derive(Debug, Deserialize)]
struct SubscribeData {
    url: String,
    #[serde(default)]
    key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UnsubscribeData {
    url: String,
}

/// Parse a text frame. Returns None for frames that are not understood.
///
/// Besides `{cmd, data}` envelopes, a bare `http(s)://` URL subscribes
/// under the URL itself.
pub fn parse_client_message(text: &str) -> Option<ClientCommand> {
    let trimmed = text.trim();
    if is_http_url(trimmed) {
        return Some(ClientCommand::Subscribe {
            key: trimmed.to_string(),
            url: trimmed.to_string(),
        });
    }

    let envelope: Envelope = serde_json::from_str(trimmed).ok()?;
    match envelope.cmd.as_str() {
        CMD_SUBSCRIBE => {
            let data: SubscribeData = serde_json::from_value(envelope.data).ok()?;
            if !is_http_url(&data.url) {
                return None;
            }
            let key = data.key.unwrap_or_else(|| data.url.clone());
            Some(ClientCommand::Subscribe { key, url: data.url })
        }
        CMD_UNSUBSCRIBE => {
            let data: UnsubscribeData = serde_json::from_value(envelope.data).ok()?;
            Some(ClientCommand::Unsubscribe { url: data.url })
        }
        _ => Some(ClientCommand::Other { cmd: envelope.cmd }),
    }
}

fn is_http_url(text: &str) -> bool {
    text.starts_with("http://") || text.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_envelope() {
        let json = r#"{"cmd":"subscribe","data":{"key":"global","url":"http://host/json/globalstatus"}}"#;
        assert_eq!(
            parse_client_message(json),
            Some(ClientCommand::Subscribe {
                key: "global".to_string(),
                url: "http://host/json/globalstatus".to_string(),
            })
        );
    }

    #[test]
    fn test_bare_url_subscribes() {
        assert_eq!(
            parse_client_message("http://host/json/builders"),
            Some(ClientCommand::Subscribe {
                key: "http://host/json/builders".to_string(),
                url: "http://host/json/builders".to_string(),
            })
        );
    }

    #[test]
    fn test_unsubscribe_and_other() {
        assert_eq!(
            parse_client_message(r#"{"cmd":"unsubscribe","data":{"url":"http://host/a"}}"#),
            Some(ClientCommand::Unsubscribe {
                url: "http://host/a".to_string()
            })
        );
        assert_eq!(
            parse_client_message(r#"{"cmd":"test","data":{"test":"test123"}}"#),
            Some(ClientCommand::Other {
                cmd: "test".to_string()
            })
        );
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(parse_client_message("hello"), None);
        assert_eq!(parse_client_message(r#"{"cmd":"subscribe","data":{}}"#), None);
        assert_eq!(
            parse_client_message(r#"{"cmd":"subscribe","data":{"url":"file:///etc/passwd"}}"#),
            None
        );
    }
}
