//! Push message decoding and shape validation.

use serde_json::Value;
use tracing::trace;

/// A recognized inbound push message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushMessage {
    /// New unread notification count for the viewer.
    UnreadCount(u64),
    /// A notification arrived; the payload is not carried because the list
    /// cache is refetched rather than merged into.
    Notification,
}

/// Decode one text frame into a push message.
///
/// Anything that is not a JSON object with a recognized `type` field is
/// silently dropped (defensive default: do nothing). An `unreadCount`
/// frame whose `count` is not a finite non-negative number is dropped too,
/// leaving the cache untouched.
pub fn decode_push(text: &str) -> Option<PushMessage> {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            trace!(error = %e, "dropping unparseable push frame");
            return None;
        }
    };

    let Some(object) = value.as_object() else {
        trace!("dropping non-object push frame");
        return None;
    };

    match object.get("type").and_then(Value::as_str) {
        Some("unreadCount") => {
            let count = object.get("count")?;
            // Integral floats are accepted (JSON has one number type);
            // fractional or negative counts are malformed and dropped.
            let count = count.as_u64().or_else(|| {
                count
                    .as_f64()
                    .filter(|n| n.is_finite() && *n >= 0.0 && n.fract() == 0.0)
                    .map(|n| n as u64)
            });
            match count {
                Some(count) => Some(PushMessage::UnreadCount(count)),
                None => {
                    trace!("dropping unreadCount frame with non-numeric count");
                    None
                }
            }
        }
        Some("notification") => Some(PushMessage::Notification),
        Some(other) => {
            trace!(kind = %other, "ignoring unknown push message type");
            None
        }
        None => {
            trace!("dropping push frame without type field");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(r#"{"type":"unreadCount","count":3}"# => Some(PushMessage::UnreadCount(3)); "integer count")]
    #[test_case(r#"{"type":"unreadCount","count":3.0}"# => Some(PushMessage::UnreadCount(3)); "integral float count")]
    #[test_case(r#"{"type":"unreadCount","count":3.9}"# => None; "fractional count dropped")]
    #[test_case(r#"{"type":"unreadCount","count":"abc"}"# => None; "string count dropped")]
    #[test_case(r#"{"type":"unreadCount","count":-1}"# => None; "negative count dropped")]
    #[test_case(r#"{"type":"unreadCount"}"# => None; "missing count dropped")]
    #[test_case(r#"{"type":"notification","data":{"id":1}}"# => Some(PushMessage::Notification); "notification with payload")]
    #[test_case(r#"{"type":"notification"}"# => Some(PushMessage::Notification); "notification without payload")]
    #[test_case(r#"{"type":"presence"}"# => None; "unknown type ignored")]
    #[test_case(r#"{"count":3}"# => None; "missing type ignored")]
    #[test_case(r#"[1,2,3]"# => None; "non-object ignored")]
    #[test_case(r#"not json"# => None; "unparseable ignored")]
    fn decode(frame: &str) -> Option<PushMessage> {
        decode_push(frame)
    }
}
