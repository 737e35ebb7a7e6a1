use crate::protocol::{Result, WireMessage};

/// JSON codec for wire messages.
///
/// JSON keeps the value kinds of the descriptor grammar intact across the
/// boundary, and a `publish` message's descriptors deserialize to exactly
/// the descriptors the peer serialized.
///
/// # Example
///
/// ```
/// use tether_common::transport::JsonCodec;
/// use tether_common::protocol::WireMessage;
/// use serde_json::json;
///
/// let msg = WireMessage::Result { nonce: 1, value: json!(8) };
///
/// let encoded = JsonCodec::encode(&msg).unwrap();
/// let decoded = JsonCodec::decode(&encoded).unwrap();
/// assert_eq!(msg, decoded);
/// ```
pub struct JsonCodec;

impl JsonCodec {
    /// Encodes a wire message to bytes.
    pub fn encode(message: &WireMessage) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(message)?)
    }

    /// Decodes a wire message from bytes.
    pub fn decode(data: &[u8]) -> Result<WireMessage> {
        Ok(serde_json::from_slice(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sendable::Sendable;
    use serde_json::json;

    #[test]
    fn test_codec_round_trip() {
        let msg = WireMessage::Call {
            nonce: 42,
            name: "add".into(),
            args: vec![json!(3), json!(5)],
        };

        let encoded = JsonCodec::encode(&msg).unwrap();
        let decoded = JsonCodec::decode(&encoded).unwrap();

        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_codec_publish_round_trip() {
        let msg = WireMessage::Publish {
            name: "add".into(),
            args: vec![Sendable::Number, Sendable::Number],
            returns: Sendable::Number,
        };

        let encoded = JsonCodec::encode(&msg).unwrap();
        let decoded = JsonCodec::decode(&encoded).unwrap();

        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_codec_rejects_garbage() {
        assert!(JsonCodec::decode(b"not json").is_err());
        assert!(JsonCodec::decode(br#"{"type":"warp","nonce":1}"#).is_err());
    }

    #[test]
    fn test_codec_preserves_value_kinds() {
        let msg = WireMessage::Result {
            nonce: 1,
            value: json!({
                "nested": {
                    "array": [1, 2.5, "three", null, true],
                    "empty": {}
                }
            }),
        };

        let encoded = JsonCodec::encode(&msg).unwrap();
        let decoded = JsonCodec::decode(&encoded).unwrap();

        assert_eq!(msg, decoded);
    }
}
