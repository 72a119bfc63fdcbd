//! Pluggable value codecs.
//!
//! A [`Codec`] turns any serde-serializable value into bytes and back. The
//! store never inspects the bytes; it only needs encode/decode to round-trip
//! and a file extension for naming records on disk.
//!
//! - [`JsonCodec`]: UTF-8 JSON via `serde_json` (the default, extension `json`)
//! - [`MsgPackCodec`]: `MessagePack` via `rmp-serde` (extension `msgpack`)

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Errors produced while encoding or decoding a value.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("{codec} encode failed: {message}")]
    Encode { codec: &'static str, message: String },
    #[error("{codec} decode failed: {message}")]
    Decode { codec: &'static str, message: String },
}

/// Byte-level serializer for arbitrary typed values.
///
/// Generic over the value type, so implementations are used as a type
/// parameter rather than behind `dyn`.
pub trait Codec: Send + Sync + 'static {
    /// Short name used in error messages and traces.
    fn name(&self) -> &'static str;

    /// File extension (without the dot) for records written with this codec.
    fn extension(&self) -> &'static str;

    /// Serialize `value` into bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if the value cannot be represented.
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    /// Deserialize bytes into a `T`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] if the bytes are malformed or do not
    /// match the shape of `T`.
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError>;
}

/// JSON codec backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec {
    pretty: bool,
}

impl JsonCodec {
    /// Compact JSON output.
    #[must_use]
    pub fn new() -> Self {
        Self { pretty: false }
    }

    /// Indented, human-readable JSON output.
    #[must_use]
    pub fn pretty() -> Self {
        Self { pretty: true }
    }

    #[must_use]
    pub fn is_pretty(&self) -> bool {
        self.pretty
    }
}

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn extension(&self) -> &'static str {
        "json"
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        let result = if self.pretty {
            serde_json::to_vec_pretty(value)
        } else {
            serde_json::to_vec(value)
        };
        result.map_err(|e| CodecError::Encode {
            codec: self.name(),
            message: e.to_string(),
        })
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode {
            codec: self.name(),
            message: e.to_string(),
        })
    }
}

/// `MessagePack` codec backed by `rmp-serde`.
///
/// Structs are encoded as maps (field names included) so that adding
/// optional fields to a stored type does not break older records.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackCodec;

impl Codec for MsgPackCodec {
    fn name(&self) -> &'static str {
        "msgpack"
    }

    fn extension(&self) -> &'static str {
        "msgpack"
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        rmp_serde::to_vec_named(value).map_err(|e| CodecError::Encode {
            codec: self.name(),
            message: e.to_string(),
        })
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        rmp_serde::from_slice(bytes).map_err(|e| CodecError::Decode {
            codec: self.name(),
            message: e.to_string(),
        })
    }
}
