//! Body codecs for the push REST API.
//!
//! Request and response bodies are either JSON or MessagePack, selected by
//! the client's binary protocol option.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Maximum body size (16 MiB).
pub const MAX_BODY_SIZE: usize = 16 * 1024 * 1024;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Body exceeds maximum size.
    #[error("Body size {0} exceeds maximum {MAX_BODY_SIZE}")]
    BodyTooLarge(usize),

    /// MessagePack encoding error.
    #[error("Encoding error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// MessagePack decoding error.
    #[error("Decoding error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid body contents.
    #[error("Invalid body: {0}")]
    Invalid(String),
}

/// Wire format for request and response bodies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Format {
    /// Plain JSON.
    #[default]
    Json,
    /// MessagePack with named fields.
    MsgPack,
}

impl Format {
    /// Pick the format matching a binary protocol flag.
    #[must_use]
    pub fn from_binary_protocol(use_binary_protocol: bool) -> Self {
        if use_binary_protocol {
            Format::MsgPack
        } else {
            Format::Json
        }
    }

    /// MIME type used for `Content-Type` and `Accept` headers.
    #[must_use]
    pub fn content_type(&self) -> &'static str {
        match self {
            Format::Json => "application/json",
            Format::MsgPack => "application/x-msgpack",
        }
    }

    /// Short name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::MsgPack => "msgpack",
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Encode a value as a request body.
///
/// # Errors
///
/// Returns an error if serialization fails or the body is too large.
pub fn encode<T: Serialize + ?Sized>(format: Format, value: &T) -> Result<Bytes, ProtocolError> {
    let body = match format {
        Format::Json => serde_json::to_vec(value)?,
        Format::MsgPack => rmp_serde::to_vec_named(value)?,
    };

    if body.len() > MAX_BODY_SIZE {
        return Err(ProtocolError::BodyTooLarge(body.len()));
    }

    Ok(Bytes::from(body))
}

/// Decode a response body.
///
/// # Errors
///
/// Returns an error if the body is too large or cannot be deserialized.
pub fn decode<T: DeserializeOwned>(format: Format, data: &[u8]) -> Result<T, ProtocolError> {
    if data.len() > MAX_BODY_SIZE {
        return Err(ProtocolError::BodyTooLarge(data.len()));
    }

    let value = match format {
        Format::Json => serde_json::from_slice(data)?,
        Format::MsgPack => rmp_serde::from_slice(data)?,
    };
    Ok(value)
}
