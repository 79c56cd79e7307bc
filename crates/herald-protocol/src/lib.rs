//! # herald-protocol
//!
//! Wire definitions for the Herald push notification SDK.
//!
//! This crate defines the value types exchanged with the remote push
//! service and the codecs used to put them on the wire.
//!
//! ## Types
//!
//! - `DeviceDetails` - A device registration as the service sees it
//! - `PushChannelSubscription` - A device or client subscribed to a channel
//! - `PublishRequest` - A direct publish to a push recipient
//! - `ErrorInfo` - The service's error envelope, also used as failure reason
//!
//! ## Example
//!
//! ```rust
//! use herald_protocol::{codec, DeviceDetails, DevicePlatform, FormFactor, Format};
//!
//! let device = DeviceDetails::new("device-1", DevicePlatform::Browser, FormFactor::Desktop);
//!
//! let encoded = codec::encode(Format::MsgPack, &device).unwrap();
//! let decoded: DeviceDetails = codec::decode(Format::MsgPack, &encoded).unwrap();
//! assert_eq!(device, decoded);
//! ```

pub mod codec;
pub mod error;
pub mod types;

pub use codec::{decode, encode, Format, ProtocolError};
pub use error::{codes, ErrorEnvelope, ErrorInfo};
pub use types::{
    DeviceDetails, DevicePlatform, DevicePushDetails, DevicePushState,
    DeviceRegistrationResponse, FormFactor, PublishRequest, PushChannelSubscription,
};
