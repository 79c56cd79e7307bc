//! # herald-transport
//!
//! Transport layer for the Herald push SDK.
//!
//! - **PushTransport** - The operations the activation machinery needs from
//!   the remote service (register, update, deregister) plus direct publish
//! - **RestTransport** - `PushTransport` over the service's HTTP API
//! - **Admin** - Stateless accessors for device registrations and channel
//!   subscriptions
//!
//! ```rust,ignore
//! use herald_transport::{PushTransport, RestOptions, RestTransport};
//!
//! let transport = RestTransport::new(RestOptions {
//!     key: Some("app.key:secret".into()),
//!     ..Default::default()
//! })?;
//! let token = transport.register(&device).await?;
//! ```

pub mod admin;
pub mod rest;
pub mod traits;

pub use admin::{Admin, ChannelSubscriptions, DeviceRegistrations};
pub use rest::{PaginatedResult, RestClient, RestOptions, RestTransport, UPDATE_TOKEN_HEADER};
pub use traits::{PushTransport, TransportError};
