//! # herald-core
//!
//! Push activation for the Herald SDK.
//!
//! This crate provides:
//!
//! - **Push** - Facade for activating, deactivating and publishing
//! - **ActivationStateMachine** - Registration lifecycle engine with a
//!   pending event queue and persisted quiescent state
//! - **transition** - The pure activation transition table
//! - **DeviceRegistrationStore** - The local device and its update token
//! - **Storage** - Key-value persistence, in memory or in a file
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  Command  ┌─────────────┐  Action  ┌───────────────┐
//! │    Push     │──────────▶│   Worker    │─────────▶│ PushTransport │
//! └─────────────┘           │  (machine)  │          │ PlatformPush  │
//!                           └─────────────┘          └───────────────┘
//!                                  ▲                         │
//!                                  └──────── Event ──────────┘
//! ```

pub mod device;
pub mod error;
pub mod event;
pub mod machine;
pub mod metrics;
pub mod platform;
pub mod push;
pub mod state;
pub mod storage;
pub mod transition;
pub mod worker;

pub use device::{generate_device_id, DeviceDefaults, DeviceRegistrationStore, LocalDevice};
pub use error::PushError;
pub use event::Event;
pub use machine::{ActivationStateMachine, Collaborators};
pub use platform::{CustomDeregisterer, CustomRegisterer, PlatformPush, StaticPlatform};
pub use push::{Push, PushBuilder};
pub use state::{ActivationState, DeregistrationFallback};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError};
pub use transition::{transition, Action, Step};
pub use worker::{ActivationCallback, Command, MachineHandle, MachineSnapshot, UpdateFailedCallback};
