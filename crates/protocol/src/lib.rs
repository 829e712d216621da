//! Wire types for the page debugging protocol.
//!
//! This crate contains the serde-serializable shapes exchanged with a remote
//! debugging target over its WebSocket endpoint:
//!
//! - **Messages**: outbound requests and the inbound response/event union
//! - **Capabilities**: the protocol domains that must be enabled before commands run
//! - **Events**: typed params for the console and network events the monitor consumes
//! - **Targets**: records returned by the HTTP discovery listing
//!
//! Types in this crate are pure data. Correlation, routing and lifecycle live in
//! `pagewatch-runtime`.

pub mod capability;
pub mod cookie;
pub mod events;
pub mod message;
pub mod target;

pub use capability::Capability;
pub use cookie::{Cookie, SameSite};
pub use events::*;
pub use message::{Event, InboundMessage, RemoteError, Request, Response};
pub use target::TargetInfo;
