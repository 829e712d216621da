//! pagewatch runtime - transport, correlation and lifecycle
//!
//! This crate provides the plumbing between pagewatch and a remote debugging
//! target:
//!
//! - **Transport**: WebSocket frames pumped by dedicated read and write tasks
//! - **Connection**: request/response correlation by id and event routing
//! - **Timing**: request start tracking with periodic eviction
//! - **Lifecycle**: connection state and bounded reconnection decisions
//! - **Shutdown**: the single idempotent teardown path
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │ pagewatch    │  Session driver, executor, monitor
//! └──────┬───────┘
//!        │ TargetResolver / Connector / Teardown
//! ┌──────▼───────┐
//! │   runtime    │  This crate
//! │  ┌────────┐  │
//! │  │ Conn   │  │  Pending table + router
//! │  └────────┘  │
//! │  ┌────────┐  │
//! │  │ Trans  │  │  WebSocket read/write pumps
//! │  └────────┘  │
//! └──────────────┘
//! ```

pub mod connection;
pub mod error;
pub mod session;
pub mod shutdown;
pub mod timing;
pub mod transport;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use connection::{
	Connection, IdAllocator, Inbound, PendingRequest, PendingResponse, PendingTable, RequestPurpose,
};
pub use error::{Error, Result};
pub use session::{
	CloseAction, Connector, ErrorAction, Lifecycle, ReconnectPolicy, SessionState, TargetResolver,
	WebSocketConnector,
};
pub use shutdown::{ExitStatus, NoopTeardown, ShutdownCoordinator, Teardown};
pub use timing::{RequestTimings, SweepSchedule};
pub use transport::{
	BoxFut, Transport, TransportEvent, TransportParts, TransportReceiver, WebSocketTransport,
};
