//! # DMCKit Communication
//!
//! Controller session layer for Galil DMC motion controllers: connection
//! lifecycle, command dispatch with error recovery, readiness polling,
//! chunked bulk array transfer, and length discovery. The UI (or any other
//! collaborator) talks to this layer through [`ControllerHandle`] and gets
//! plain data or typed errors back.

pub mod arrays;
pub mod directory;
pub mod length;
pub mod readiness;
pub mod service;
pub mod session;
pub mod transport;

pub use directory::{filter_network_addresses, split_revision, AddressDirectory, StaticDirectory};
pub use readiness::ReadinessState;
pub use service::{spawn_status_poller, Controller, ControllerHandle, ControllerService, StatusFeed};
pub use session::{DmcSession, Observer, SessionConfig};
pub use transport::{
    serial::SerialTransport, tcp::TcpTransport, BlockFormat, NoOpTransport, RetryPolicy, Transport,
};
