//! rx-client: Client library for rexec
//!
//! Connects to the backend over a WebSocket, uploads artifacts over HTTP,
//! and coordinates the resulting session state. Presentation layers talk to
//! a [`ClientHandle`] and observe [`rx_core::SessionView`] snapshots.

pub mod connection;
pub mod coordinator;
pub mod driver;
pub mod state;
pub mod upload;

pub use connection::{ConnectionEvent, ConnectionManager};
pub use coordinator::SessionCoordinator;
pub use driver::{connect, ClientDriver, ClientHandle};
pub use state::ClientState;
pub use upload::HttpUploader;
