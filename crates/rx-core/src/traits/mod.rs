//! Core trait definitions

mod connection;
mod upload;

pub use connection::MessageSink;
pub use upload::Uploader;
