//! Error types for paracompose.

use thiserror::Error;

use crate::channel::{MessageTag, Role};

/// Errors raised by a [`ProcessChannel`](crate::channel::ProcessChannel) transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The process id does not name a member of the channel.
    #[error("process {0} is not part of this channel")]
    InvalidProcess(usize),

    /// The peer endpoint has gone away.
    #[error("process {0} disconnected")]
    Disconnected(usize),

    /// A message arrived with a different length than the receive buffer.
    #[error("size mismatch on {tag:?}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        tag: MessageTag,
        expected: usize,
        actual: usize,
    },

    /// No matching message arrived within the configured timeout.
    #[error("timed out waiting for {tag:?} from process {process}")]
    Timeout { process: usize, tag: MessageTag },
}

/// A specialized Result type for channel operations.
pub type ChannelResult<T> = std::result::Result<T, ChannelError>;

/// The main error type for paracompose operations.
#[derive(Error, Debug)]
pub enum ParacomposeError {
    /// No process channel has been attached.
    #[error("no process channel attached")]
    NoChannel,

    /// No render surface has been attached.
    #[error("no render surface attached")]
    NoSurface,

    /// A different surface is already attached and observed.
    #[error("render surface already attached; it cannot be replaced once wired")]
    SurfaceAlreadyAttached,

    /// The operation is only valid on the other role.
    #[error("{operation} is not valid on a {role:?} process")]
    WrongRole { operation: &'static str, role: Role },

    /// A pixel rectangle lies outside the image.
    #[error("requested pixels ({x1}, {y1})-({x2}, {y2}) outside of {width}x{height} image")]
    RegionOutOfBounds {
        x1: u32,
        y1: u32,
        x2: u32,
        y2: u32,
        width: u32,
        height: u32,
    },

    /// Data size mismatch.
    #[error("data size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// The shared render surface mutex was poisoned by a panic.
    #[error("render surface lock poisoned")]
    SurfacePoisoned,

    /// Options failed validation.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// Transport error.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for paracompose operations.
pub type Result<T> = std::result::Result<T, ParacomposeError>;
