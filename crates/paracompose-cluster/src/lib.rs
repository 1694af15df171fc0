//! In-process process channels for paracompose.
//!
//! [`LocalCluster`] connects a set of [`LocalChannel`] endpoints so that a
//! root and its satellites can run as threads of one program, e.g. in tests
//! or single-machine demos.

#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod local;

pub use local::{ChannelStats, LocalChannel, LocalCluster};
