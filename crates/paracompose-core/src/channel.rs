//! Process channel contract.
//!
//! A [`ProcessChannel`] connects a fixed set of numbered processes. It offers
//! blocking point-to-point messages matched on `(source, tag)`, a broadcast,
//! and one-way remote method invocations (RMIs) that a service loop dispatches
//! to an [`RmiHandler`] until a [`MessageTag::Break`] trigger arrives.
//!
//! The coordinator treats the transport as opaque: payloads are raw bytes and
//! the only framing is the order in which sends and receives are paired.

use serde::{Deserialize, Serialize};

use crate::error::ChannelResult;

/// Logical message tags used by the render protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageTag {
    /// RMI: a render is starting, render too.
    RenderRmi,
    /// RMI: compute local visible-prop bounds and reply.
    ComputeBoundsRmi,
    /// Window-level integer record.
    WinInfoInt,
    /// Window-level floating-point record.
    WinInfoFloat,
    /// Per-viewport integer record.
    RenInfoInt,
    /// Per-viewport floating-point record.
    RenInfoFloat,
    /// Per-light floating-point record.
    LightInfoFloat,
    /// Viewport index for a bounds query.
    RenId,
    /// Bounds reply.
    Bounds,
    /// RMI: leave the service loop.
    Break,
    /// Transport-internal tag used by [`ProcessChannel::broadcast`].
    Broadcast,
}

impl MessageTag {
    /// Numeric tag value as carried by message-passing transports.
    #[must_use]
    pub fn value(self) -> i32 {
        match self {
            MessageTag::RenderRmi => 34532,
            MessageTag::ComputeBoundsRmi => 54636,
            MessageTag::WinInfoInt => 87834,
            MessageTag::WinInfoFloat => 87835,
            MessageTag::RenInfoInt => 87836,
            MessageTag::RenInfoFloat => 87837,
            MessageTag::LightInfoFloat => 87838,
            MessageTag::RenId => 58794,
            MessageTag::Bounds => 23543,
            MessageTag::Break => 239_954,
            MessageTag::Broadcast => 10,
        }
    }

    /// Whether this tag names a remote method invocation.
    #[must_use]
    pub fn is_rmi(self) -> bool {
        matches!(
            self,
            MessageTag::RenderRmi | MessageTag::ComputeBoundsRmi | MessageTag::Break
        )
    }
}

/// The part a process plays in the render protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Owns the interactive window and drives every cycle.
    Root,
    /// Follows the root's commands.
    Satellite,
}

impl Role {
    /// Derives the role of `local_process_id` given the configured root.
    #[must_use]
    pub fn for_process(local_process_id: usize, root_process_id: usize) -> Self {
        if local_process_id == root_process_id {
            Role::Root
        } else {
            Role::Satellite
        }
    }
}

/// Receiver side of remote method invocations.
///
/// Registration is declarative: the service loop consults
/// [`registered_tags`](RmiHandler::registered_tags) and only dispatches those.
pub trait RmiHandler {
    /// Tags this handler services.
    fn registered_tags(&self) -> &[MessageTag];

    /// Runs the handler for `tag`, triggered by process `source`.
    fn handle_rmi(&mut self, tag: MessageTag, source: usize, payload: &[u8]);
}

/// Point-to-point, broadcast and RMI primitives between numbered processes.
pub trait ProcessChannel: Send + Sync {
    /// Id of the process this endpoint belongs to.
    fn local_process_id(&self) -> usize;

    /// Number of processes connected by the channel.
    fn process_count(&self) -> usize;

    /// Sends `data` to `dest` under `tag`.
    fn send(&self, data: &[u8], dest: usize, tag: MessageTag) -> ChannelResult<()>;

    /// Blocks until a message from `source` with `tag` arrives and copies it
    /// into `buffer`. The message length must equal `buffer.len()`.
    fn receive(&self, buffer: &mut [u8], source: usize, tag: MessageTag) -> ChannelResult<()>;

    /// On `root`, sends `buffer` to every other process; elsewhere, fills
    /// `buffer` with the root's data.
    fn broadcast(&self, buffer: &mut [u8], root: usize) -> ChannelResult<()>;

    /// Triggers the handler for `tag` on process `dest`.
    fn trigger_rmi(&self, dest: usize, tag: MessageTag, payload: &[u8]) -> ChannelResult<()>;

    /// Dispatches incoming RMIs to `handler` until a break trigger arrives.
    fn process_rmis(&self, handler: &mut dyn RmiHandler) -> ChannelResult<()>;

    /// Ids of every process except `root`, in ascending order.
    fn satellites_of(&self, root: usize) -> Vec<usize> {
        (0..self.process_count()).filter(|&id| id != root).collect()
    }
}
