//! In-process cluster: one channel endpoint per simulated process.
//!
//! Every endpoint owns an unbounded inbox. Messages that arrive while the
//! endpoint is waiting for something else are parked in a pending queue and
//! matched later on `(source, tag)`, so point-to-point ordering per
//! `(source, tag)` pair is preserved.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use paracompose_core::channel::{MessageTag, ProcessChannel, RmiHandler};
use paracompose_core::error::{ChannelError, ChannelResult};

#[derive(Debug)]
enum Kind {
    Message,
    Rmi,
}

#[derive(Debug)]
struct Envelope {
    source: usize,
    kind: Kind,
    tag: MessageTag,
    payload: Vec<u8>,
}

/// Traffic counters for one endpoint.
#[derive(Debug, Default)]
pub struct ChannelStats {
    /// Point-to-point messages sent.
    pub messages_sent: AtomicU64,
    /// Point-to-point messages received.
    pub messages_received: AtomicU64,
    /// RMIs triggered on other processes.
    pub rmis_triggered: AtomicU64,
    /// RMIs dispatched to a handler.
    pub rmis_handled: AtomicU64,
}

impl ChannelStats {
    /// `(sent, received, triggered, handled)` snapshot.
    pub fn snapshot(&self) -> (u64, u64, u64, u64) {
        (
            self.messages_sent.load(Ordering::Relaxed),
            self.messages_received.load(Ordering::Relaxed),
            self.rmis_triggered.load(Ordering::Relaxed),
            self.rmis_handled.load(Ordering::Relaxed),
        )
    }
}

/// Builder for a set of connected [`LocalChannel`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalCluster {
    timeout: Option<Duration>,
}

impl LocalCluster {
    /// Creates a builder whose receives block indefinitely.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes blocking receives fail with [`ChannelError::Timeout`] after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Creates `process_count` connected endpoints, indexed by process id.
    pub fn build(self, process_count: usize) -> Vec<Arc<LocalChannel>> {
        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..process_count).map(|_| unbounded::<Envelope>()).unzip();
        receivers
            .into_iter()
            .enumerate()
            .map(|(id, inbox)| {
                Arc::new(LocalChannel {
                    id,
                    outboxes: senders.clone(),
                    inbox,
                    pending: Mutex::new(VecDeque::new()),
                    timeout: self.timeout,
                    stats: ChannelStats::default(),
                })
            })
            .collect()
    }
}

/// One process's endpoint of a [`LocalCluster`].
pub struct LocalChannel {
    id: usize,
    outboxes: Vec<Sender<Envelope>>,
    inbox: Receiver<Envelope>,
    pending: Mutex<VecDeque<Envelope>>,
    timeout: Option<Duration>,
    stats: ChannelStats,
}

impl std::fmt::Debug for LocalChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalChannel")
            .field("id", &self.id)
            .field("process_count", &self.outboxes.len())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl LocalChannel {
    /// Traffic counters of this endpoint.
    pub fn stats(&self) -> &ChannelStats {
        &self.stats
    }

    fn pending(&self) -> MutexGuard<'_, VecDeque<Envelope>> {
        // The queue holds plain data; a poisoned lock leaves it consistent.
        self.pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn post(&self, dest: usize, envelope: Envelope) -> ChannelResult<()> {
        let outbox = self
            .outboxes
            .get(dest)
            .ok_or(ChannelError::InvalidProcess(dest))?;
        outbox
            .send(envelope)
            .map_err(|_| ChannelError::Disconnected(dest))
    }

    /// Takes the first queued or incoming envelope accepted by `matches`,
    /// parking everything else.
    fn take(
        &self,
        matches: impl Fn(&Envelope) -> bool,
        source: usize,
        tag: MessageTag,
    ) -> ChannelResult<Envelope> {
        {
            let mut pending = self.pending();
            if let Some(pos) = pending.iter().position(&matches) {
                if let Some(envelope) = pending.remove(pos) {
                    return Ok(envelope);
                }
            }
        }

        let deadline = self.timeout.map(|t| Instant::now() + t);
        loop {
            let envelope = match deadline {
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    match self.inbox.recv_timeout(left) {
                        Ok(envelope) => envelope,
                        Err(RecvTimeoutError::Timeout) => {
                            return Err(ChannelError::Timeout {
                                process: source,
                                tag,
                            })
                        }
                        Err(RecvTimeoutError::Disconnected) => {
                            return Err(ChannelError::Disconnected(source))
                        }
                    }
                }
                None => self
                    .inbox
                    .recv()
                    .map_err(|_| ChannelError::Disconnected(source))?,
            };
            if matches(&envelope) {
                return Ok(envelope);
            }
            self.pending().push_back(envelope);
        }
    }
}

impl ProcessChannel for LocalChannel {
    fn local_process_id(&self) -> usize {
        self.id
    }

    fn process_count(&self) -> usize {
        self.outboxes.len()
    }

    fn send(&self, data: &[u8], dest: usize, tag: MessageTag) -> ChannelResult<()> {
        self.post(
            dest,
            Envelope {
                source: self.id,
                kind: Kind::Message,
                tag,
                payload: data.to_vec(),
            },
        )?;
        self.stats.messages_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn receive(&self, buffer: &mut [u8], source: usize, tag: MessageTag) -> ChannelResult<()> {
        if source >= self.process_count() {
            return Err(ChannelError::InvalidProcess(source));
        }
        let envelope = self.take(
            |e| matches!(e.kind, Kind::Message) && e.source == source && e.tag == tag,
            source,
            tag,
        )?;
        if envelope.payload.len() != buffer.len() {
            return Err(ChannelError::SizeMismatch {
                tag,
                expected: buffer.len(),
                actual: envelope.payload.len(),
            });
        }
        buffer.copy_from_slice(&envelope.payload);
        self.stats.messages_received.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn broadcast(&self, buffer: &mut [u8], root: usize) -> ChannelResult<()> {
        if self.id == root {
            for dest in self.satellites_of(root) {
                self.send(buffer, dest, MessageTag::Broadcast)?;
            }
            Ok(())
        } else {
            self.receive(buffer, root, MessageTag::Broadcast)
        }
    }

    fn trigger_rmi(&self, dest: usize, tag: MessageTag, payload: &[u8]) -> ChannelResult<()> {
        self.post(
            dest,
            Envelope {
                source: self.id,
                kind: Kind::Rmi,
                tag,
                payload: payload.to_vec(),
            },
        )?;
        self.stats.rmis_triggered.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn process_rmis(&self, handler: &mut dyn RmiHandler) -> ChannelResult<()> {
        loop {
            // Service loops idle indefinitely; only message receives time out.
            let envelope = {
                let mut pending = self.pending();
                pending
                    .iter()
                    .position(|e| matches!(e.kind, Kind::Rmi))
                    .and_then(|pos| pending.remove(pos))
            };
            let envelope = match envelope {
                Some(envelope) => envelope,
                None => loop {
                    let envelope = self
                        .inbox
                        .recv()
                        .map_err(|_| ChannelError::Disconnected(self.id))?;
                    if matches!(envelope.kind, Kind::Rmi) {
                        break envelope;
                    }
                    self.pending().push_back(envelope);
                },
            };

            if envelope.tag == MessageTag::Break {
                log::debug!("process {} leaving service loop", self.id);
                return Ok(());
            }
            if handler.registered_tags().contains(&envelope.tag) {
                self.stats.rmis_handled.fetch_add(1, Ordering::Relaxed);
                handler.handle_rmi(envelope.tag, envelope.source, &envelope.payload);
            } else {
                log::warn!(
                    "process {} has no handler for {:?} from {}",
                    self.id,
                    envelope.tag,
                    envelope.source
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    struct Recorder {
        seen: Vec<(MessageTag, usize, Vec<u8>)>,
    }

    impl RmiHandler for Recorder {
        fn registered_tags(&self) -> &[MessageTag] {
            &[MessageTag::RenderRmi]
        }

        fn handle_rmi(&mut self, tag: MessageTag, source: usize, payload: &[u8]) {
            self.seen.push((tag, source, payload.to_vec()));
        }
    }

    #[test]
    fn test_receive_matches_source_and_tag() {
        let channels = LocalCluster::new().build(3);
        channels[1].send(&[1], 0, MessageTag::WinInfoInt).unwrap();
        channels[2].send(&[2], 0, MessageTag::WinInfoInt).unwrap();
        channels[1].send(&[3], 0, MessageTag::RenInfoInt).unwrap();

        let mut buf = [0u8; 1];
        channels[0].receive(&mut buf, 1, MessageTag::RenInfoInt).unwrap();
        assert_eq!(buf, [3]);
        channels[0].receive(&mut buf, 2, MessageTag::WinInfoInt).unwrap();
        assert_eq!(buf, [2]);
        channels[0].receive(&mut buf, 1, MessageTag::WinInfoInt).unwrap();
        assert_eq!(buf, [1]);
        assert_eq!(channels[0].stats().snapshot().1, 3);
    }

    #[test]
    fn test_size_mismatch() {
        let channels = LocalCluster::new().build(2);
        channels[0].send(&[1, 2, 3], 1, MessageTag::Bounds).unwrap();
        let mut buf = [0u8; 2];
        let err = channels[1]
            .receive(&mut buf, 0, MessageTag::Bounds)
            .unwrap_err();
        assert_eq!(
            err,
            ChannelError::SizeMismatch {
                tag: MessageTag::Bounds,
                expected: 2,
                actual: 3
            }
        );
    }

    #[test]
    fn test_receive_timeout() {
        let channels = LocalCluster::new()
            .with_timeout(Duration::from_millis(20))
            .build(2);
        let mut buf = [0u8; 4];
        let err = channels[1]
            .receive(&mut buf, 0, MessageTag::WinInfoInt)
            .unwrap_err();
        assert_eq!(
            err,
            ChannelError::Timeout {
                process: 0,
                tag: MessageTag::WinInfoInt
            }
        );
    }

    #[test]
    fn test_invalid_process() {
        let channels = LocalCluster::new().build(2);
        assert_eq!(
            channels[0].send(&[0], 5, MessageTag::RenId),
            Err(ChannelError::InvalidProcess(5))
        );
    }

    #[test]
    fn test_process_rmis_until_break() {
        let channels = LocalCluster::new().build(2);
        let satellite = Arc::clone(&channels[1]);
        let worker = thread::spawn(move || {
            let mut recorder = Recorder { seen: Vec::new() };
            satellite.process_rmis(&mut recorder).unwrap();
            // Data sent alongside the RMIs is still receivable afterwards.
            let mut buf = [0u8; 1];
            satellite.receive(&mut buf, 0, MessageTag::RenId).unwrap();
            (recorder.seen, buf[0])
        });

        let root = &channels[0];
        root.trigger_rmi(1, MessageTag::RenderRmi, &[7]).unwrap();
        root.send(&[9], 1, MessageTag::RenId).unwrap();
        root.trigger_rmi(1, MessageTag::ComputeBoundsRmi, &[]).unwrap();
        root.trigger_rmi(1, MessageTag::Break, &[]).unwrap();

        let (seen, data) = worker.join().unwrap();
        assert_eq!(seen, vec![(MessageTag::RenderRmi, 0, vec![7])]);
        assert_eq!(data, 9);
    }

    #[test]
    fn test_broadcast() {
        let channels = LocalCluster::new().build(3);
        let mut data = [4u8, 2];
        channels[0].broadcast(&mut data, 0).unwrap();
        for channel in &channels[1..] {
            let mut buf = [0u8; 2];
            channel.broadcast(&mut buf, 0).unwrap();
            assert_eq!(buf, [4, 2]);
        }
    }
}
