//! Message fan-out to upgraded channels.
//!
//! Best effort: a message is queued for every channel that is open when
//! the broadcast starts. Channels in any other state are skipped, and a
//! full or closed queue is ignored.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

/// Outbound queue depth per channel.
pub const CHANNEL_QUEUE_DEPTH: usize = 32;

/// Protocol-level state of an upgraded channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChannelState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ChannelState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ChannelState::Connecting,
            1 => ChannelState::Open,
            2 => ChannelState::Closing,
            _ => ChannelState::Closed,
        }
    }
}

/// A handshake-completed, message-capable connection.
#[derive(Debug)]
pub struct UpgradedChannel {
    pub id: Uuid,
    pub peer: Option<SocketAddr>,
    pub connected_at: Instant,
    state: AtomicU8,
    tx: mpsc::Sender<Arc<str>>,
}

impl UpgradedChannel {
    /// New channel in the `Connecting` state, writing into `tx`.
    pub fn new(peer: Option<SocketAddr>, tx: mpsc::Sender<Arc<str>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer,
            connected_at: Instant::now(),
            state: AtomicU8::new(ChannelState::Connecting as u8),
            tx,
        }
    }

    pub fn state(&self) -> ChannelState {
        ChannelState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: ChannelState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn is_open(&self) -> bool {
        self.state() == ChannelState::Open
    }

    /// Queue a message for the writer without waiting.
    pub fn send(&self, message: Arc<str>) -> Result<(), TrySendError<Arc<str>>> {
        self.tx.try_send(message)
    }
}

/// Outcome of one broadcast.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    /// Open channels the message was queued for.
    pub delivered: usize,
    /// Open channels whose queue was full or whose writer was gone.
    pub dropped: usize,
}

/// Set of upgraded channels.
#[derive(Debug, Default)]
pub struct ChannelSet {
    channels: DashMap<Uuid, Arc<UpgradedChannel>>,
    verbose: bool,
}

impl ChannelSet {
    pub fn new(verbose: bool) -> Self {
        Self {
            channels: DashMap::new(),
            verbose,
        }
    }

    pub(crate) fn insert(&self, channel: Arc<UpgradedChannel>) {
        self.channels.insert(channel.id, channel);
    }

    pub(crate) fn remove(&self, id: &Uuid) {
        self.channels.remove(id);
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Channels currently tracked, in no particular order.
    pub fn snapshot(&self) -> Vec<Arc<UpgradedChannel>> {
        self.channels.iter().map(|c| Arc::clone(c.value())).collect()
    }

    /// Number of channels in the `Open` state.
    pub fn open_count(&self) -> usize {
        self.channels.iter().filter(|c| c.is_open()).count()
    }

    /// Send `message` to every open channel.
    pub fn broadcast(&self, message: &str) -> Delivery {
        let snapshot = self.snapshot();
        if self.verbose {
            tracing::info!(
                connections = snapshot.len(),
                payload = message,
                "Sending message to connection(s)"
            );
        }

        let message: Arc<str> = Arc::from(message);
        let mut delivery = Delivery::default();
        for channel in snapshot.iter().filter(|c| c.is_open()) {
            match channel.send(Arc::clone(&message)) {
                Ok(()) => delivery.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    delivery.dropped += 1;
                    if self.verbose {
                        tracing::warn!(
                            channel_id = %channel.id,
                            queue_depth = CHANNEL_QUEUE_DEPTH,
                            "Queue full, message dropped"
                        );
                    } else {
                        tracing::debug!(channel_id = %channel.id, "Queue full, message dropped");
                    }
                }
                Err(TrySendError::Closed(_)) => {
                    delivery.dropped += 1;
                    tracing::debug!(channel_id = %channel.id, "Channel writer gone");
                }
            }
        }
        delivery
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_channel(set: &ChannelSet) -> (Arc<UpgradedChannel>, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(CHANNEL_QUEUE_DEPTH);
        let channel = Arc::new(UpgradedChannel::new(None, tx));
        channel.set_state(ChannelState::Open);
        set.insert(Arc::clone(&channel));
        (channel, rx)
    }

    #[test]
    fn new_channel_is_connecting() {
        let (tx, _rx) = mpsc::channel(1);
        let channel = UpgradedChannel::new(None, tx);
        assert_eq!(channel.state(), ChannelState::Connecting);
        assert!(!channel.is_open());
    }

    #[tokio::test]
    async fn broadcast_reaches_only_open_channels() {
        let set = ChannelSet::new(false);
        let mut channels: Vec<_> = (0..6).map(|_| open_channel(&set)).collect();

        let skipped = [ChannelState::Closing, ChannelState::Closed, ChannelState::Connecting];
        for (i, state) in skipped.iter().enumerate() {
            channels[i].0.set_state(*state);
        }
        assert_eq!(set.open_count(), 3);

        let delivery = set.broadcast("reload");
        assert_eq!(delivery.delivered, 3);
        assert_eq!(delivery.dropped, 0);

        for (i, (_, rx)) in channels.iter_mut().enumerate() {
            if i < skipped.len() {
                assert!(rx.try_recv().is_err(), "channel {i} should be skipped");
            } else {
                assert_eq!(&*rx.try_recv().unwrap(), "reload");
                assert!(rx.try_recv().is_err());
            }
        }
    }

    #[tokio::test]
    async fn broadcast_ignores_dead_queues() {
        let set = ChannelSet::new(true);
        let (_gone, rx) = open_channel(&set);
        drop(rx);
        let (_full, _rx_full) = {
            let (tx, rx) = mpsc::channel(1);
            let channel = Arc::new(UpgradedChannel::new(None, tx));
            channel.set_state(ChannelState::Open);
            channel.send(Arc::from("filler")).unwrap();
            set.insert(Arc::clone(&channel));
            (channel, rx)
        };
        let (_ok, mut rx_ok) = open_channel(&set);

        let delivery = set.broadcast("reload");
        assert_eq!(&*rx_ok.try_recv().unwrap(), "reload");
        assert_eq!(
            delivery,
            Delivery {
                delivered: 1,
                dropped: 2
            }
        );
    }

    #[test]
    fn remove_channel() {
        let set = ChannelSet::new(false);
        let (channel, _rx) = open_channel(&set);
        assert_eq!(set.len(), 1);
        set.remove(&channel.id);
        assert!(set.is_empty());
        assert_eq!(set.broadcast("reload"), Delivery::default());
    }

    #[tokio::test]
    async fn saturated_queue_drops_only_the_overflow() {
        let set = ChannelSet::new(true);
        let (_channel, mut rx) = open_channel(&set);

        for _ in 0..CHANNEL_QUEUE_DEPTH {
            assert_eq!(set.broadcast("reload").delivered, 1);
        }
        assert_eq!(set.broadcast("reload").dropped, 1);

        rx.try_recv().unwrap();
        assert_eq!(set.broadcast("reload").delivered, 1);
    }
}
