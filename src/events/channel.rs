//! Status channel implementation using crossbeam-channel.
//!
//! Status updates travel through this channel instead of the log so that
//! high-frequency encoder progress never floods it.

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};

use super::Event;

/// Sends status events from the core library.
///
/// Cloneable; every clone feeds the same receiver.
#[derive(Clone)]
pub struct EventSender {
    inner: Sender<Event>,
}

impl std::fmt::Debug for EventSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSender")
            .field("pending", &self.inner.len())
            .finish()
    }
}

impl EventSender {
    /// Wrap a raw crossbeam sender.
    pub fn new(sender: Sender<Event>) -> Self {
        Self { inner: sender }
    }

    /// Send an event, waiting for room on a bounded channel.
    ///
    /// If the receiver is gone the event is discarded.
    pub fn send(&self, event: Event) {
        let _ = self.inner.send(event);
    }

    /// Send an event only if it fits right now.
    ///
    /// Used for progress ticks: a slow front end loses ticks instead of
    /// stalling the encoder read loop. Returns whether the event was queued.
    pub fn offer(&self, event: Event) -> bool {
        match self.inner.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Receives status events from the core library.
pub struct EventReceiver {
    inner: Receiver<Event>,
}

impl EventReceiver {
    /// Block until the next event is received
    pub fn recv(&self) -> Option<Event> {
        self.inner.recv().ok()
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&self) -> Option<Event> {
        self.inner.try_recv().ok()
    }

    /// Iterate until every sender is dropped
    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.inner.iter()
    }

    /// Drain whatever is queued right now
    pub fn drain(&self) -> Vec<Event> {
        self.inner.try_iter().collect()
    }
}

/// Factory for status channels.
pub struct EventChannel;

impl EventChannel {
    /// Create an unbounded channel.
    pub fn new() -> (EventSender, EventReceiver) {
        let (sender, receiver) = unbounded();
        (
            EventSender { inner: sender },
            EventReceiver { inner: receiver },
        )
    }

    /// Create a bounded channel; `offer` drops events once it is full.
    pub fn bounded(capacity: usize) -> (EventSender, EventReceiver) {
        let (sender, receiver) = bounded(capacity);
        (
            EventSender { inner: sender },
            EventReceiver { inner: receiver },
        )
    }
}

/// A sender whose receiver is already gone.
///
/// Useful for tests and for runs nobody is watching.
pub fn null_sender() -> EventSender {
    let (sender, _receiver) = EventChannel::new();
    sender
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ConvertEvent, EncodeProgress, RunEvent};
    use std::path::PathBuf;
    use std::thread;

    fn started() -> Event {
        Event::Run(RunEvent::Started {
            run_id: "test".to_string(),
        })
    }

    #[test]
    fn events_can_be_sent_across_threads() {
        let (sender, receiver) = EventChannel::new();

        let handle = thread::spawn(move || {
            sender.send(Event::Convert(ConvertEvent::Progress(EncodeProgress {
                path: PathBuf::from("/inbox/clip.mov"),
                percent: Some(25.0),
                eta_seconds: None,
                speed: None,
            })));
        });

        handle.join().unwrap();

        match receiver.recv().unwrap() {
            Event::Convert(ConvertEvent::Progress(p)) => {
                assert_eq!(p.percent, Some(25.0));
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn null_sender_does_not_panic() {
        let sender = null_sender();
        sender.send(started());
        assert!(!sender.offer(started()));
    }

    #[test]
    fn offer_drops_when_full() {
        let (sender, receiver) = EventChannel::bounded(2);

        assert!(sender.offer(started()));
        assert!(sender.offer(started()));
        assert!(!sender.offer(started()));

        assert_eq!(receiver.drain().len(), 2);
        assert!(receiver.try_recv().is_none());
    }
}
