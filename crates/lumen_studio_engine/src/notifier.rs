// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cross-thread notification plumbing.
//!
//! The worker and the owner thread share exactly one hand-off point: a
//! channel of [`EngineNotice`]s. The worker's [`Notifier`] pushes notices;
//! the owner thread pumps the [`EventQueue`] once per frame, which
//! broadcasts refresh events to the registered observers.

use crate::event::EventMask;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// A notice crossing from the worker to the owner thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineNotice {
    /// A background task started
    TaskStarted,
    /// A background task finished
    TaskFinished,
    /// Observers should consider refreshing
    Refresh(EventMask),
}

/// Sending half: cheap to clone, safe to hand to the worker
#[derive(Clone)]
pub struct Notifier {
    tx: UnboundedSender<EngineNotice>,
}

impl Notifier {
    /// Broadcast a refresh event to the observers
    pub fn notify(&self, mask: EventMask) {
        let _ = self.tx.send(EngineNotice::Refresh(mask));
    }

    /// Signal that a background task started
    pub fn task_started(&self) {
        let _ = self.tx.send(EngineNotice::TaskStarted);
    }

    /// Signal that a background task finished
    pub fn task_finished(&self) {
        let _ = self.tx.send(EngineNotice::TaskFinished);
    }
}

/// Receiving half, owned by the thread that drives the UI
pub struct EventQueue {
    rx: UnboundedReceiver<EngineNotice>,
    observers: Vec<Box<dyn FnMut(EventMask) + Send>>,
}

impl EventQueue {
    /// Create a connected notifier/queue pair
    pub fn channel() -> (Notifier, EventQueue) {
        let (tx, rx) = unbounded_channel();
        (
            Notifier { tx },
            EventQueue {
                rx,
                observers: Vec::new(),
            },
        )
    }

    /// Register an observer for refresh events
    pub fn subscribe(&mut self, observer: impl FnMut(EventMask) + Send + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Drain pending notices, broadcasting refresh events to observers.
    ///
    /// Returns the drained notices so callers can also track task
    /// start/finish state.
    pub fn pump(&mut self) -> Vec<EngineNotice> {
        let mut notices = Vec::new();
        while let Ok(notice) = self.rx.try_recv() {
            if let EngineNotice::Refresh(mask) = notice {
                for observer in &mut self.observers {
                    observer(mask);
                }
            }
            notices.push(notice);
        }
        notices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_pump_broadcasts_refreshes() {
        let (notifier, mut queue) = EventQueue::channel();
        let seen = Arc::new(AtomicU32::new(0));
        let seen_in_observer = Arc::clone(&seen);
        queue.subscribe(move |mask| {
            seen_in_observer.fetch_or(mask.0, Ordering::Relaxed);
        });

        notifier.task_started();
        notifier.notify(EventMask::IMAGE | EventMask::PROCESSED);
        notifier.task_finished();

        let notices = queue.pump();
        assert_eq!(notices.len(), 3);
        assert_eq!(notices[0], EngineNotice::TaskStarted);
        assert_eq!(notices[2], EngineNotice::TaskFinished);
        assert_eq!(
            EventMask(seen.load(Ordering::Relaxed)),
            EventMask::IMAGE | EventMask::PROCESSED
        );
    }

    #[test]
    fn test_notices_cross_threads() {
        let (notifier, mut queue) = EventQueue::channel();

        let handle = std::thread::spawn(move || {
            notifier.notify(EventMask::NODE | EventMask::MODIFIED);
        });
        handle.join().expect("worker");

        let notices = queue.pump();
        assert_eq!(
            notices,
            vec![EngineNotice::Refresh(EventMask::NODE | EventMask::MODIFIED)]
        );
    }
}
