//! Live query delivery.

use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};

use super::{Document, Query, StoreError, StoreResult};

/// Receiving end of a live query.
///
/// Deliveries are full result sets in query order. An `Err` delivery
/// ends the stream; nothing further is received after it.
pub struct Subscription {
    rx: Receiver<StoreResult<Vec<Document>>>,
    /// Error held back by [`Subscription::latest`] behind a snapshot.
    deferred: Option<StoreError>,
    closed: bool,
}

impl Subscription {
    pub(crate) fn new(rx: Receiver<StoreResult<Vec<Document>>>) -> Self {
        Self {
            rx,
            deferred: None,
            closed: false,
        }
    }

    /// Take the next pending delivery, if any (non-blocking).
    pub fn try_next(&mut self) -> Option<StoreResult<Vec<Document>>> {
        if let Some(e) = self.deferred.take() {
            return Some(Err(e));
        }
        if self.closed {
            return None;
        }
        match self.rx.try_recv() {
            Ok(Ok(docs)) => Some(Ok(docs)),
            Ok(Err(e)) => {
                self.closed = true;
                Some(Err(e))
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.closed = true;
                Some(Err(StoreError::Closed))
            }
        }
    }

    /// Drain pending deliveries and keep only the newest snapshot.
    ///
    /// A snapshot queued before an error is returned first; the error
    /// follows on the next call.
    pub fn latest(&mut self) -> Option<StoreResult<Vec<Document>>> {
        let mut newest = None;
        while let Some(delivery) = self.try_next() {
            match (delivery, newest.is_some()) {
                (Ok(docs), _) => newest = Some(Ok(docs)),
                (Err(e), true) => {
                    self.deferred = Some(e);
                    break;
                }
                (Err(e), false) => return Some(Err(e)),
            }
        }
        newest
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Sending end held by a store backend.
pub(crate) struct Subscriber {
    pub(crate) collection: String,
    pub(crate) query: Query,
    tx: Sender<StoreResult<Vec<Document>>>,
    last: Option<Vec<Document>>,
}

impl Subscriber {
    pub(crate) fn open(collection: &str, query: Query) -> (Self, Subscription) {
        let (tx, rx) = channel();
        let subscriber = Self {
            collection: collection.to_string(),
            query,
            tx,
            last: None,
        };
        (subscriber, Subscription::new(rx))
    }

    /// Push a result set if it differs from the last one delivered.
    /// Returns false once the receiving side is gone.
    pub(crate) fn deliver(&mut self, docs: Vec<Document>) -> bool {
        if self.last.as_ref() == Some(&docs) {
            return true;
        }
        self.last = Some(docs.clone());
        self.tx.send(Ok(docs)).is_ok()
    }

    pub(crate) fn fail(&self, error: StoreError) {
        let _ = self.tx.send(Err(error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Fields;

    #[test]
    fn test_duplicate_results_not_redelivered() {
        let (mut subscriber, mut subscription) = Subscriber::open("c", Query::new());
        let docs = vec![Document::new("a", Fields::new())];

        assert!(subscriber.deliver(docs.clone()));
        assert!(subscriber.deliver(docs));

        assert!(subscription.try_next().is_some());
        assert!(subscription.try_next().is_none());
    }

    #[test]
    fn test_latest_keeps_newest() {
        let (mut subscriber, mut subscription) = Subscriber::open("c", Query::new());
        subscriber.deliver(vec![]);
        subscriber.deliver(vec![Document::new("a", Fields::new())]);

        let latest = subscription.latest().unwrap().unwrap();
        assert_eq!(latest.len(), 1);
    }

    #[test]
    fn test_error_closes_stream() {
        let (mut subscriber, mut subscription) = Subscriber::open("c", Query::new());
        subscriber.fail(StoreError::PermissionDenied("revoked".to_string()));
        subscriber.deliver(vec![Document::new("a", Fields::new())]);

        assert!(matches!(subscription.latest(), Some(Err(StoreError::PermissionDenied(_)))));
        assert!(subscription.is_closed());
        assert!(subscription.try_next().is_none());
    }

    #[test]
    fn test_snapshot_before_error_is_kept() {
        let (mut subscriber, mut subscription) = Subscriber::open("c", Query::new());
        subscriber.deliver(vec![Document::new("a", Fields::new())]);
        subscriber.fail(StoreError::PermissionDenied("revoked".to_string()));

        assert_eq!(subscription.latest().unwrap().unwrap().len(), 1);
        assert!(matches!(subscription.latest(), Some(Err(StoreError::PermissionDenied(_)))));
        assert!(subscription.is_closed());
        assert!(subscription.latest().is_none());
    }

    #[test]
    fn test_dropped_sender_reports_closed() {
        let (subscriber, mut subscription) = Subscriber::open("c", Query::new());
        drop(subscriber);
        assert!(matches!(subscription.try_next(), Some(Err(StoreError::Closed))));
        assert!(subscription.is_closed());
    }

    #[test]
    fn test_deliver_after_receiver_dropped() {
        let (mut subscriber, subscription) = Subscriber::open("c", Query::new());
        drop(subscription);
        assert!(!subscriber.deliver(vec![]));
    }
}
