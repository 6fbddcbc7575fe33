//! Bounded per-agent mailboxes.
//!
//! Each mailbox is a tokio `mpsc` channel. The orchestrator owns the only
//! [`mpsc::Sender`], so dropping the mailbox closes the channel: consumers
//! drain whatever was already queued and then see `None`.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use super::types::Message;

/// Orchestrator-side half of a mailbox.
pub(crate) struct Mailbox {
    tx: mpsc::Sender<Message>,
    rx: MailboxReceiver,
}

impl Mailbox {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: MailboxReceiver {
                inner: Arc::new(Mutex::new(rx)),
            },
        }
    }

    /// Non-blocking enqueue. Never waits for space.
    pub(crate) fn try_deliver(
        &self,
        message: Message,
    ) -> Result<(), mpsc::error::TrySendError<Message>> {
        self.tx.try_send(message)
    }

    pub(crate) fn receiver(&self) -> MailboxReceiver {
        self.rx.clone()
    }
}

/// Consumer handle for one agent's mailbox.
///
/// Cheap to clone; all clones read from the same queue, so each message is
/// received exactly once.
#[derive(Clone)]
pub struct MailboxReceiver {
    inner: Arc<Mutex<mpsc::Receiver<Message>>>,
}

impl MailboxReceiver {
    /// Wait for the next message. Returns `None` once the mailbox has been
    /// closed and drained.
    pub async fn recv(&self) -> Option<Message> {
        self.inner.lock().await.recv().await
    }

    /// Take a queued message without waiting. `None` when empty, closed, or
    /// another clone is currently receiving.
    pub fn try_recv(&self) -> Option<Message> {
        let mut rx = self.inner.try_lock().ok()?;
        rx.try_recv().ok()
    }

    /// Number of messages currently queued.
    pub fn len(&self) -> usize {
        self.inner.try_lock().map(|rx| rx.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AttrValue;
    use crate::orchestration::types::MessageType;
    use tokio::sync::mpsc::error::TrySendError;

    fn msg(n: i64) -> Message {
        let mut payload = crate::agent::Attributes::new();
        payload.insert("n".into(), AttrValue::Integer(n));
        Message::new("a", "b", MessageType::Query, payload)
    }

    #[tokio::test]
    async fn preserves_send_order() {
        let mailbox = Mailbox::new(10);
        for n in 0..5 {
            mailbox.try_deliver(msg(n)).unwrap();
        }
        let rx = mailbox.receiver();
        for n in 0..5 {
            let got = rx.recv().await.unwrap();
            assert_eq!(got.payload["n"], AttrValue::Integer(n));
        }
    }

    #[test]
    fn full_mailbox_rejects_without_blocking() {
        let mailbox = Mailbox::new(2);
        mailbox.try_deliver(msg(1)).unwrap();
        mailbox.try_deliver(msg(2)).unwrap();
        assert!(matches!(mailbox.try_deliver(msg(3)), Err(TrySendError::Full(_))));
        assert_eq!(mailbox.receiver().len(), 2);
    }

    #[tokio::test]
    async fn dropping_mailbox_closes_after_drain() {
        let mailbox = Mailbox::new(4);
        mailbox.try_deliver(msg(1)).unwrap();
        let rx = mailbox.receiver();
        drop(mailbox);

        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_none());
    }
}
