//! Best-effort outbound delivery to one chat or to every subscriber.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{domain::ChatId, messaging::port::MessagingPort, store::SubscriberStore};

/// Result of a fan-out send.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub total: usize,
}

impl BroadcastReport {
    pub fn failed(&self) -> usize {
        self.total - self.delivered
    }
}

#[derive(Clone)]
pub struct Notifier {
    messenger: Arc<dyn MessagingPort>,
    subscribers: Arc<dyn SubscriberStore>,
}

impl Notifier {
    pub fn new(messenger: Arc<dyn MessagingPort>, subscribers: Arc<dyn SubscriberStore>) -> Self {
        Self {
            messenger,
            subscribers,
        }
    }

    pub fn messenger(&self) -> &Arc<dyn MessagingPort> {
        &self.messenger
    }

    /// Deliver `html` to a single chat. Failures are logged, never raised.
    pub async fn send_one(&self, chat_id: ChatId, html: &str) -> bool {
        match self.messenger.send_html(chat_id, html).await {
            Ok(_) => {
                debug!(chat_id = chat_id.0, "message delivered");
                true
            }
            Err(e) => {
                warn!(chat_id = chat_id.0, error = %e, "message delivery failed");
                false
            }
        }
    }

    /// Deliver `html` to every subscriber listed at the moment the broadcast starts.
    ///
    /// Sends are sequential; one unreachable recipient never aborts the batch.
    pub async fn broadcast(&self, html: &str) -> BroadcastReport {
        let recipients = match self.subscribers.list().await {
            Ok(list) => list,
            Err(e) => {
                warn!(error = %e, "broadcast skipped: cannot read subscribers");
                return BroadcastReport::default();
            }
        };

        let mut report = BroadcastReport {
            delivered: 0,
            total: recipients.len(),
        };
        for sub in &recipients {
            if self.send_one(sub.chat_id, html).await {
                report.delivered += 1;
            }
        }

        info!(
            delivered = report.delivered,
            failed = report.failed(),
            "broadcast finished"
        );
        report
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        domain::{MessageId, MessageRef},
        errors::Error,
        messaging::types::MessagingCapabilities,
        store::MemorySubscriberStore,
        Result,
    };
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Records every send; chats in `unreachable` fail with a transport error.
    #[derive(Default)]
    pub(crate) struct FakeMessenger {
        pub(crate) sends: Mutex<Vec<(ChatId, String)>>,
        pub(crate) unreachable: Mutex<HashSet<i64>>,
    }

    impl FakeMessenger {
        pub(crate) fn failing_for(ids: &[i64]) -> Self {
            Self {
                sends: Mutex::new(Vec::new()),
                unreachable: Mutex::new(ids.iter().copied().collect()),
            }
        }

        pub(crate) fn sent(&self) -> Vec<(ChatId, String)> {
            self.sends.lock().unwrap().clone()
        }

        pub(crate) fn sent_to(&self, chat_id: ChatId) -> Vec<String> {
            self.sent()
                .into_iter()
                .filter(|(c, _)| *c == chat_id)
                .map(|(_, m)| m)
                .collect()
        }
    }

    #[async_trait]
    impl MessagingPort for FakeMessenger {
        fn capabilities(&self) -> MessagingCapabilities {
            MessagingCapabilities {
                max_message_len: 4096,
            }
        }

        async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
            if self.unreachable.lock().unwrap().contains(&chat_id.0) {
                return Err(Error::Transport("chat not found".to_string()));
            }
            let mut sends = self.sends.lock().unwrap();
            sends.push((chat_id, html.to_string()));
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(sends.len() as i32),
            })
        }
    }

    async fn store_with(ids: &[i64]) -> Arc<MemorySubscriberStore> {
        let store = Arc::new(MemorySubscriberStore::new());
        for id in ids {
            store.add(ChatId(*id), "sub").await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn broadcast_counts_only_successful_sends() {
        let store = store_with(&[1, 2, 3, 4, 5]).await;
        let messenger = Arc::new(FakeMessenger::failing_for(&[2, 4]));
        let notifier = Notifier::new(messenger.clone(), store);

        let report = notifier.broadcast("x").await;
        assert_eq!(report, BroadcastReport { delivered: 3, total: 5 });
        assert_eq!(report.failed(), 2);
        assert_eq!(
            messenger.sent().iter().map(|(c, _)| c.0).collect::<Vec<_>>(),
            vec![1, 3, 5]
        );
    }

    #[tokio::test]
    async fn broadcast_with_every_send_failing_returns_zero() {
        let store = store_with(&[1, 2]).await;
        let messenger = Arc::new(FakeMessenger::failing_for(&[1, 2]));
        let notifier = Notifier::new(messenger, store);
        assert_eq!(notifier.broadcast("x").await.delivered, 0);
    }

    #[tokio::test]
    async fn send_one_reports_failure_without_raising() {
        let store = store_with(&[]).await;
        let messenger = Arc::new(FakeMessenger::failing_for(&[9]));
        let notifier = Notifier::new(messenger, store);
        assert!(!notifier.send_one(ChatId(9), "x").await);
        assert!(notifier.send_one(ChatId(10), "x").await);
    }
}
