use futures::stream::{self, Stream};
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use crate::models::message::Message;

const HUB_CAPACITY: usize = 256;

/// In-process fan-out of newly stored messages to open SSE streams.
#[derive(Debug, Clone)]
pub struct MessageHub {
    sender: broadcast::Sender<Message>,
}

impl Default for MessageHub {
    fn default() -> Self {
        Self::new(HUB_CAPACITY)
    }
}

impl MessageHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Returns how many streams received the message
    pub fn publish(&self, message: Message) -> usize {
        // No subscribers is not an error
        self.sender.send(message).unwrap_or(0)
    }

    /// Messages sent or received by `user_id` from now on.
    /// A lagging subscriber skips what it missed instead of closing.
    pub fn subscribe(&self, user_id: Uuid) -> impl Stream<Item = Message> {
        let receiver = self.sender.subscribe();

        stream::unfold(receiver, move |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(message) if message.involves(user_id) => return Some((message, receiver)),
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(user_id = %user_id, skipped, "Message stream lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use futures::StreamExt;

    fn message(sender_id: Uuid, receiver_id: Uuid, content: &str) -> Message {
        Message {
            id: Uuid::new_v4(),
            sender_id,
            receiver_id,
            content: content.to_string(),
            read_at: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_subscriber_only_sees_own_conversations() {
        let hub = MessageHub::default();
        let (alice, bob, carol) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let stream = hub.subscribe(alice);
        tokio::pin!(stream);

        hub.publish(message(bob, carol, "not for alice"));
        let to_alice = message(bob, alice, "hi alice");
        hub.publish(to_alice.clone());
        let from_alice = message(alice, carol, "hi carol");
        hub.publish(from_alice.clone());

        assert_eq!(stream.next().await, Some(to_alice));
        assert_eq!(stream.next().await, Some(from_alice));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let hub = MessageHub::default();

        assert_eq!(hub.publish(message(Uuid::new_v4(), Uuid::new_v4(), "hello")), 0);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_keeps_streaming() {
        let hub = MessageHub::new(2);
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        let stream = hub.subscribe(alice);
        tokio::pin!(stream);

        for i in 0..5 {
            hub.publish(message(bob, alice, &format!("msg {}", i)));
        }

        let first = stream.next().await.unwrap();
        assert_eq!(first.content, "msg 3");
    }
}
