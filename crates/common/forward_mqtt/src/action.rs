use crate::client::BusClient;
use crate::errors::MqttError;
use crate::messages::Message;
use crate::topics::TopicFilter;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::Notify;

/// How long `Action::perform` waits for the broker to acknowledge an action
/// before giving up.
pub const QUEUE_TIMEOUT: Duration = Duration::from_secs(10);

/// A single bus operation to run against a [`BusClient`].
#[derive(Debug, Clone)]
pub enum Action {
    Connect,
    Disconnect,
    Subscribe(TopicFilter),
    Unsubscribe(TopicFilter),
    Publish(Message),
}

impl Action {
    /// Relative scheduling priority. Not consulted by [`ActionQueue`] today — the
    /// queue is plain FIFO — but kept as the documented extension point for a
    /// priority queue, should forwarding ever need to reorder actions.
    pub const fn priority(&self) -> u8 {
        match self {
            Action::Connect | Action::Disconnect => 10,
            Action::Subscribe(_) | Action::Unsubscribe(_) => 5,
            Action::Publish(_) => 1,
        }
    }

    /// Run this action against `client`, installing a one-shot hook on the
    /// relevant event and awaiting it (bounded by `timeout`). The previously
    /// installed hook, if any, is restored once this action settles — an
    /// action never leaves a stray hook installed, matching the "single
    /// outstanding hook" contract of [`crate::channel::Hook`].
    pub async fn perform(&self, client: &BusClient, timeout: Duration) -> Result<(), MqttError> {
        match self {
            Action::Connect => {
                if client.is_connected() {
                    return Ok(());
                }
                let done = std::sync::Arc::new(Notify::new());
                let done_fired = done.clone();
                let hook = client.on_connect();
                let previous = hook.install(move |()| done_fired.notify_waiters());

                // `BusClient::new` already kicked off the connection attempt;
                // the event loop's background poll drives it to completion
                // once polled, which starts as soon as the client is built.
                let result = tokio::time::timeout(timeout, done.notified())
                    .await
                    .map_err(|_| MqttError::Timeout);
                hook.restore(previous);
                result
            }
            Action::Disconnect => {
                let done = std::sync::Arc::new(Notify::new());
                let done_fired = done.clone();
                let hook = client.on_disconnect();
                let previous = hook.install(move |()| done_fired.notify_waiters());

                client.disconnect().await?;
                let result = tokio::time::timeout(timeout, done.notified())
                    .await
                    .map_err(|_| MqttError::Timeout);
                hook.restore(previous);
                result
            }
            Action::Subscribe(filters) => {
                if filters.is_empty() {
                    return Ok(());
                }
                let done = std::sync::Arc::new(Notify::new());
                let done_fired = done.clone();
                let hook = client.on_subscribe();
                let previous = hook.install(move |_pkid| done_fired.notify_waiters());

                client.subscribe(filters).await?;
                let result = tokio::time::timeout(timeout, done.notified())
                    .await
                    .map_err(|_| MqttError::Timeout);
                hook.restore(previous);
                result
            }
            Action::Unsubscribe(filters) => {
                // rumqttc does not raise a distinguishable UnsubAck event through
                // its public `Event` type, so an unsubscribe is considered
                // complete once the request has been handed to the event loop.
                client.unsubscribe(filters).await
            }
            Action::Publish(message) => {
                let done = std::sync::Arc::new(Notify::new());
                let done_fired = done.clone();
                let hook = client.on_publish();
                let previous = hook.install(move |_pkid| done_fired.notify_waiters());

                client.publish(message).await?;
                let result = tokio::time::timeout(timeout, done.notified())
                    .await
                    .map_err(|_| MqttError::Timeout);
                hook.restore(previous);
                result
            }
        }
    }
}

/// An item placed on an [`ActionQueue`]: either a bus action to perform, or
/// one of the `Ready`/`NotReady` sentinels a [`crate::Action`] consumer uses
/// to mark that the forwarder side has (or has not) reached a ready state.
#[derive(Debug, Clone)]
pub enum QueueItem {
    Action(Action),
    Ready,
    NotReady,
}

/// A FIFO queue of actions to run in order against one [`BusClient`].
pub struct ActionQueue {
    sender: mpsc::UnboundedSender<QueueItem>,
}

pub struct ActionQueueReceiver {
    receiver: mpsc::UnboundedReceiver<QueueItem>,
}

impl ActionQueue {
    pub fn new() -> (ActionQueue, ActionQueueReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (ActionQueue { sender }, ActionQueueReceiver { receiver })
    }

    pub fn enqueue(&self, action: Action) {
        let _ = self.sender.send(QueueItem::Action(action));
    }

    pub fn mark_ready(&self) {
        let _ = self.sender.send(QueueItem::Ready);
    }

    pub fn mark_not_ready(&self) {
        let _ = self.sender.send(QueueItem::NotReady);
    }
}

impl Clone for ActionQueue {
    fn clone(&self) -> Self {
        ActionQueue {
            sender: self.sender.clone(),
        }
    }
}

impl ActionQueueReceiver {
    pub async fn recv(&mut self) -> Option<QueueItem> {
        self.receiver.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priorities_match_the_documented_values() {
        assert_eq!(Action::Connect.priority(), 10);
        assert_eq!(Action::Disconnect.priority(), 10);
        assert_eq!(
            Action::Subscribe(crate::topics::TopicFilter::empty()).priority(),
            5
        );
        assert_eq!(
            Action::Unsubscribe(crate::topics::TopicFilter::empty()).priority(),
            5
        );
        assert_eq!(
            Action::Publish(Message::new(crate::topics::Topic::new_unchecked("a"), vec![])).priority(),
            1
        );
    }

    #[test]
    fn connect_and_disconnect_outrank_publish() {
        assert!(Action::Connect.priority() > Action::Publish(Message::new(
            crate::topics::Topic::new_unchecked("a"),
            vec![],
        )).priority());
    }

    #[tokio::test]
    async fn queue_delivers_items_in_order() {
        let (queue, mut receiver) = ActionQueue::new();
        queue.enqueue(Action::Connect);
        queue.mark_ready();

        assert!(matches!(
            receiver.recv().await,
            Some(QueueItem::Action(Action::Connect))
        ));
        assert!(matches!(receiver.recv().await, Some(QueueItem::Ready)));
    }
}
