use crate::configuration::Host;
use crate::configuration::Subordinate;
use crate::configuration::Subsubordinate;
use crate::topics;
use forward_mqtt::Action;
use forward_mqtt::ActionQueue;
use forward_mqtt::ActionQueueReceiver;
use forward_mqtt::BusClient;
use forward_mqtt::Message;
use forward_mqtt::MqttError;
use forward_mqtt::QueueItem;
use forward_mqtt::QUEUE_TIMEOUT;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use tracing::warn;

/// How often `wait_for_ready`/`wait_for_disconnected` and the reload
/// disconnect-drain poll re-check their condition.
pub const SLEEP_STEP: Duration = Duration::from_millis(200);

/// Coarse observability state of a [`Forwarder`]; does not gate behavior
/// beyond the ready flags already tracked by the side workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwarderState {
    Initialized,
    Starting,
    Running,
    Degraded,
    Stopping,
}

struct Side {
    client: Arc<BusClient>,
    queue: ActionQueue,
    ready: Arc<AtomicBool>,
}

/// Bridges a host bus to a single subordinate bus: relays messages matching
/// the subscribed topic filters in both directions, unchanged.
pub struct Forwarder {
    host: Side,
    subordinate: Side,
    subsubordinates: Vec<Subsubordinate>,
}

impl Forwarder {
    /// Build the two clients, install the cross-forwarding message hooks, and
    /// enqueue the initial Connect/Subscribe/Ready sequence on both sides.
    /// Does not itself spawn the consumer workers; call [`Forwarder::start`].
    pub fn new(
        host: &Host,
        subordinate: &Subordinate,
        subsubordinates: Vec<Subsubordinate>,
    ) -> Result<(Forwarder, ActionQueueReceiver, ActionQueueReceiver), MqttError> {
        let host_client = Arc::new(BusClient::new(&forward_mqtt::Config::new(
            host.controller_id.to_string(),
            host.client_settings(),
        ))?);
        let subordinate_client = Arc::new(BusClient::new(&forward_mqtt::Config::new(
            subordinate.controller_id.to_string(),
            subordinate.client_settings(),
        ))?);

        let (host_queue, host_receiver) = ActionQueue::new();
        let (subordinate_queue, subordinate_receiver) = ActionQueue::new();

        Forwarder::wire_message_hooks(&host_client, &subordinate_client, &host_queue, &subordinate_queue);

        let host_side = Side {
            client: host_client,
            queue: host_queue,
            ready: Arc::new(AtomicBool::new(false)),
        };
        let subordinate_side = Side {
            client: subordinate_client,
            queue: subordinate_queue,
            ready: Arc::new(AtomicBool::new(false)),
        };

        Forwarder::enqueue_startup(&host_side.queue, &host.controller_id, &subsubordinates, false);
        Forwarder::enqueue_startup(
            &subordinate_side.queue,
            &subordinate.controller_id,
            &subsubordinates,
            true,
        );

        let forwarder = Forwarder {
            host: host_side,
            subordinate: subordinate_side,
            subsubordinates,
        };

        Ok((forwarder, host_receiver, subordinate_receiver))
    }

    fn wire_message_hooks(
        host_client: &Arc<BusClient>,
        subordinate_client: &Arc<BusClient>,
        host_queue: &ActionQueue,
        subordinate_queue: &ActionQueue,
    ) {
        let to_subordinate = subordinate_queue.clone();
        host_client.on_message().install(move |message: Message| {
            debug!("Message from host to subordinate (len={})", message.payload.len());
            to_subordinate.enqueue(Action::Publish(message));
        });

        let to_host = host_queue.clone();
        subordinate_client.on_message().install(move |message: Message| {
            debug!("Message from subordinate to host (len={})", message.payload.len());
            to_host.enqueue(Action::Publish(message));
        });
    }

    fn enqueue_startup(
        queue: &ActionQueue,
        controller_id: &crate::configuration::ControllerId,
        subsubordinates: &[Subsubordinate],
        is_subordinate_side: bool,
    ) {
        queue.enqueue(Action::Connect);

        let mut filters = if is_subordinate_side {
            topics::subordinate_side_filters(controller_id)
        } else {
            topics::host_side_filters(controller_id)
        };
        queue.enqueue(Action::Subscribe(filters.clone()));

        for subsubordinate in subsubordinates {
            let sub_filters = if is_subordinate_side {
                topics::subordinate_side_filters(&subsubordinate.controller_id)
            } else {
                topics::host_side_filters(&subsubordinate.controller_id)
            };
            filters.add_all(sub_filters.clone());
            queue.enqueue(Action::Subscribe(sub_filters));
        }

        queue.mark_ready();
    }

    /// Spawn the two consumer workers draining each side's queue.
    pub fn start(
        &self,
        host_receiver: ActionQueueReceiver,
        subordinate_receiver: ActionQueueReceiver,
    ) {
        tokio::spawn(Forwarder::run_side(
            self.host.client.clone(),
            host_receiver,
            self.host.ready.clone(),
        ));
        tokio::spawn(Forwarder::run_side(
            self.subordinate.client.clone(),
            subordinate_receiver,
            self.subordinate.ready.clone(),
        ));
    }

    async fn run_side(client: Arc<BusClient>, mut receiver: ActionQueueReceiver, ready: Arc<AtomicBool>) {
        while let Some(item) = receiver.recv().await {
            match item {
                QueueItem::Action(action) => {
                    if let Err(error) = action.perform(&client, QUEUE_TIMEOUT).await {
                        warn!("Action {action:?} failed: {error}");
                    }
                }
                QueueItem::Ready => ready.store(true, Ordering::SeqCst),
                QueueItem::NotReady => {
                    ready.store(false, Ordering::SeqCst);
                    break;
                }
            }
        }
    }

    pub fn subordinate_connected(&self) -> bool {
        self.subordinate.client.is_connected()
    }

    pub fn is_ready(&self) -> bool {
        self.host.ready.load(Ordering::SeqCst) && self.subordinate.ready.load(Ordering::SeqCst)
    }

    /// A coarse state for logging/health reporting; derived from the ready
    /// flags and connection state rather than tracked independently.
    pub fn state(&self) -> ForwarderState {
        let host_ready = self.host.ready.load(Ordering::SeqCst);
        let subordinate_ready = self.subordinate.ready.load(Ordering::SeqCst);

        if !host_ready && !subordinate_ready {
            return ForwarderState::Starting;
        }
        if host_ready
            && subordinate_ready
            && self.host.client.is_connected()
            && self.subordinate.client.is_connected()
        {
            return ForwarderState::Running;
        }
        if host_ready || subordinate_ready {
            return ForwarderState::Degraded;
        }
        ForwarderState::Initialized
    }

    pub async fn wait_for_ready(&self, timeout: Duration) -> bool {
        Forwarder::poll_until(timeout, || self.is_ready()).await
    }

    pub async fn wait_for_disconnected(&self, timeout: Duration) -> bool {
        Forwarder::poll_until(timeout, || !self.subordinate.client.is_connected()).await
    }

    async fn poll_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if condition() {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(SLEEP_STEP).await;
        }
    }

    /// Tear down the current subordinate client and bring up a fresh one
    /// against `new_subordinate`'s settings, re-subscribing exactly as at
    /// startup. The host side is untouched.
    pub async fn reload_subordinate(&mut self, new_subordinate: &Subordinate) -> Result<(), MqttError> {
        self.subordinate.queue.enqueue(Action::Disconnect);
        self.wait_for_disconnected(QUEUE_TIMEOUT).await;

        // Drain whatever is still queued behind the disconnect: the side
        // worker has already exited (it breaks on NotReady, but disconnect
        // doesn't emit one) so this queue is now abandoned. We simply
        // construct a fresh queue/client pair below, matching the source's
        // "drain and rebuild" reload.
        self.subordinate.queue.mark_not_ready();

        let new_client = Arc::new(BusClient::new(&forward_mqtt::Config::new(
            new_subordinate.controller_id.to_string(),
            new_subordinate.client_settings(),
        ))?);
        let (new_queue, new_receiver) = ActionQueue::new();

        let to_host = self.host.queue.clone();
        new_client.on_message().install(move |message: Message| {
            debug!("Message from subordinate to host (len={})", message.payload.len());
            to_host.enqueue(Action::Publish(message));
        });

        // The host side's own on_message hook was installed once in
        // wire_message_hooks and captured the *old* subordinate queue, whose
        // receiver has since been dropped along with the worker it drove.
        // Reinstall it so host-to-subordinate messages reach the new queue.
        let to_subordinate = new_queue.clone();
        self.host.client.on_message().install(move |message: Message| {
            debug!("Message from host to subordinate (len={})", message.payload.len());
            to_subordinate.enqueue(Action::Publish(message));
        });

        Forwarder::enqueue_startup(
            &new_queue,
            &new_subordinate.controller_id,
            &self.subsubordinates,
            true,
        );

        let ready = Arc::new(AtomicBool::new(false));
        tokio::spawn(Forwarder::run_side(new_client.clone(), new_receiver, ready.clone()));

        self.subordinate = Side {
            client: new_client,
            queue: new_queue,
            ready,
        };

        Ok(())
    }

    /// Disconnect both sides and signal their workers to exit.
    pub fn stop(&self) {
        self.host.queue.enqueue(Action::Disconnect);
        self.host.queue.mark_not_ready();
        self.subordinate.queue.enqueue(Action::Disconnect);
        self.subordinate.queue.mark_not_ready();
    }
}
