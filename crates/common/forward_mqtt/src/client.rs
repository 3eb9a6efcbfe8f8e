use crate::channel::Hook;
use crate::config::Config;
use crate::errors::MqttError;
use crate::messages::Message;
use crate::topics::Topic;
use crate::topics::TopicFilter;
use rumqttc::AsyncClient;
use rumqttc::Event;
use rumqttc::EventLoop;
use rumqttc::Packet;
use rumqttc::QoS;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// A connection to one MQTT broker.
///
/// Wraps a single `rumqttc::AsyncClient` / `EventLoop` pair. A background task
/// polls the event loop and dispatches connect/disconnect/subscribe/publish/message
/// notifications to single-slot hooks, which a [`crate::Action`] installs one-shot
/// to observe the outcome of the operation it is performing.
pub struct BusClient {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    notify_connected: Arc<Notify>,
    on_connect: Hook<()>,
    on_disconnect: Hook<()>,
    on_subscribe: Hook<u16>,
    on_publish: Hook<u16>,
    on_message: Hook<Message>,
}

impl BusClient {
    /// Build a client and start polling its event loop in the background.
    /// The connection attempt itself happens asynchronously; use
    /// [`BusClient::wait_until_connected`] to await its outcome.
    pub fn new(config: &Config) -> Result<BusClient, MqttError> {
        let options = config.rumqttc_options()?;
        let (client, event_loop) = AsyncClient::new(options, 64);

        let bus = BusClient {
            client,
            connected: Arc::new(AtomicBool::new(false)),
            notify_connected: Arc::new(Notify::new()),
            on_connect: Hook::new(),
            on_disconnect: Hook::new(),
            on_subscribe: Hook::new(),
            on_publish: Hook::new(),
            on_message: Hook::new(),
        };

        tokio::spawn(BusClient::poll_loop(
            event_loop,
            bus.connected.clone(),
            bus.notify_connected.clone(),
            bus.on_connect.clone(),
            bus.on_disconnect.clone(),
            bus.on_subscribe.clone(),
            bus.on_publish.clone(),
            bus.on_message.clone(),
        ));

        Ok(bus)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Await the next ConnAck, or `Ok(())` immediately if already connected.
    pub async fn wait_until_connected(&self, timeout: Duration) -> Result<(), MqttError> {
        if self.is_connected() {
            return Ok(());
        }
        tokio::time::timeout(timeout, self.notify_connected.notified())
            .await
            .map_err(|_| MqttError::Timeout)
    }

    pub fn on_connect(&self) -> &Hook<()> {
        &self.on_connect
    }

    pub fn on_disconnect(&self) -> &Hook<()> {
        &self.on_disconnect
    }

    pub fn on_subscribe(&self) -> &Hook<u16> {
        &self.on_subscribe
    }

    pub fn on_publish(&self) -> &Hook<u16> {
        &self.on_publish
    }

    pub fn on_message(&self) -> &Hook<Message> {
        &self.on_message
    }

    pub async fn disconnect(&self) -> Result<(), MqttError> {
        self.client.disconnect().await?;
        Ok(())
    }

    pub async fn subscribe(&self, filters: &TopicFilter) -> Result<(), MqttError> {
        if filters.is_empty() {
            return Ok(());
        }
        self.client
            .subscribe_many(filters.as_subscribe_filters(QoS::AtMostOnce))
            .await?;
        Ok(())
    }

    pub async fn unsubscribe(&self, filters: &TopicFilter) -> Result<(), MqttError> {
        for pattern in filters.patterns() {
            self.client.unsubscribe(pattern.clone()).await?;
        }
        Ok(())
    }

    pub async fn publish(&self, message: &Message) -> Result<(), MqttError> {
        self.client
            .publish(
                message.topic.name.clone(),
                message.qos,
                message.retain,
                message.payload.clone(),
            )
            .await?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn poll_loop(
        mut event_loop: EventLoop,
        connected: Arc<AtomicBool>,
        notify_connected: Arc<Notify>,
        on_connect: Hook<()>,
        on_disconnect: Hook<()>,
        on_subscribe: Hook<u16>,
        on_publish: Hook<u16>,
        on_message: Hook<Message>,
    ) {
        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code == rumqttc::ConnectReturnCode::Success {
                        info!("MQTT connection established");
                        connected.store(true, Ordering::SeqCst);
                        notify_connected.notify_waiters();
                        on_connect.fire(());
                    } else {
                        warn!("MQTT broker refused connection: {:?}", ack.code);
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    debug!("MQTT subscribe acknowledged: pkid={}", ack.pkid);
                    on_subscribe.fire(ack.pkid);
                }
                Ok(Event::Incoming(Packet::PubAck(ack))) => {
                    on_publish.fire(ack.pkid);
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    log::trace!("MQTT message received on {}", publish.topic);
                    on_message.fire(Message::from(publish));
                }
                Ok(Event::Incoming(Packet::Disconnect)) | Ok(Event::Outgoing(rumqttc::Outgoing::Disconnect)) => {
                    connected.store(false, Ordering::SeqCst);
                    on_disconnect.fire(());
                }
                Ok(_) => (),
                Err(error) => {
                    warn!("MQTT connection error: {error}");
                    connected.store(false, Ordering::SeqCst);
                    on_disconnect.fire(());
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
            }
        }
    }
}

/// Not part of the public contract; exposed for tests that need to build a
/// topic from a `&str` without going through `Config`.
#[cfg(test)]
pub(crate) fn topic(name: &str) -> Topic {
    Topic::new_unchecked(name)
}
