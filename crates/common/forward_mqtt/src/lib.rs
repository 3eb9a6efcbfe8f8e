//! A single MQTT bus connection with hook-based notifications, and the
//! Action/queue abstraction used to drive one connection from a worker task.

mod action;
mod channel;
mod client;
mod config;
mod errors;
mod messages;
mod topics;

pub use action::Action;
pub use action::ActionQueue;
pub use action::ActionQueueReceiver;
pub use action::QueueItem;
pub use action::QUEUE_TIMEOUT;
pub use channel::Hook;
pub use client::BusClient;
pub use config::CertificateSettings;
pub use config::Config;
pub use config::PasswordSettings;
pub use config::Settings;
pub use errors::MqttError;
pub use messages::Message;
pub use topics::Topic;
pub use topics::TopicFilter;
