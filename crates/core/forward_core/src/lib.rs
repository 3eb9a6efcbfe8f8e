//! The Forwarder/Supervisor/Configuration/Application stack: bridges a host
//! bus to one or more subordinate buses, reconnecting across discovered
//! endpoints as they come and go.

pub mod application;
pub mod configuration;
pub mod errors;
pub mod forwarder;
pub mod supervisor;
pub mod topics;

pub use application::Application;
pub use configuration::Configuration;
pub use configuration::ControllerId;
pub use configuration::Host;
pub use configuration::Subordinate;
pub use configuration::Subsubordinate;
pub use errors::ConfigError;
pub use forwarder::Forwarder;
pub use forwarder::ForwarderState;
pub use supervisor::Supervisor;
