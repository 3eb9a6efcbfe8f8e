use crate::errors::ConfigError;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::debug;
use tracing::warn;

/// The 16-character hex identifier a foris-controller is addressed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControllerId(String);

impl FromStr for ControllerId {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.len() == 16 && value.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(ControllerId(value.to_ascii_uppercase()))
        } else {
            Err(ConfigError::InvalidControllerId {
                value: value.to_string(),
            })
        }
    }
}

impl std::fmt::Display for ControllerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl ControllerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The local controller this process bridges on behalf of.
#[derive(Debug, Clone)]
pub struct Host {
    pub controller_id: ControllerId,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl Host {
    pub fn client_settings(&self) -> forward_mqtt::Settings {
        forward_mqtt::Settings::Password(forward_mqtt::PasswordSettings {
            host: "127.0.0.1".to_string(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
        })
    }
}

/// A first-hop bus reached over mutually authenticated TLS.
#[derive(Debug, Clone)]
pub struct Subordinate {
    pub controller_id: ControllerId,
    pub address: Ipv4Addr,
    pub port: u16,
    pub enabled: bool,
    pub ca_cert_path: PathBuf,
    pub client_cert_path: PathBuf,
    pub client_key_path: PathBuf,
}

impl Subordinate {
    fn try_new(
        controller_id: ControllerId,
        address: Ipv4Addr,
        port: u16,
        enabled: bool,
        fosquitto_dir: &Path,
    ) -> Result<Subordinate, ConfigError> {
        let base = fosquitto_dir.join(controller_id.as_str());
        let ca_cert_path = base.join("ca.crt");
        let client_cert_path = base.join("token.crt");
        let client_key_path = base.join("token.key");

        forward_certificate::paths_exist(&[&ca_cert_path, &client_cert_path, &client_key_path]).map_err(
            |_| ConfigError::MissingCertificate {
                path: base.clone(),
            },
        )?;

        Ok(Subordinate {
            controller_id,
            address,
            port,
            enabled,
            ca_cert_path,
            client_cert_path,
            client_key_path,
        })
    }

    pub fn client_settings(&self) -> forward_mqtt::Settings {
        forward_mqtt::Settings::Certificate(forward_mqtt::CertificateSettings {
            host: self.address.to_string(),
            port: self.port,
            ca_cert_path: self.ca_cert_path.clone(),
            client_cert_path: self.client_cert_path.clone(),
            client_key_path: self.client_key_path.clone(),
        })
    }

    /// Rebuild this subordinate's settings against a newly discovered address,
    /// keeping its certificate material and enabled flag.
    pub fn clone_with_address(&self, address: Ipv4Addr, port: Option<u16>) -> Subordinate {
        Subordinate {
            address,
            port: port.unwrap_or(self.port),
            ..self.clone()
        }
    }
}

/// A second-hop bus, reachable only through a subordinate's own bridge.
#[derive(Debug, Clone)]
pub struct Subsubordinate {
    pub controller_id: ControllerId,
    pub via: ControllerId,
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    host: RawHost,
    #[serde(default, rename = "subordinate")]
    subordinates: Vec<RawSubordinate>,
    #[serde(default, rename = "subsubordinate")]
    subsubordinates: Vec<RawSubsubordinate>,
}

#[derive(Debug, Deserialize)]
struct RawHost {
    controller_id: String,
    port: u16,
    username: String,
    password: String,
}

fn default_subordinate_address() -> Ipv4Addr {
    // IANA-reserved "dummy" address, used when zeroconf hasn't resolved one yet.
    Ipv4Addr::new(192, 0, 0, 8)
}

fn default_subordinate_port() -> u16 {
    11884
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct RawSubordinate {
    controller_id: String,
    #[serde(default = "default_subordinate_address")]
    address: Ipv4Addr,
    #[serde(default = "default_subordinate_port")]
    port: u16,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

#[derive(Debug, Deserialize)]
struct RawSubsubordinate {
    controller_id: String,
    via: String,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

/// The full static configuration of this forwarder process: one host, and the
/// subordinates/subsubordinates it should bridge to.
///
/// Loaded once at startup from a TOML document (standing in for the opaque UCI
/// store a real foris-forwarder deployment reads from). The accessors return
/// owned copies, so callers can't mutate the loader's private state.
#[derive(Debug)]
pub struct Configuration {
    fosquitto_dir: PathBuf,
    host: Host,
    subordinates: HashMap<ControllerId, Subordinate>,
    subsubordinates: HashMap<ControllerId, Subsubordinate>,
}

impl Configuration {
    /// Build the host entry directly (it is not read from the TOML document;
    /// its credentials come from the CLI's `--passwd-file`) and load the
    /// subordinate/subsubordinate document from `config_path`.
    pub fn load(
        host: Host,
        config_path: &Path,
        fosquitto_dir: &Path,
    ) -> Result<Configuration, ConfigError> {
        let mut configuration = Configuration {
            fosquitto_dir: fosquitto_dir.to_owned(),
            host,
            subordinates: HashMap::new(),
            subsubordinates: HashMap::new(),
        };
        configuration.reload(config_path)?;
        Ok(configuration)
    }

    /// Re-read the subordinate/subsubordinate document from disk, replacing
    /// the current set. Exposed for completeness — the bundled [`crate::application::Application`]
    /// only calls this once, at startup.
    pub fn reload(&mut self, config_path: &Path) -> Result<(), ConfigError> {
        let text = std::fs::read_to_string(config_path)?;
        let document: RawDocument = toml::from_str(&text)?;

        let mut subordinates = HashMap::new();
        for raw in document.subordinates {
            let controller_id = match ControllerId::from_str(&raw.controller_id) {
                Ok(id) => id,
                Err(_) => {
                    warn!("Skipping subordinate with invalid controller id: {}", raw.controller_id);
                    continue;
                }
            };
            match Subordinate::try_new(
                controller_id.clone(),
                raw.address,
                raw.port,
                raw.enabled,
                &self.fosquitto_dir,
            ) {
                Ok(subordinate) => {
                    debug!("Loaded subordinate {controller_id}");
                    subordinates.insert(controller_id, subordinate);
                }
                Err(error) => warn!("Skipping subordinate {controller_id}: {error}"),
            }
        }

        let mut subsubordinates = HashMap::new();
        for raw in document.subsubordinates {
            let controller_id = match ControllerId::from_str(&raw.controller_id) {
                Ok(id) => id,
                Err(_) => {
                    warn!("Skipping subsubordinate with invalid controller id: {}", raw.controller_id);
                    continue;
                }
            };
            let via = match ControllerId::from_str(&raw.via) {
                Ok(id) => id,
                Err(_) => {
                    warn!("Skipping subsubordinate {controller_id}: invalid via id {}", raw.via);
                    continue;
                }
            };
            if !subordinates.contains_key(&via) {
                warn!("Skipping subsubordinate {controller_id}: via {via} is not a loaded subordinate");
                continue;
            }
            subsubordinates.insert(
                controller_id.clone(),
                Subsubordinate {
                    controller_id,
                    via,
                    enabled: raw.enabled,
                },
            );
        }

        self.subordinates = subordinates;
        self.subsubordinates = subsubordinates;
        Ok(())
    }

    pub fn host(&self) -> Host {
        self.host.clone()
    }

    pub fn subordinates(&self) -> HashMap<ControllerId, Subordinate> {
        self.subordinates.clone()
    }

    pub fn subsubordinates(&self) -> HashMap<ControllerId, Subsubordinate> {
        self.subsubordinates.clone()
    }
}
