use forward_certificate::CertificateError;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

/// Credentials used to reach the loopback host bus.
#[derive(Debug, Clone)]
pub struct PasswordSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

/// Mutually-authenticated TLS credentials used to reach a subordinate bus.
///
/// The server name is not verified: certificates are pinned by CA, and peer
/// identity comes from the client certificate's subject, not the hostname.
#[derive(Debug, Clone)]
pub struct CertificateSettings {
    pub host: String,
    pub port: u16,
    pub ca_cert_path: PathBuf,
    pub client_cert_path: PathBuf,
    pub client_key_path: PathBuf,
}

/// The two credential modes a [`crate::BusClient`] can connect with.
#[derive(Debug, Clone)]
pub enum Settings {
    Password(PasswordSettings),
    Certificate(CertificateSettings),
}

impl Settings {
    pub fn host(&self) -> &str {
        match self {
            Settings::Password(s) => &s.host,
            Settings::Certificate(s) => &s.host,
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            Settings::Password(s) => s.port,
            Settings::Certificate(s) => s.port,
        }
    }
}

/// Configuration of a single [`crate::BusClient`] connection.
#[derive(Debug, Clone)]
pub struct Config {
    /// The client id / session name used on connect. A non-clean session is
    /// used so re-connects on the same id resume the prior subscription state.
    pub session_name: String,

    pub settings: Settings,

    /// Default: 30s.
    pub keepalive: Duration,

    /// Default: 10s.
    pub max_packet_size: usize,
}

impl Config {
    pub fn new(session_name: impl Into<String>, settings: Settings) -> Config {
        Config {
            session_name: session_name.into(),
            settings,
            keepalive: Duration::from_secs(30),
            max_packet_size: 1024 * 1024,
        }
    }

    pub fn with_keepalive(mut self, keepalive: Duration) -> Self {
        self.keepalive = keepalive;
        self
    }

    /// Wrap this config into the options `rumqttc` expects, loading TLS
    /// material from disk for the certificate variant.
    pub fn rumqttc_options(&self) -> Result<rumqttc::MqttOptions, CertificateError> {
        let mut options =
            rumqttc::MqttOptions::new(self.session_name.clone(), self.settings.host(), self.settings.port());
        options.set_clean_session(false);
        options.set_keep_alive(self.keepalive);
        options.set_max_packet_size(self.max_packet_size, self.max_packet_size);

        match &self.settings {
            Settings::Password(pw) => {
                options.set_credentials(pw.username.clone(), pw.password.clone());
            }
            Settings::Certificate(cert) => {
                let tls_config = insecure_client_config(
                    &cert.ca_cert_path,
                    &cert.client_cert_path,
                    &cert.client_key_path,
                )?;
                options.set_transport(rumqttc::Transport::tls_with_config(tls_config.into()));
            }
        }

        Ok(options)
    }
}

/// Build a rustls client config that verifies the broker's certificate against
/// the given CA, presents the given client identity, but does not check that
/// the broker's certificate subject matches the hostname we dialed — the peer
/// is pinned by CA, not by name.
fn insecure_client_config(
    ca_cert_path: &Path,
    client_cert_path: &Path,
    client_key_path: &Path,
) -> Result<rustls::ClientConfig, CertificateError> {
    let root_store = forward_certificate::root_store_from_file(ca_cert_path)?;
    let cert_chain = forward_certificate::read_cert_chain(client_cert_path)?;
    let key = forward_certificate::read_private_key(client_key_path)?;
    let verifier = forward_certificate::PinnedCaVerifier::new(root_store)?;

    let config = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(std::sync::Arc::new(verifier))
        .with_client_auth_cert(cert_chain, key)?;

    Ok(config)
}
