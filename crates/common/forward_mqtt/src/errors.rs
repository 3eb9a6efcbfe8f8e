/// An MQTT related error
#[derive(thiserror::Error, Debug)]
pub enum MqttError {
    #[error("Invalid topic name: {name:?}")]
    InvalidTopic { name: String },

    #[error("Invalid topic filter: {pattern:?}")]
    InvalidFilter { pattern: String },

    #[error("MQTT client error: {0}")]
    ClientError(#[from] rumqttc::ClientError),

    #[error("MQTT connection error: {0}")]
    ConnectionError(#[from] rumqttc::ConnectionError),

    #[error("TLS configuration error: {0}")]
    TlsError(#[from] forward_certificate::CertificateError),

    #[error("Action timed out waiting for broker confirmation")]
    Timeout,

    #[error("The send channel of the connection has been closed and no more messages can be published")]
    SendOnClosedConnection,
}
