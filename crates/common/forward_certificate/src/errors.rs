use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum CertificateError {
    #[error("I/O error for path {path:?}: {error}")]
    IoError {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error("No certificate found in {path:?}")]
    EmptyCertChain { path: PathBuf },

    #[error("No private key found in {path:?}")]
    MissingPrivateKey { path: PathBuf },

    #[error("Failed to parse certificate in {path:?}: {source}")]
    CertificateParseFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Root certificate store rejected a certificate from {path:?}")]
    RootStoreAdd { path: PathBuf },

    #[error("Invalid TLS configuration: {0}")]
    RustlsError(#[from] rustls::Error),
}
