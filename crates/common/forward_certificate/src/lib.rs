//! Loading of the CA and client identity material used to pin a TLS
//! connection to a subordinate bus by certificate rather than by hostname.
#![forbid(unsafe_code)]

mod errors;
mod insecure_verifier;

pub use errors::CertificateError;
pub use insecure_verifier::PinnedCaVerifier;

use rustls::pki_types::CertificateDer;
use rustls::pki_types::PrivateKeyDer;
use rustls::RootCertStore;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Read all certificates in `path` (PEM) into a fresh root store.
pub fn root_store_from_file(path: impl AsRef<Path>) -> Result<RootCertStore, CertificateError> {
    let path = path.as_ref();
    let mut store = RootCertStore::empty();
    for cert in read_cert_chain(path)? {
        store
            .add(cert)
            .map_err(|_| CertificateError::RootStoreAdd {
                path: path.to_owned(),
            })?;
    }
    Ok(store)
}

/// Read the certificate chain stored in `path` (PEM, one or more certificates).
pub fn read_cert_chain(
    path: impl AsRef<Path>,
) -> Result<Vec<CertificateDer<'static>>, CertificateError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|error| CertificateError::IoError {
        path: path.to_owned(),
        error,
    })?;
    let chain: Vec<_> = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<_, _>>()
        .map_err(|source| CertificateError::CertificateParseFailed {
            path: path.to_owned(),
            source,
        })?;
    if chain.is_empty() {
        return Err(CertificateError::EmptyCertChain {
            path: path.to_owned(),
        });
    }
    Ok(chain)
}

/// Read a single private key (PEM) from `path`.
pub fn read_private_key(path: impl AsRef<Path>) -> Result<PrivateKeyDer<'static>, CertificateError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|error| CertificateError::IoError {
        path: path.to_owned(),
        error,
    })?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .map_err(|source| CertificateError::CertificateParseFailed {
            path: path.to_owned(),
            source,
        })?
        .ok_or_else(|| CertificateError::MissingPrivateKey {
            path: path.to_owned(),
        })
}

/// Check that all three certificate-related files for a subordinate exist,
/// without parsing them. Used at configuration-load time so a subordinate
/// with missing files is skipped (rather than deferring the failure to
/// first connect).
pub fn paths_exist(paths: &[&Path]) -> Result<(), CertificateError> {
    for path in paths {
        if !path.is_file() {
            return Err(CertificateError::IoError {
                path: (*path).to_owned(),
                error: std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn self_signed_pair() -> (String, String) {
        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec!["example.invalid".into()]).unwrap();
        (cert.pem(), key_pair.serialize_pem())
    }

    #[test]
    fn reads_a_single_certificate() {
        let (cert_pem, _) = self_signed_pair();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(cert_pem.as_bytes()).unwrap();

        let chain = read_cert_chain(file.path()).unwrap();
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn reads_a_private_key() {
        let (_, key_pem) = self_signed_pair();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(key_pem.as_bytes()).unwrap();

        read_private_key(file.path()).unwrap();
    }

    #[test]
    fn empty_file_has_no_certificates() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            read_cert_chain(file.path()),
            Err(CertificateError::EmptyCertChain { .. })
        ));
    }

    #[test]
    fn missing_file_is_reported() {
        assert!(paths_exist(&[Path::new("/does/not/exist")]).is_err());
    }

    #[test]
    fn root_store_accepts_a_self_signed_ca() {
        let (cert_pem, _) = self_signed_pair();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(cert_pem.as_bytes()).unwrap();

        let store = root_store_from_file(file.path()).unwrap();
        assert_eq!(store.len(), 1);
    }
}
