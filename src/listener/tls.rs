//! TLS material loading for `Tcps`/`Wss` listeners, grounded on hebo's TLS
//! listener setup (`hebo/src/listener/init.rs`): `rustls-pemfile` parses the
//! PEM files, `tokio-rustls` wraps the accepted socket.

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

use crate::error::{Error, ErrorKind};

/// # Errors
/// Returns an error if the certificate or key file is missing or malformed.
pub fn load_acceptor(cert_file: &str, key_file: &str) -> Result<TlsAcceptor, Error> {
    let certs = load_certs(cert_file)?;
    let key = load_key(key_file)?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|err| Error::new(ErrorKind::Config, format!("invalid TLS material: {err}")))?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>, Error> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| Error::new(ErrorKind::Config, format!("failed reading {path}: {err}")))
}

fn load_key(path: &str) -> Result<PrivateKeyDer<'static>, Error> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|err| Error::new(ErrorKind::Config, format!("failed reading {path}: {err}")))?
        .ok_or_else(|| Error::new(ErrorKind::Config, format!("no private key found in {path}")))
}
