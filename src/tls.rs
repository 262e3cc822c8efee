use crate::config::TlsConfig;
use crate::error::Error;
use crate::stream::SocketFlowStream;
use pki_types::ServerName;
use rustls::{ClientConfig as RustlsClientConfig, RootCertStore};
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

/// Builds the rustls client configuration once per connection attempt: the
/// `webpki-roots` bundle, plus any extra CA certificate the caller configured.
fn build_rustls_config(tls_config: &TlsConfig) -> Result<Arc<RustlsClientConfig>, Error> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    if let Some(ca_file) = &tls_config.ca_file {
        let file = File::open(ca_file)?;
        let mut reader = BufReader::new(file);
        for cert in rustls_pemfile::certs(&mut reader) {
            let cert = cert?;
            roots.add(cert).map_err(|source| Error::SocketOverlayError { source })?;
        }
    }

    let config = RustlsClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(Arc::new(config))
}

/// Performs the TLS handshake over an already-established TCP socket,
/// verifying the peer certificate against `server_name`.
pub async fn overlay_tls(
    stream: TcpStream,
    server_name: &str,
    tls_config: &TlsConfig,
) -> Result<SocketFlowStream, Error> {
    let config = build_rustls_config(tls_config)?;
    let connector = TlsConnector::from(config);
    let name = ServerName::try_from(server_name.to_string())?;

    let tls_stream = connector
        .connect(name, stream)
        .await
        .map_err(|source| Error::SslHandshakeError(source.to_string()))?;

    Ok(SocketFlowStream::Secure(tls_stream))
}
