use crate::gateway::{RelayMode, RelayModeTracker};
use crate::relay_log::RelayLog;
use station_store::{Storage, SystemTimeProvider, TimeProvider};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::{rustls, TlsConnector};

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("CMS Gateway connection failed.")]
    ConnectFailed(#[source] std::io::Error),
    #[error("CMS Gateway error.")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Tls(#[from] rustls::Error),
}

/// Where to reach the CMS and whether to wrap the connection in TLS.
pub struct CmsTarget {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
}

impl Default for CmsTarget {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 8773,
            use_tls: true,
        }
    }
}

fn tls_connector() -> TlsConnector {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
}

/// Pipes bytes transparently between the radio-facing session and the CMS
/// socket, switching between line-oriented text relay and raw binary relay
/// as `FS ... Y` and `FF`/`FQ` lines are observed on either side.
///
/// `radio_in`/`radio_out` are the AX.25 session's byte stream; a real
/// caller wires these to the connection-oriented session layer rather than
/// a raw socket.
pub async fn run_relay<R, W>(
    target: &CmsTarget,
    our_base_callsign: &str,
    radio_in: &mut R,
    radio_out: &mut W,
    storage: &Storage,
) -> Result<(), RelayError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let log = RelayLog::<SystemTimeProvider>::load(SystemTimeProvider, storage).unwrap_or_else(|_| RelayLog::new());
    let log_index = log.record_connect(our_base_callsign);

    let tcp = TcpStream::connect((target.host.as_str(), target.port))
        .await
        .map_err(RelayError::ConnectFailed)?;

    let mut bytes_sent: u64 = 0;
    let mut bytes_received: u64 = 0;
    let mut mode = RelayModeTracker::new();
    let mut line_buf = Vec::new();

    if target.use_tls {
        let connector = tls_connector();
        let server_name = ServerName::try_from(target.host.clone()).map_err(|_| {
            RelayError::ConnectFailed(std::io::Error::new(std::io::ErrorKind::InvalidInput, "bad CMS hostname"))
        })?;
        let cms = connector.connect(server_name, tcp).await?;
        relay_loop(cms, radio_in, radio_out, &mut mode, &mut line_buf, &mut bytes_sent, &mut bytes_received).await?;
    } else {
        relay_loop(tcp, radio_in, radio_out, &mut mode, &mut line_buf, &mut bytes_sent, &mut bytes_received).await?;
    }

    let _ = log.record_disconnect(log_index, bytes_sent, bytes_received, storage);
    Ok(())
}

async fn relay_loop<C, R, W>(
    cms: C,
    radio_in: &mut R,
    radio_out: &mut W,
    mode: &mut RelayModeTracker,
    line_buf: &mut Vec<u8>,
    bytes_sent: &mut u64,
    bytes_received: &mut u64,
) -> Result<(), RelayError>
where
    C: AsyncRead + AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (mut cms_r, mut cms_w) = tokio::io::split(cms);
    let mut cms_buf = [0u8; 4096];
    let mut radio_buf = [0u8; 4096];
    loop {
        tokio::select! {
            read = cms_r.read(&mut cms_buf) => {
                let n = read?;
                if n == 0 {
                    return Ok(());
                }
                *bytes_received += n as u64;
                observe_for_mode_from_cms(mode, &cms_buf[..n], line_buf);
                radio_out.write_all(&cms_buf[..n]).await?;
            }
            read = radio_in.read(&mut radio_buf) => {
                let n = read?;
                if n == 0 {
                    return Ok(());
                }
                *bytes_sent += n as u64;
                observe_for_mode_from_radio(mode, &radio_buf[..n], line_buf);
                cms_w.write_all(&radio_buf[..n]).await?;
            }
        }
    }
}

fn observe_for_mode_from_radio(mode: &mut RelayModeTracker, chunk: &[u8], line_buf: &mut Vec<u8>) {
    if mode.mode() == RelayMode::Binary {
        for &b in chunk {
            if b == b'\r' || b == b'\n' {
                if let Ok(line) = std::str::from_utf8(line_buf) {
                    mode.observe_binary_line(line);
                }
                line_buf.clear();
            } else {
                line_buf.push(b);
            }
        }
        return;
    }
    line_buf.extend_from_slice(chunk);
    while let Some(pos) = line_buf.iter().position(|&b| b == b'\r') {
        let line: Vec<u8> = line_buf.drain(..=pos).collect();
        if let Ok(line) = std::str::from_utf8(&line) {
            mode.observe_line(line.trim_end_matches('\r'));
        }
    }
}

fn observe_for_mode_from_cms(mode: &mut RelayModeTracker, chunk: &[u8], line_buf: &mut Vec<u8>) {
    observe_for_mode_from_radio(mode, chunk, line_buf);
}
