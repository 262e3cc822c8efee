use crate::config::{DualStackMode, WebSocketConfig};
use crate::error::Error;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::{lookup_host, TcpStream};
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

fn filter_addrs(addrs: Vec<SocketAddr>, mode: DualStackMode) -> Vec<SocketAddr> {
    match mode {
        DualStackMode::Both => addrs,
        DualStackMode::Ipv4Only => addrs.into_iter().filter(|a| a.is_ipv4()).collect(),
        DualStackMode::Ipv6Only => addrs.into_iter().filter(|a| a.is_ipv6()).collect(),
    }
}

struct Outcome {
    socket: Mutex<Option<TcpStream>>,
    first_error: Mutex<Option<String>>,
    done: AtomicBool,
}

impl Outcome {
    fn new() -> Self {
        Self {
            socket: Mutex::new(None),
            first_error: Mutex::new(None),
            done: AtomicBool::new(false),
        }
    }
}

/// RFC 6555 Happy-Eyeballs dialer: races a staggered-start connect attempt
/// against every candidate address and returns the socket for whichever one
/// wins first, cancelling the rest.
pub async fn connect(host: &str, port: u16, config: &WebSocketConfig) -> Result<TcpStream, Error> {
    let resolved: Vec<SocketAddr> = lookup_host((host, port))
        .await
        .map_err(|e| Error::SocketConnectError(e.to_string()))?
        .collect();
    let addrs = filter_addrs(resolved, config.dual_stack_mode);

    if addrs.is_empty() {
        return Err(Error::SocketConnectError(
            "No viable interface to connect".to_string(),
        ));
    }

    let outcome = Arc::new(Outcome::new());
    let cancel = CancellationToken::new();

    let mut racers = Vec::with_capacity(addrs.len());
    for (index, addr) in addrs.into_iter().enumerate() {
        let outcome = outcome.clone();
        let cancel = cancel.clone();
        let start_delay = config.fallback_delay * index as u32;
        let connect_timeout = config.connect_timeout;

        racers.push(tokio::spawn(async move {
            tokio::select! {
                _ = sleep(start_delay) => {}
                _ = cancel.cancelled() => return,
            }

            if outcome.done.load(Ordering::Acquire) {
                return;
            }

            let attempt = tokio::select! {
                result = timeout(connect_timeout, TcpStream::connect(addr)) => result,
                _ = cancel.cancelled() => return,
            };

            match attempt {
                Ok(Ok(stream)) => {
                    let already_done = outcome.done.swap(true, Ordering::AcqRel);
                    if already_done {
                        // Lost the race; drop our socket, swallow any close error.
                        drop(stream);
                    } else {
                        *outcome.socket.lock().await = Some(stream);
                        cancel.cancel();
                    }
                }
                Ok(Err(e)) => {
                    let mut first_error = outcome.first_error.lock().await;
                    if first_error.is_none() {
                        *first_error = Some(e.to_string());
                    }
                }
                Err(_elapsed) => {
                    let mut first_error = outcome.first_error.lock().await;
                    if first_error.is_none() {
                        *first_error = Some(format!("connect to {} timed out", addr));
                    }
                }
            }
        }));
    }

    for racer in racers {
        let _ = racer.await;
    }

    if let Some(socket) = outcome.socket.lock().await.take() {
        return Ok(socket);
    }

    let message = outcome
        .first_error
        .lock()
        .await
        .clone()
        .unwrap_or_else(|| "No viable interface to connect".to_string());
    Err(Error::SocketConnectError(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connects_to_a_single_listening_address() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let config = WebSocketConfig::default();
        let stream = connect("127.0.0.1", addr.port(), &config).await.unwrap();
        assert_eq!(stream.peer_addr().unwrap().port(), addr.port());
    }

    #[tokio::test]
    async fn errors_when_nothing_is_listening() {
        let config = WebSocketConfig {
            connect_timeout: std::time::Duration::from_millis(200),
            ..Default::default()
        };
        // Port 1 is a reserved, never-bound port on loopback.
        let result = connect("127.0.0.1", 1, &config).await;
        assert!(result.is_err());
    }
}
