#![no_main]

use futures::StreamExt;
use libfuzzer_sys::fuzz_target;
use ripple_ws::connect_async;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::runtime::Runtime;

const UUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

fn accept_value(key: &str) -> String {
    use base64::prelude::BASE64_STANDARD;
    use base64::Engine;
    use sha1::{Digest, Sha1};
    let mut sha1 = Sha1::new();
    sha1.update(key.as_bytes());
    sha1.update(UUID.as_bytes());
    BASE64_STANDARD.encode(sha1.finalize())
}

/// Fuzzes the client's frame reader: a local server performs a real opening
/// handshake, then sends `data` verbatim as the post-handshake frame stream.
/// The client must never panic, regardless of how malformed the bytes are -
/// decode failures should surface as `Err` on the reader stream.
fuzz_target!(|data: &[u8]| {
    let data = data.to_vec();
    let runtime = Runtime::new().unwrap();

    runtime.block_on(async move {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };

            let mut buf = vec![0u8; 4096];
            let mut filled = 0;
            loop {
                let n = match socket.read(&mut buf[filled..]).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => n,
                };
                filled += n;
                if buf[..filled].windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
                if filled == buf.len() {
                    buf.resize(buf.len() * 2, 0);
                }
            }

            let request = String::from_utf8_lossy(&buf[..filled]);
            let key = request
                .lines()
                .find_map(|line| line.strip_prefix("Sec-WebSocket-Key: "))
                .unwrap_or_default()
                .trim()
                .to_string();

            let response = format!(
                "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: {}\r\n\r\n",
                accept_value(&key)
            );
            if socket.write_all(response.as_bytes()).await.is_err() {
                return;
            }
            let _ = socket.write_all(&data).await;
            let _ = socket.shutdown().await;
        });

        if let Ok((mut reader, _writer)) = connect_async(&format!("ws://{}", addr)).await {
            while reader.next().await.is_some() {}
        }

        let _ = server.await;
    });
});
