use futures::StreamExt;
use log::*;
use rand::distr::Alphanumeric;
use rand::{thread_rng, Rng};
use ripple_ws::config::{ClientConfig, TlsConfig};
use ripple_ws::connect_async_with_config;
use tokio::select;
use tokio::time::{interval, Duration};

async fn handle_connection(addr: &str) {
    let config = ClientConfig {
        tls: TlsConfig {
            ca_file: Some(String::from("ca.crt")),
        },
        ..Default::default()
    };

    match connect_async_with_config(addr, config).await {
        Ok((mut reader, mut writer)) => {
            let mut ticker = interval(Duration::from_secs(5));
            let mut counter = 0;

            loop {
                select! {
                    Some(result) = reader.next() => {
                        match result {
                            Ok(message) => {
                                info!("Received message: {}", message.as_text().unwrap());
                                counter += 1;
                                if counter >= 3 {
                                    if writer.close_connection().await.is_err() {
                                        error!("Error occurred when closing connection");
                                    }
                                    break;
                                }
                            }
                            Err(err) => {
                                error!("Received error from the stream: {}", err);
                                break;
                            }
                        }
                    }
                    _ = ticker.tick() => {
                        let random_string = generate_random_string();
                        if writer.send_as_text(random_string).await.is_err() {
                            eprintln!("Failed to send message");
                            break;
                        }
                    }
                }
            }
        }
        Err(err) => error!("Error when performing handshake: {}", err),
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    handle_connection("wss://localhost:9002").await;
}

fn generate_random_string() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(30)
        .map(char::from)
        .collect()
}
