use futures::StreamExt;
use rand::distr::Alphanumeric;
use rand::{thread_rng, Rng};
use ripple_ws::connect_async;
use tokio::select;
use tokio::time::{interval, Duration};

async fn handle_connection(addr: &str) {
    match connect_async(addr).await {
        Ok((mut reader, mut writer)) => {
            let mut ticker = interval(Duration::from_secs(5));
            let mut counter = 0;

            loop {
                select! {
                    Some(result) = reader.next() => {
                        match result {
                            Ok(message) => {
                                println!("Received message: {}", message.as_text().unwrap());
                                counter += 1;
                                if counter >= 3 {
                                    if writer.close_connection().await.is_err() {
                                        eprintln!("Error occurred when closing connection");
                                    }
                                    break;
                                }
                            }
                            Err(err) => {
                                eprintln!("Received error from the stream: {}", err);
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
        Err(err) => eprintln!("Error when performing handshake: {}", err),
    }
}

#[tokio::main]
async fn main() {
    handle_connection("ws://127.0.0.1:9002").await;
}

fn generate_random_string() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(30)
        .map(char::from)
        .collect()
}
