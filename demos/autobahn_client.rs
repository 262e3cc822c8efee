use futures::StreamExt;
use log::*;
use ripple_ws::config::{ClientConfig, WebSocketConfig};
use ripple_ws::error::Error;
use ripple_ws::extensions::Extensions;
use ripple_ws::connect_async_with_config;

const AGENT: &str = "ripple-ws";

fn get_config() -> ClientConfig {
    let web_socket_config = WebSocketConfig {
        extensions: Some(Extensions {
            permessage_deflate: true,
            client_no_context_takeover: Some(true),
            server_no_context_takeover: Some(true),
            client_max_window_bits: None,
            server_max_window_bits: None,
        }),
        ..Default::default()
    };
    ClientConfig {
        web_socket_config,
        ..Default::default()
    }
}

async fn run_test(case: u32) -> Result<(), Error> {
    let config = get_config();

    info!("Running test case {}", case);
    let case_url = &format!("ws://127.0.0.1:9001/runCase?case={}&agent={}", case, AGENT);
    let (mut reader, mut writer) = connect_async_with_config(case_url, config).await?;
    while let Some(msg) = reader.next().await {
        let msg = msg?;
        writer.send_message(msg).await?;
    }

    Ok(())
}

async fn update_reports() -> Result<(), Error> {
    let config = get_config();

    info!("updating reports");
    let (_reader, mut writer) = connect_async_with_config(
        &format!("ws://127.0.0.1:9001/updateReports?agent={}", AGENT),
        config,
    )
    .await?;
    info!("closing connection");
    writer.close_connection().await?;
    Ok(())
}

async fn get_case_count() -> Result<u32, Error> {
    let config = get_config();

    let (mut reader, mut writer) =
        connect_async_with_config("ws://localhost:9001/getCaseCount", config).await?;

    let msg = reader.next().await.unwrap()?;
    writer.close_connection().await?;

    let text_message = msg.as_text()?;
    Ok(text_message
        .parse::<u32>()
        .expect("couldn't convert test case to number"))
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let total = get_case_count().await.expect("Error getting case count");

    for case in 1..=total {
        if let Err(e) = run_test(case).await {
            error!("Testcase {} failed: {}", case, e)
        }
    }

    update_reports().await.expect("Error updating reports");
}
