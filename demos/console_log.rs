use cdp_core::connection::Connection;
use cdp_core::error::CdpResult;
use cdp_core::protocol::NoParams;
use cdp_core::runtime::RemoteObject;
use serde_json::json;
use std::time::Duration;
use tokio_stream::StreamExt;
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

fn render(argument: &RemoteObject) -> String {
    argument
        .value
        .as_ref()
        .map(|value| value.to_string())
        .or_else(|| argument.description.clone())
        .unwrap_or_else(|| format!("<{}>", argument.r#type))
}

#[tokio::main]
async fn main() -> CdpResult<()> {
    fmt()
        .pretty()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let ws_url = cdp_core::discovery::page_endpoint("127.0.0.1:9222").await?;
    let client = Connection::connect(&ws_url).await?;

    let runtime = client.runtime();
    runtime.enable().await?;
    client.send_command("Page.enable", NoParams).await?;

    let mut console = runtime.console_api_called();
    tokio::spawn(async move {
        while let Some(entry) = console.next().await {
            let rendered: Vec<String> = entry.args.iter().map(render).collect();
            info!("🖥️ console.{}: {}", entry.r#type, rendered.join(" "));
        }
    });

    let mut exceptions = runtime.exception_thrown();
    tokio::spawn(async move {
        while let Some(thrown) = exceptions.next().await {
            info!("💥 Uncaught: {}", thrown.exception_details.description());
        }
    });

    let load = client.subscribe("Page.loadEventFired");
    let dom_ready = client.subscribe("Page.domContentEventFired");
    let mut lifecycle = StreamExt::merge(load, dom_ready);
    tokio::spawn(async move {
        while let Some(params) = lifecycle.next().await {
            debug!("📢 Page lifecycle: {}", params);
        }
    });

    client
        .send_command("Page.navigate", json!({"url": "https://www.rust-lang.org"}))
        .await?;
    runtime
        .evaluate("console.log('hello from cdp-core,', 1 + 1)")
        .await?;

    // Give the page a moment to emit its events before we drop the connection.
    tokio::time::sleep(Duration::from_secs(3)).await;

    Ok(())
}
