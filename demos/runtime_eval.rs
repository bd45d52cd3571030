use cdp_core::connection::{Connection, ConnectionConfig};
use cdp_core::error::{CdpError, CdpResult};
use cdp_core::protocol::NoParams;
use cdp_core::runtime::EvaluateParams;
use log::{info, warn};
use serde_json::json;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> CdpResult<()> {
    fmt()
        .pretty()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let ws_url = cdp_core::discovery::page_endpoint("127.0.0.1:9222").await?;
    let config = ConnectionConfig {
        command_timeout: Some(Duration::from_secs(5)),
    };
    let client = Connection::connect_with(&ws_url, config).await?;

    let runtime = client.runtime();
    runtime.enable().await?;
    client.send_command("Page.enable", NoParams).await?;
    client
        .send_command("Page.navigate", json!({"url": "https://www.rust-lang.org"}))
        .await?;

    let page_info = runtime
        .evaluate(
            EvaluateParams::new(
                "({
          title: document.title,
          url: location.href,
          h1: document.querySelector(\"h1\")?.innerText
        })",
            )
            .by_value(),
        )
        .await?;

    info!("Expression outcome: {:?}", page_info.value);

    let fetch_status = runtime
        .evaluate(
            EvaluateParams::new(
                "(async () => {
            const r = await fetch('/');
            return r.status;
        })()",
            )
            .by_value()
            .await_promise(),
        )
        .await?;

    info!("Expression promise outcome: {:?}", fetch_status.value);

    match runtime.evaluate("definitely_not_defined").await {
        Err(CdpError::JavaScript(details)) => {
            warn!("The page threw, as expected: {}", details.description());
        }
        other => info!("Unexpected outcome: {:?}", other),
    }

    Ok(())
}
