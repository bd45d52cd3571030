use cdp_core::connection::Connection;
use cdp_core::error::CdpResult;
use cdp_core::protocol::NoParams;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Serialize)]
struct NavigateParams {
    url: String,
}

#[tokio::main]
async fn main() -> CdpResult<()> {
    fmt()
        .pretty()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let ws_url = cdp_core::discovery::page_endpoint("127.0.0.1:9222").await?;
    let client = Connection::connect(&ws_url).await?;
    info!("Connected to {}", ws_url);

    client.send_command("Page.enable", NoParams).await?;

    let params = NavigateParams {
        url: "https://www.rust-lang.org".to_string(),
    };
    let response = client.send_command("Page.navigate", params).await?;

    info!("Chrome replied: {:?}", response);

    Ok(())
}
