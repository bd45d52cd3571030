//! Target discovery over the browser's HTTP endpoint.
//!
//! Discovery is a plain HTTP concern and stays outside the connection: resolve
//! an endpoint here, then hand it to
//! [`Connection::connect`](crate::connection::Connection::connect).

use serde::Deserialize;
use tracing::debug;

use crate::error::{CdpError, CdpResult};

/// One debuggable target as reported by `/json/list`.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    #[serde(default)]
    pub id: String,
    pub title: String,
    pub r#type: String,
    pub url: String,
    /// Absent when another client is already attached.
    #[serde(default)]
    pub web_socket_debugger_url: Option<String>,
}

impl Target {
    /// True for page targets that currently expose a debugger socket.
    pub fn is_debuggable_page(&self) -> bool {
        self.r#type == "page"
            && self
                .web_socket_debugger_url
                .as_deref()
                .is_some_and(|url| !url.is_empty())
    }
}

/// Browser build information as reported by `/json/version`.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BrowserVersion {
    #[serde(rename = "Browser")]
    pub browser: String,
    #[serde(rename = "Protocol-Version")]
    pub protocol_version: String,
    #[serde(default)]
    pub web_socket_debugger_url: Option<String>,
}

/// Every target the endpoint currently exposes, in the browser's order.
pub async fn fetch_targets(host: &str) -> CdpResult<Vec<Target>> {
    let url = format!("http://{}/json/list", host);

    let targets: Vec<Target> = reqwest::get(&url).await?.json().await?;

    debug!("Discovered {} targets at {}", targets.len(), host);
    Ok(targets)
}

/// WebSocket URL of the first debuggable page target at `host`
/// (e.g. `"127.0.0.1:9222"`).
pub async fn page_endpoint(host: &str) -> CdpResult<String> {
    let targets = fetch_targets(host).await?;
    page_socket(targets, host)
}

fn page_socket(targets: Vec<Target>, host: &str) -> CdpResult<String> {
    let target = targets
        .into_iter()
        .find(Target::is_debuggable_page)
        .ok_or_else(|| CdpError::NoTarget(host.to_string()))?;

    debug!("Found target: {} - {}", target.title, target.url);

    target
        .web_socket_debugger_url
        .ok_or_else(|| CdpError::NoTarget(host.to_string()))
}

/// Browser build and protocol version from `/json/version`.
pub async fn fetch_version(host: &str) -> CdpResult<BrowserVersion> {
    let url = format!("http://{}/json/version", host);

    Ok(reqwest::get(&url).await?.json().await?)
}

/// WebSocket URL of the browser-level target. Browser-wide domains (`Target`,
/// `Browser`) are only served there, not on page sockets.
pub async fn browser_endpoint(host: &str) -> CdpResult<String> {
    let version = fetch_version(host).await?;
    version
        .web_socket_debugger_url
        .ok_or_else(|| CdpError::NoTarget(host.to_string()))
}
