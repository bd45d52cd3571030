//! # cdp-core
//!
//! The correlation and event-routing core for Chrome DevTools Protocol clients.
//!
//! A single WebSocket carries every protocol domain at once: commands go out
//! with a connection-unique `id`, responses come back in whatever order the
//! browser answers, and unsolicited events are interleaved throughout.
//! [`connection::Connection`] untangles that multiplex: responses resolve
//! their caller by `id`, and events fan out to the subscribers of their
//! method name. A typed domain facade like [`runtime::Runtime`] is nothing
//! more than fixed method strings over the raw send/subscribe API.
//!
//! ## Examples
//! ### 1. Basic Navigation
//! Discover a page target, connect and navigate it.
//!
//! ```rust
//! use cdp_core::connection::Connection;
//! use cdp_core::error::CdpResult;
//! use cdp_core::protocol::NoParams;
//! use serde_json::json;
//!
//! # async fn doc_example() -> CdpResult<()> {
//! let ws_url = cdp_core::discovery::page_endpoint("127.0.0.1:9222").await?;
//! let client = Connection::connect(&ws_url).await?;
//! client.send_command("Page.enable", NoParams).await?;
//! client.send_command("Page.navigate", json!({"url": "https://www.rust-lang.org"})).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ### 2. Listening to Events
//! Subscribe to the event methods you care about and process them as streams.
//!
//! ```rust
//! use cdp_core::connection::Connection;
//! use cdp_core::error::CdpResult;
//! use cdp_core::protocol::NoParams;
//! use serde_json::json;
//! use tokio_stream::StreamExt;
//!
//! # async fn doc_example() -> CdpResult<()> {
//! let ws_url = cdp_core::discovery::page_endpoint("127.0.0.1:9222").await?;
//! let client = Connection::connect(&ws_url).await?;
//!
//! let load = client.subscribe("Page.loadEventFired");
//! let requests = client.subscribe("Network.requestWillBeSent");
//! let mut activity = StreamExt::merge(load, requests);
//! tokio::spawn(async move {
//!     while let Some(params) = activity.next().await {
//!         println!("📢 Activity: {}", params);
//!     }
//! });
//!
//! client.send_command("Page.enable", NoParams).await?;
//! client.send_command("Network.enable", NoParams).await?;
//! client.send_command("Page.navigate", json!({"url": "https://www.rust-lang.org"})).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ### 3. Evaluating JavaScript
//! The typed `Runtime` facade turns thrown exceptions into errors and console
//! output into a typed stream.
//!
//! ```rust
//! use cdp_core::connection::Connection;
//! use cdp_core::error::CdpResult;
//! use tokio_stream::StreamExt;
//!
//! # async fn doc_example() -> CdpResult<()> {
//! let client = Connection::connect("ws://127.0.0.1:9222/devtools/page/ABC123").await?;
//! let runtime = client.runtime();
//! runtime.enable().await?;
//!
//! let mut console = runtime.console_api_called();
//! tokio::spawn(async move {
//!     while let Some(entry) = console.next().await {
//!         println!("console.{}: {} argument(s)", entry.r#type, entry.args.len());
//!     }
//! });
//!
//! let title = runtime.evaluate("document.title").await?;
//! println!("title: {:?}", title.value);
//! # Ok(())
//! # }
//! ```

mod pending;

pub mod connection;
pub mod discovery;
pub mod error;
pub mod protocol;
pub mod router;
pub mod runtime;
pub mod transport;
