//! # search-gateway
//!
//! Google Custom Search exposed as a `search` tool over the Model Context
//! Protocol.
//!
//! The core is the [`Gateway`]: it validates a [`SearchRequest`], calls the
//! upstream API through one shared connection pool, retries transient
//! failures, filters results by an optional domain allowlist and returns a
//! [`SearchResult`] with contiguous ranks.
//!
//! - Bounded retries with `Retry-After` support and jittered backoff
//! - Distinct error kinds for bad input, upstream failures and network failures
//! - Transport-agnostic MCP handler with stdio, streamable HTTP and SSE servers
//!
//! ## Example
//!
//! ```rust,no_run
//! use search_gateway::{Gateway, SearchRequest, Settings};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load(None)?;
//!     let gateway = Gateway::new(settings)?;
//!
//!     let request = SearchRequest::new("rust programming").with_num(3);
//!     let result = gateway.search(request).await?;
//!
//!     for item in result.items() {
//!         println!("{}. {:?} {:?}", item.rank, item.title, item.url);
//!     }
//!
//!     gateway.shutdown().await;
//!     Ok(())
//! }
//! ```

mod error;
mod gateway;
mod request;
mod result;

pub mod allowlist;
pub mod config;
pub mod logging;
pub mod mcp;
pub mod retry;
pub mod serve;
pub mod tool;
pub mod trace;
pub mod transport;
pub mod upstream;

pub use allowlist::DomainAllowlist;
pub use config::Settings;
pub use error::{GatewayError, Result};
pub use gateway::Gateway;
pub use mcp::McpHandler;
pub use request::{SafeSearch, SearchRequest, SiteSearchFilter};
pub use result::{NormalizedItem, RawMeta, SearchResult, PROVIDER};
