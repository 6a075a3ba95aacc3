//! Shared infrastructure: HTTP client, URL helpers, filesystem helpers.

pub mod fs;
pub mod http_client;
pub mod url;

pub use http_client::HttpClient;
pub use url::UrlUtils;
