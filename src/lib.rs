//! IPTV playlist curation: parse channel lists in two grammars, merge them
//! with global URL de-duplication, probe every candidate stream under
//! host-aware bounded parallelism, and emit a single curated playlist.

pub mod config;
pub mod errors;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod probe;
pub mod sources;
pub mod utils;
