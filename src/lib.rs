//! Client-side coordination for a file manager: a lazily-loaded directory
//! tree cache, a single-session content search coordinator, per-path match
//! highlighting, and settle detection for the UI cascade that follows a
//! search.

pub mod completion;
pub mod config;
pub mod error;
pub mod fs;
pub mod logging;
pub mod provider;
pub mod search;
pub mod store;
