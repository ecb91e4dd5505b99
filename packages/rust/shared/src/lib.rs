//! Shared types, error model, and configuration for pricescrape.
//!
//! This crate is the foundation depended on by all other pricescrape crates.
//! It provides:
//! - [`PriceScrapeError`]: the unified error type
//! - Domain types ([`CatalogItem`], [`NormalizedItem`], [`ConsolePlatform`], [`SaleRecord`])
//! - Configuration ([`AppConfig`], [`FetchConfig`], [`IngestConfig`], [`StoreConfig`])

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, FetchConfig, FetchSection, IngestConfig, IngestSection, StoreConfig, StoreSection,
    config_dir, config_file_path, init_config, init_config_in, load_config, load_config_from,
};
pub use error::{PriceScrapeError, Result};
pub use types::{CatalogItem, Condition, ConsolePlatform, NormalizedItem, SaleRecord};
