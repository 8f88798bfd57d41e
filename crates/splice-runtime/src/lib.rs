//! Splice Runtime - host-side services for splice plugins.
//!
//! This crate provides:
//! - Layered configuration (`ConfigLoader`, `SpliceConfig`)
//! - Logging configuration (`LoggingBuilder`)
//! - An extension loader (`ExtensionManager`) driving each extension's
//!   `setup` / `teardown` pair against a host
//!
//! ```ignore
//! use splice_runtime::{ConfigLoader, ExtensionManager, logging};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::new().load()?;
//!     logging::init_from_config(&config.logging);
//!
//!     let manager = ExtensionManager::new(bot.clone());
//!     manager.register("greetings", greetings::plugin).await?;
//!     manager.apply_config(&config).await;
//!     manager.start_all().await;
//!
//!     bot.run().await?;
//!     manager.stop_all().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod manager;

// Re-exports
pub use config::{
    ConfigError, ConfigLoader, ConfigResult, ExtensionConfig, LoggingConfig, Profile, SpliceConfig,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::LoggingBuilder;
pub use manager::{ExtensionManager, PluginFactory};
