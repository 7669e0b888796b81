// SPDX-FileCopyrightText: 2026 Questlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the Questlog SDK.
//!
//! A game either ships its TOML inline or lets the SDK look in the usual
//! places. Either way unknown keys are rejected with a suggestion, and
//! semantic problems are collected before the client starts.
//!
//! ```no_run
//! use questlog_config::{ConfigSource, load, render};
//!
//! match load(&ConfigSource::Standard) {
//!     Ok(config) => println!("game {}", config.client.game_id),
//!     Err(errors) => eprint!("{}", render(&errors)),
//! }
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use tracing::{debug, warn};

pub use diagnostic::{ConfigError, render};
pub use loader::ConfigSource;
pub use model::{ClientConfig, QuestlogConfig, StorageConfig, ThrottleConfig};

/// Load, deserialize, and validate configuration from `source`.
pub fn load(source: &ConfigSource) -> Result<QuestlogConfig, Vec<ConfigError>> {
    let config = source.extract().map_err(|err| {
        let errors = diagnostic::from_figment(err, &source.texts());
        warn!(problems = errors.len(), "configuration could not be parsed");
        errors
    })?;
    validation::validate_config(&config).inspect_err(|errors| {
        warn!(problems = errors.len(), "configuration rejected");
    })?;
    debug!(game_id = %config.client.game_id, "configuration loaded");
    Ok(config)
}
