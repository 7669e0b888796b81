// SPDX-FileCopyrightText: 2026 Questlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment layering for the three places a game can keep its config.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};

use crate::model::QuestlogConfig;

/// Name given to inline TOML in diagnostics.
pub const INLINE_SOURCE: &str = "<embedded questlog.toml>";

const ENV_PREFIX: &str = "QUESTLOG_";
const SECTIONS: [&str; 3] = ["client", "storage", "throttle"];

/// Where configuration is read from. Compiled defaults always sit underneath.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// `/etc/questlog/questlog.toml`, the user config dir, `./questlog.toml`,
    /// then `QUESTLOG_*` environment variables, later layers winning.
    Standard,
    /// One file, then environment variables. A missing file is skipped.
    File(PathBuf),
    /// TOML shipped inside the game. Environment variables are not read.
    Inline(String),
}

/// Raw TOML text of one layer, kept to point diagnostics at the bad key.
#[derive(Debug, Clone)]
pub struct SourceText {
    /// File path as figment reports it, or [`INLINE_SOURCE`].
    pub name: String,
    pub content: String,
}

impl ConfigSource {
    /// The merged figment for this source.
    pub fn figment(&self) -> Figment {
        let base = Figment::from(Serialized::defaults(QuestlogConfig::default()));
        match self {
            Self::Standard => standard_paths()
                .into_iter()
                .fold(base, |figment, path| figment.merge(Toml::file(path)))
                .merge(env_provider()),
            Self::File(path) => base.merge(Toml::file(path)).merge(env_provider()),
            Self::Inline(toml) => base.merge(Toml::string(toml)),
        }
    }

    /// Deserialize without semantic validation.
    pub fn extract(&self) -> Result<QuestlogConfig, figment::Error> {
        self.figment().extract()
    }

    /// The TOML texts behind this source that exist on disk.
    pub fn texts(&self) -> Vec<SourceText> {
        match self {
            Self::Standard => standard_paths().iter().filter_map(|p| read_text(p)).collect(),
            Self::File(path) => read_text(path).into_iter().collect(),
            Self::Inline(toml) => vec![SourceText {
                name: INLINE_SOURCE.to_string(),
                content: toml.clone(),
            }],
        }
    }
}

fn standard_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/questlog/questlog.toml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("questlog").join("questlog.toml"));
    }
    paths.push(PathBuf::from("questlog.toml"));
    paths
}

fn read_text(path: &Path) -> Option<SourceText> {
    let content = std::fs::read_to_string(path).ok()?;
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(path)
    };
    Some(SourceText {
        name: absolute.display().to_string(),
        content,
    })
}

/// `QUESTLOG_THROTTLE_MIN_BATCH_SIZE` -> `throttle.min_batch_size`.
///
/// Only the section prefix becomes a dot; underscores inside key names stay.
fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX).map(|key| {
        let key = key.as_str();
        SECTIONS
            .iter()
            .find_map(|section| {
                key.strip_prefix(section)
                    .and_then(|rest| rest.strip_prefix('_'))
                    .map(|rest| format!("{section}.{rest}"))
            })
            .unwrap_or_else(|| key.to_string())
            .into()
    })
}
