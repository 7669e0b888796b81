// SPDX-FileCopyrightText: 2026 Questlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Config errors as miette diagnostics.
//!
//! Figment errors are split into one [`ConfigError`] per problem. Unknown
//! keys get a "did you mean" hint and, when the TOML text is available, a
//! label on the offending line.

#![allow(unused_assignments)] // emitted by the miette derive

use std::fmt::Write as _;
use std::path::Path;

use figment::error::Kind;
use miette::{GraphicalReportHandler, GraphicalTheme, NamedSource, SourceSpan};
use thiserror::Error;

use crate::loader::{INLINE_SOURCE, SourceText};

/// Jaro-Winkler score a known key needs to be offered as a correction.
const SIMILARITY_FLOOR: f64 = 0.8;

#[derive(Debug, Error, miette::Diagnostic)]
pub enum ConfigError {
    #[error("unknown key `{key}` in {section}")]
    #[diagnostic(
        code(questlog::config::unknown_key),
        help("{}", key_help(suggestion.as_deref(), expected))
    )]
    UnknownKey {
        key: String,
        /// `[client]`, `[throttle]`, ... or `top level`.
        section: String,
        suggestion: Option<String>,
        /// Comma-separated keys the section accepts.
        expected: String,
        #[label("not recognized here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{key}` has the wrong type: found {found}, expected {expected}")]
    #[diagnostic(code(questlog::config::wrong_type))]
    WrongType {
        key: String,
        found: String,
        expected: String,
    },

    #[error("`{key}` is required")]
    #[diagnostic(
        code(questlog::config::missing_key),
        help("set `{key}` in questlog.toml or through a QUESTLOG_* variable")
    )]
    MissingKey { key: String },

    /// A value that parsed but makes no sense.
    #[error("`{field}` {reason}")]
    #[diagnostic(code(questlog::config::invalid_value))]
    Invalid { field: String, reason: String },

    #[error("{0}")]
    #[diagnostic(code(questlog::config::other))]
    Other(String),
}

fn key_help(suggestion: Option<&str>, expected: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? accepted keys: {expected}"),
        None => format!("accepted keys: {expected}"),
    }
}

/// One diagnostic per problem figment reported.
pub fn from_figment(err: figment::Error, texts: &[SourceText]) -> Vec<ConfigError> {
    err.into_iter().map(|e| convert(e, texts)).collect()
}

fn convert(error: figment::Error, texts: &[SourceText]) -> ConfigError {
    match &error.kind {
        Kind::UnknownField(key, expected) => {
            let (span, src) = locate(&error, key, texts);
            ConfigError::UnknownKey {
                key: key.clone(),
                section: match error.path.as_slice() {
                    [] => "top level".to_string(),
                    path => format!("[{}]", path.join(".")),
                },
                suggestion: closest_key(key, expected).map(str::to_string),
                expected: expected.join(", "),
                span,
                src,
            }
        }
        Kind::MissingField(key) => ConfigError::MissingKey {
            key: dotted(&error.path, key),
        },
        Kind::InvalidType(found, expected) => ConfigError::WrongType {
            key: error.path.join("."),
            found: found.to_string(),
            expected: expected.clone(),
        },
        _ => ConfigError::Other(error.to_string()),
    }
}

fn dotted(path: &[String], key: &str) -> String {
    path.iter()
        .map(String::as_str)
        .chain(std::iter::once(key))
        .collect::<Vec<_>>()
        .join(".")
}

/// Find the TOML text the error came from and the key inside it.
fn locate(
    error: &figment::Error,
    key: &str,
    texts: &[SourceText],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let origin = error.metadata.as_ref().and_then(|m| m.source.as_ref());
    let text = match origin {
        Some(figment::Source::File(path)) => texts.iter().find(|t| Path::new(&t.name) == path),
        Some(_) => None,
        // String providers carry no file.
        None => texts.iter().find(|t| t.name == INLINE_SOURCE),
    };
    let Some(text) = text else {
        return (None, None);
    };
    match locate_key(&text.content, &error.path, key) {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), key.len())),
            Some(NamedSource::new(&text.name, text.content.clone())),
        ),
        None => (None, None),
    }
}

/// Byte offset of `key` within the `[section]` table, or among the top-level
/// keys when `section` is empty.
pub fn locate_key(toml: &str, section: &[String], key: &str) -> Option<usize> {
    let wanted = section.join(".");
    let mut table = String::new();
    let mut offset = 0;
    for line in toml.split_inclusive('\n') {
        let start = offset;
        offset += line.len();

        let trimmed = line.trim_start();
        if let Some(header) = trimmed.strip_prefix('[') {
            table = header.split(']').next().unwrap_or("").trim().to_string();
            continue;
        }
        if table != wanted {
            continue;
        }
        if let Some((name, _)) = trimmed.split_once('=') {
            if name.trim_end() == key {
                return Some(start + line.len() - trimmed.len());
            }
        }
    }
    None
}

/// The accepted key most similar to `unknown`, if any is close enough.
pub fn closest_key<'a>(unknown: &str, accepted: &[&'a str]) -> Option<&'a str> {
    accepted
        .iter()
        .map(|&candidate| (candidate, strsim::jaro_winkler(unknown, candidate)))
        .filter(|&(_, score)| score >= SIMILARITY_FLOOR)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(candidate, _)| candidate)
}

/// Render every error as a miette report, for games that print config
/// problems to a console or log file.
pub fn render(errors: &[ConfigError]) -> String {
    let handler = GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor());
    let mut out = String::new();
    for error in errors {
        if handler.render_report(&mut out, error).is_err() {
            let _ = writeln!(out, "{error}");
        }
    }
    out
}
