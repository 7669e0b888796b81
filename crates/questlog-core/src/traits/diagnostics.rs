// SPDX-FileCopyrightText: 2026 Questlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Warning/error sink the embedder registers for SDK diagnostics.

use tracing::{error, warn};

/// Receives human-readable warnings and errors raised inside the SDK.
///
/// `location` names the operation or component that raised the diagnostic.
pub trait DiagnosticSink: Send + Sync + 'static {
    fn warning(&self, location: &str, message: &str);

    fn error(&self, location: &str, message: &str);
}

/// Default sink: forwards diagnostics to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn warning(&self, location: &str, message: &str) {
        warn!(location, "{message}");
    }

    fn error(&self, location: &str, message: &str) {
        error!(location, "{message}");
    }
}
