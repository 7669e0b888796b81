// SPDX-FileCopyrightText: 2026 Questlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity and lifecycle shared by the client's collaborators.

use async_trait::async_trait;

use crate::error::QuestlogError;
use crate::types::{AdapterType, HealthStatus};

/// Implemented by the transport and the queue store so the client can
/// report on them and release them uniformly.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Short name shown in health reports, e.g. `"http"`.
    fn name(&self) -> &str;

    fn version(&self) -> semver::Version;

    fn adapter_type(&self) -> AdapterType;

    async fn health_check(&self) -> Result<HealthStatus, QuestlogError>;

    /// Release held resources. Called once from `Client::shutdown`.
    async fn shutdown(&self) -> Result<(), QuestlogError>;
}
