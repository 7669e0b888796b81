// SPDX-FileCopyrightText: 2026 Questlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport adapter trait: the collaborator that performs HTTP requests.

use async_trait::async_trait;

use crate::error::QuestlogError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{TransportRequest, TransportResponse};

/// Performs one HTTP exchange.
///
/// Any HTTP status counts as a completed exchange and is returned as `Ok`.
/// Connection failures map to [`QuestlogError::Transport`] and an expired
/// timeout to [`QuestlogError::Timeout`].
#[async_trait]
pub trait Transport: PluginAdapter {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, QuestlogError>;
}
