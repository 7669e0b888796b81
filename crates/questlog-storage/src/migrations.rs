// SPDX-FileCopyrightText: 2026 Questlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue schema, versioned by refinery from `migrations/*.sql`.

use questlog_core::QuestlogError;

mod embedded {
    refinery::embed_migrations!("migrations");
}

/// Bring the schema up to date and return how many migrations ran.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<usize, QuestlogError> {
    let report = embedded::migrations::runner()
        .run(conn)
        .map_err(|e| QuestlogError::Storage { source: e.into() })?;
    Ok(report.applied_migrations().len())
}
