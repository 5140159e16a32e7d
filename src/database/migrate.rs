//! Schema patches for stored routines, applied with sqlx's migrator.
//!
//! Files live under `migrations/` as `<version>_<description>.sql`. Each file
//! runs once and is recorded in `_sqlx_migrations` together with its checksum.

use serde::Serialize;
use sqlx::migrate::{Migrate, Migrator};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use super::manager::{Database, DatabaseError};

pub const DEFAULT_DIR: &str = "migrations";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchState {
    Applied,
    Pending,
    /// Applied, but the file changed afterwards.
    Modified,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatchStatus {
    pub version: i64,
    pub description: String,
    pub state: PatchState,
}

async fn load(dir: &Path) -> Result<Migrator, DatabaseError> {
    Ok(Migrator::new(dir).await?)
}

/// Apply every pending patch in version order.
pub async fn run(db: &Database, dir: &Path) -> Result<Vec<PatchStatus>, DatabaseError> {
    let migrator = load(dir).await?;
    let before = status_with(db, &migrator).await?;

    migrator.run(db.pool()).await?;

    let applied: Vec<PatchStatus> = before
        .into_iter()
        .filter(|p| p.state == PatchState::Pending)
        .map(|p| PatchStatus { state: PatchState::Applied, ..p })
        .collect();
    for patch in &applied {
        info!("Applied schema patch {} {}", patch.version, patch.description);
    }
    Ok(applied)
}

/// Compare the patch directory with what the database has recorded.
pub async fn status(db: &Database, dir: &Path) -> Result<Vec<PatchStatus>, DatabaseError> {
    let migrator = load(dir).await?;
    status_with(db, &migrator).await
}

async fn status_with(db: &Database, migrator: &Migrator) -> Result<Vec<PatchStatus>, DatabaseError> {
    let mut conn = db.pool().acquire().await?;
    conn.ensure_migrations_table().await?;
    let recorded: HashMap<i64, Vec<u8>> = conn
        .list_applied_migrations()
        .await?
        .into_iter()
        .map(|m| (m.version, m.checksum.into_owned()))
        .collect();

    Ok(migrator
        .iter()
        .map(|m| {
            let state = match recorded.get(&m.version) {
                None => PatchState::Pending,
                Some(checksum) if checksum.as_slice() == m.checksum.as_ref() => PatchState::Applied,
                Some(_) => PatchState::Modified,
            };
            PatchStatus {
                version: m.version,
                description: m.description.to_string(),
                state,
            }
        })
        .collect())
}
