//! SQLite version store (embedded, no external dependencies)
//!
//! One `workspaces` row per workspace, one `file_entries` row per live path.
//! Entries are keyed by `entry_key(file_path)` so upserts are blind writes,
//! and every confirmed change lands through [`Database::commit_sync`], the
//! single transactional primitive of the whole protocol.

use kiln_core::{path, version, FileEntry, FileType, KilnError, Result, Workspace};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::sync::Arc;

pub struct Database {
    pool: Arc<SqlitePool>,
}

/// One metadata mutation applied inside a confirm transaction.
#[derive(Debug, Clone)]
pub enum EntryChange {
    Upsert(UpsertEntry),
    Delete { entry_key: String },
}

/// Normalized upsert payload. Folders arrive here with no content key, no
/// hash and size 0; the committer enforces that before the transaction.
#[derive(Debug, Clone)]
pub struct UpsertEntry {
    pub entry_key: String,
    pub file_id: String,
    pub file_path: String,
    pub file_type: FileType,
    pub content_key: Option<String>,
    pub size: i64,
    pub content_hash: Option<String>,
}

/// What a committed confirm produced.
#[derive(Debug)]
pub struct CommitReceipt {
    pub final_version: String,
    /// Content keys of deleted entries; their blobs await best-effort
    /// cleanup outside the transaction.
    pub orphaned_keys: Vec<String>,
}

impl Database {
    pub async fn new(database_path: &str) -> Result<Self> {
        tracing::info!("Opening SQLite database at: {}", database_path);

        // Create parent directory if needed
        if let Some(parent) = std::path::Path::new(database_path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| {
                KilnError::Store(format!("failed to open database at {database_path}: {e}"))
            })?;

        tracing::info!("SQLite connection established, running migrations...");

        Self::run_migrations(&pool).await?;

        tracing::info!("Database initialization complete");

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<()> {
        // Workspaces table. `version` is TEXT and nullable: rows minted by
        // older tooling carry NULL, which the protocol reads as version 0.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS workspaces (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                version TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(store_err)?;

        // File entries table, keyed by the deterministic path encoding.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS file_entries (
                workspace_id TEXT NOT NULL,
                entry_key TEXT NOT NULL,
                file_id TEXT NOT NULL,
                file_path TEXT NOT NULL,
                file_type TEXT NOT NULL DEFAULT 'file',
                content_key TEXT,
                size INTEGER NOT NULL DEFAULT 0,
                content_hash TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (workspace_id, entry_key)
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(store_err)?;

        Ok(())
    }

    // Workspace operations

    pub async fn create_workspace(&self, workspace: &Workspace) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO workspaces (id, name, owner_id, version, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&workspace.id)
        .bind(&workspace.name)
        .bind(&workspace.owner_id)
        .bind(&workspace.version)
        .bind(workspace.created_at)
        .bind(workspace.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(store_err)?;

        Ok(())
    }

    pub async fn get_workspace(&self, id: &str) -> Result<Option<Workspace>> {
        let row: Option<WorkspaceRow> = sqlx::query_as(
            r#"
            SELECT id, name, owner_id, version, created_at, updated_at
            FROM workspaces WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(store_err)?;

        Ok(row.map(|r| r.into()))
    }

    // File entry operations

    pub async fn list_file_entries(&self, workspace_id: &str) -> Result<Vec<FileEntry>> {
        let rows: Vec<FileEntryRow> = sqlx::query_as(
            r#"
            SELECT file_id, file_path, file_type, content_key,
                   size, content_hash, created_at, updated_at
            FROM file_entries WHERE workspace_id = ?1
            ORDER BY file_path
            "#,
        )
        .bind(workspace_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(store_err)?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    pub async fn get_file_entry(
        &self,
        workspace_id: &str,
        file_path: &str,
    ) -> Result<Option<FileEntry>> {
        let row: Option<FileEntryRow> = sqlx::query_as(
            r#"
            SELECT file_id, file_path, file_type, content_key,
                   size, content_hash, created_at, updated_at
            FROM file_entries WHERE workspace_id = ?1 AND entry_key = ?2
            "#,
        )
        .bind(workspace_id)
        .bind(path::entry_key(file_path))
        .fetch_optional(&*self.pool)
        .await
        .map_err(store_err)?;

        Ok(row.map(|r| r.into()))
    }

    /// Applies a confirmed sync atomically: re-reads the stored version,
    /// validates `submitted_version == stored + 1`, applies every change,
    /// and bumps the version with a guarded update. Either everything lands
    /// or nothing does; a failed version check never touches metadata.
    pub async fn commit_sync(
        &self,
        workspace_id: &str,
        submitted_version: u64,
        changes: &[EntryChange],
    ) -> Result<CommitReceipt> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT version FROM workspaces WHERE id = ?1")
                .bind(workspace_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(store_err)?;

        let stored_token = match row {
            None => return Err(KilnError::WorkspaceNotFound(workspace_id.to_string())),
            Some((token,)) => token,
        };
        let stored = version::stored(stored_token.as_deref())?;
        let expected = stored
            .checked_add(1)
            .ok_or_else(|| KilnError::Store("workspace version overflow".to_string()))?;

        if submitted_version != expected {
            return Err(KilnError::VersionConflict {
                submitted: version::token(submitted_version),
                current: version::token(stored),
            });
        }

        let mut orphaned_keys = Vec::new();
        for change in changes {
            match change {
                EntryChange::Upsert(entry) => {
                    sqlx::query(
                        r#"
                        INSERT INTO file_entries
                            (workspace_id, entry_key, file_id, file_path,
                             file_type, content_key, size, content_hash)
                        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                        ON CONFLICT(workspace_id, entry_key) DO UPDATE SET
                            file_id = excluded.file_id,
                            file_type = excluded.file_type,
                            content_key = excluded.content_key,
                            size = excluded.size,
                            content_hash = excluded.content_hash,
                            updated_at = datetime('now')
                        "#,
                    )
                    .bind(workspace_id)
                    .bind(&entry.entry_key)
                    .bind(&entry.file_id)
                    .bind(&entry.file_path)
                    .bind(entry.file_type.to_string())
                    .bind(&entry.content_key)
                    .bind(entry.size)
                    .bind(&entry.content_hash)
                    .execute(&mut *tx)
                    .await
                    .map_err(store_err)?;
                }
                EntryChange::Delete { entry_key } => {
                    // Capture the content key before the row goes away;
                    // deleting an absent path is a no-op.
                    let existing: Option<(Option<String>,)> = sqlx::query_as(
                        r#"
                        SELECT content_key FROM file_entries
                        WHERE workspace_id = ?1 AND entry_key = ?2
                        "#,
                    )
                    .bind(workspace_id)
                    .bind(entry_key)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(store_err)?;

                    if let Some((Some(content_key),)) = existing {
                        orphaned_keys.push(content_key);
                    }

                    sqlx::query(
                        r#"
                        DELETE FROM file_entries
                        WHERE workspace_id = ?1 AND entry_key = ?2
                        "#,
                    )
                    .bind(workspace_id)
                    .bind(entry_key)
                    .execute(&mut *tx)
                    .await
                    .map_err(store_err)?;
                }
            }
        }

        // Guarded bump: of two racing confirms only the one that still sees
        // the predecessor version lands.
        let final_version = version::token(submitted_version);
        let updated = sqlx::query(
            r#"
            UPDATE workspaces
            SET version = ?1, updated_at = datetime('now')
            WHERE id = ?2 AND COALESCE(version, '0') = ?3
            "#,
        )
        .bind(&final_version)
        .bind(workspace_id)
        .bind(version::token(stored))
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        if updated.rows_affected() != 1 {
            return Err(KilnError::VersionConflict {
                submitted: version::token(submitted_version),
                current: version::token(stored),
            });
        }

        tx.commit().await.map_err(store_err)?;

        Ok(CommitReceipt {
            final_version,
            orphaned_keys,
        })
    }
}

fn store_err(e: sqlx::Error) -> KilnError {
    KilnError::Store(e.to_string())
}

// Helper structs for sqlx query_as
#[derive(sqlx::FromRow)]
struct WorkspaceRow {
    id: String,
    name: String,
    owner_id: String,
    version: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<WorkspaceRow> for Workspace {
    fn from(r: WorkspaceRow) -> Self {
        Workspace {
            id: r.id,
            name: r.name,
            owner_id: r.owner_id,
            version: r.version,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct FileEntryRow {
    file_id: String,
    file_path: String,
    file_type: String,
    content_key: Option<String>,
    size: i64,
    content_hash: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<FileEntryRow> for FileEntry {
    fn from(r: FileEntryRow) -> Self {
        FileEntry {
            file_id: r.file_id,
            file_path: r.file_path,
            file_type: parse_file_type(&r.file_type),
            content_key: r.content_key,
            size: r.size,
            content_hash: r.content_hash,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

fn parse_file_type(s: &str) -> FileType {
    match s {
        "folder" => FileType::Folder,
        _ => FileType::File,
    }
}
