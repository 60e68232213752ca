//! SQLite persistence of rip results
//!
//! One `image_info` row per ripped image and one `file_info` row per listed
//! file. The database is appended to, so several images (or several runs
//! over the same image) can share one file.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::{Allocation, ExtractedFile, ExtractionStatus, FileKind, ImageRip, MetadataMap};

const STATUS_SUCCESS: &str = "success";
const STATUS_FAILED: &str = "failed";

/// SQLite database holding rip results
pub struct RipDatabase {
    conn: Connection,
    db_path: PathBuf,
}

/// One `image_info` row with per-image file counts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSummary {
    pub id: i64,
    pub rip_id: Uuid,
    pub path: PathBuf,
    pub fs_type: String,
    pub total_recovered_size: u64,
    pub total_useful_size: u64,
    pub created_at: DateTime<Utc>,
    pub overt_files: u32,
    pub deleted_files: u32,
}

type SummaryRow = (i64, String, String, String, i64, i64, String, u32, u32);

const SUMMARY_SELECT: &str = r#"
    SELECT
        i.id, i.rip_id, i.path, i.fs_type,
        i.total_recovered_size, i.total_useful_size, i.created_at,
        (SELECT COUNT(*) FROM file_info f WHERE f.img_src = i.id AND f.deleted = 0),
        (SELECT COUNT(*) FROM file_info f WHERE f.img_src = i.id AND f.deleted = 1)
    FROM image_info i
"#;

impl RipDatabase {
    /// Open or create a database at the specified path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();

        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let conn = Connection::open(&db_path)
            .context(format!("Failed to open database at {}", db_path.display()))?;

        let db = Self { conn, db_path };
        db.initialize_schema()?;

        Ok(db)
    }

    /// Initialize schema (idempotent)
    fn initialize_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS image_info (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                rip_id TEXT NOT NULL UNIQUE,
                path TEXT NOT NULL,
                fs_type TEXT NOT NULL,
                total_recovered_size INTEGER NOT NULL,
                total_useful_size INTEGER NOT NULL,
                full_info TEXT NOT NULL,
                tsk_version TEXT NOT NULL,
                created_at TEXT NOT NULL,
                duration_ms INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS file_info (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                img_src INTEGER NOT NULL REFERENCES image_info(id) ON DELETE CASCADE,
                file_type TEXT NOT NULL,
                file_metadata TEXT,
                metadata_error TEXT,
                original_path TEXT NOT NULL,
                final_destination TEXT,
                location TEXT NOT NULL,
                size INTEGER NOT NULL,
                md5 TEXT NOT NULL,
                sha256 TEXT NOT NULL,
                signature TEXT,
                deleted BOOLEAN NOT NULL,
                status TEXT NOT NULL,
                error TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_file_info_img_src
                ON file_info(img_src);

            CREATE INDEX IF NOT EXISTS idx_file_info_md5
                ON file_info(md5);
            "#,
            )
            .context("Failed to initialize database schema")?;

        Ok(())
    }

    /// Save an image and all of its files in one transaction
    ///
    /// Returns the `image_info.id` of the new row.
    pub fn save_rip(&self, rip: &ImageRip) -> Result<i64> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to start transaction")?;

        tx.execute(
            r#"
            INSERT INTO image_info (
                rip_id, path, fs_type,
                total_recovered_size, total_useful_size,
                full_info, tsk_version, created_at, duration_ms
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                rip.id.to_string(),
                rip.image_path.display().to_string(),
                rip.filesystem.fs_type,
                rip.total_recovered_size() as i64,
                rip.total_useful_size() as i64,
                rip.filesystem.details,
                rip.tsk_version,
                rip.created_at.to_rfc3339(),
                rip.duration_ms as i64,
            ],
        )
        .context("Failed to save image to database")?;
        let image_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO file_info (
                    img_src, file_type, file_metadata, metadata_error,
                    original_path, final_destination, location,
                    size, md5, sha256, signature, deleted, status, error
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                "#,
            )?;

            for file in rip.files() {
                let metadata_json = if file.metadata.is_empty() {
                    None
                } else {
                    Some(
                        serde_json::to_string(&file.metadata)
                            .context("Failed to serialize file metadata")?,
                    )
                };
                let (status, error) = match &file.status {
                    ExtractionStatus::Success => (STATUS_SUCCESS, None),
                    ExtractionStatus::Failed(reason) => (STATUS_FAILED, Some(reason.as_str())),
                };

                stmt.execute(params![
                    image_id,
                    file.file_type.as_str(),
                    metadata_json,
                    file.metadata_error,
                    file.original_path,
                    file.final_destination
                        .as_ref()
                        .map(|p| p.display().to_string()),
                    file.location,
                    file.size as i64,
                    file.md5,
                    file.sha256,
                    file.signature,
                    file.allocation.is_deleted(),
                    status,
                    error,
                ])
                .context(format!("Failed to save file {}", file.original_path))?;
            }
        }

        tx.commit().context("Failed to commit rip")?;

        tracing::info!(
            "Saved rip {} ({} files) to {}",
            rip.id,
            rip.overt.len() + rip.deleted.len(),
            self.db_path.display()
        );
        Ok(image_id)
    }

    fn summary_from_row(row: SummaryRow) -> Result<ImageSummary> {
        let (id, rip_id, path, fs_type, recovered, useful, created_at, overt, deleted) = row;

        Ok(ImageSummary {
            id,
            rip_id: Uuid::parse_str(&rip_id).context("Invalid UUID in database")?,
            path: PathBuf::from(path),
            fs_type,
            total_recovered_size: recovered as u64,
            total_useful_size: useful as u64,
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .context("Invalid timestamp in database")?
                .with_timezone(&Utc),
            overt_files: overt,
            deleted_files: deleted,
        })
    }

    fn read_summary(row: &rusqlite::Row<'_>) -> rusqlite::Result<SummaryRow> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
            row.get(8)?,
        ))
    }

    /// List all ripped images, newest first
    pub fn list_images(&self) -> Result<Vec<ImageSummary>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} ORDER BY i.created_at DESC, i.id DESC", SUMMARY_SELECT))?;

        let rows = stmt
            .query_map([], Self::read_summary)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query images")?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            match Self::summary_from_row(row) {
                Ok(summary) => summaries.push(summary),
                Err(e) => tracing::warn!("Skipping unreadable image row: {:#}", e),
            }
        }

        Ok(summaries)
    }

    /// Load the files recorded for one image, overt first, in insertion order
    pub fn load_files(&self, image_id: i64) -> Result<Vec<ExtractedFile>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT
                file_type, file_metadata, metadata_error,
                original_path, final_destination, location,
                size, md5, sha256, signature, deleted, status, error
            FROM file_info
            WHERE img_src = ?1
            ORDER BY deleted ASC, id ASC
            "#,
        )?;

        let rows = stmt
            .query_map([image_id], |row| {
                let file_type: String = row.get(0)?;
                let metadata_json: Option<String> = row.get(1)?;
                let metadata_error: Option<String> = row.get(2)?;
                let original_path: String = row.get(3)?;
                let final_destination: Option<String> = row.get(4)?;
                let location: String = row.get(5)?;
                let size: i64 = row.get(6)?;
                let md5: String = row.get(7)?;
                let sha256: String = row.get(8)?;
                let signature: Option<String> = row.get(9)?;
                let deleted: bool = row.get(10)?;
                let status: String = row.get(11)?;
                let error: Option<String> = row.get(12)?;

                Ok((
                    file_type,
                    metadata_json,
                    metadata_error,
                    original_path,
                    final_destination,
                    location,
                    size,
                    md5,
                    sha256,
                    signature,
                    deleted,
                    status,
                    error,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query files")?;

        let mut files = Vec::with_capacity(rows.len());
        for row in rows {
            let (
                file_type,
                metadata_json,
                metadata_error,
                original_path,
                final_destination,
                location,
                size,
                md5,
                sha256,
                signature,
                deleted,
                status,
                error,
            ) = row;

            let metadata: MetadataMap = match metadata_json {
                Some(json) => {
                    serde_json::from_str(&json).context("Failed to deserialize file metadata")?
                }
                None => MetadataMap::new(),
            };

            files.push(ExtractedFile {
                original_path,
                location,
                allocation: if deleted {
                    Allocation::Deleted
                } else {
                    Allocation::Overt
                },
                final_destination: final_destination.map(PathBuf::from),
                size: size as u64,
                md5,
                sha256,
                file_type: file_type.parse::<FileKind>()?,
                signature,
                metadata,
                metadata_error,
                status: if status == STATUS_SUCCESS {
                    ExtractionStatus::Success
                } else {
                    ExtractionStatus::Failed(error.unwrap_or_default())
                },
            });
        }

        Ok(files)
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Get the count of images in the database
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM image_info", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
