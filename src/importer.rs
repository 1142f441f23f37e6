//! Raw records read from Bear's Core Data SQLite store.
//!
//! Tables used:
//! ```sql
//! ZSFNOTE     (Z_PK INTEGER, ZTEXT TEXT, ZTITLE TEXT,
//!              ZCREATIONDATE REAL, ZMODIFICATIONDATE REAL,
//!              ZTRASHED INTEGER, ZARCHIVED INTEGER, ...)
//! ZSFNOTEFILE (ZUNIQUEIDENTIFIER TEXT, ZNOTE INTEGER, ZFILENAME TEXT,
//!              ZDOWNLOADED INTEGER, ZUNUSED INTEGER, ...)
//! ```
//!
//! Dates are Core Data timestamps: seconds since 2001-01-01T00:00:00Z.

use eyre::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::{Connection, OpenFlags, backup::Backup};
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;

/// Live (not trashed, not archived) notes.
const NOTES_QUERY: &str = "SELECT Z_PK, ZTEXT, ZTITLE, ZCREATIONDATE, ZMODIFICATIONDATE \
     FROM `ZSFNOTE` WHERE `ZTRASHED` LIKE '0' AND `ZARCHIVED` LIKE '0' ORDER BY Z_PK";

/// Downloaded attachments still referenced by a note.
const ASSETS_QUERY: &str = "SELECT ZUNIQUEIDENTIFIER, ZNOTE, ZFILENAME \
     FROM `ZSFNOTEFILE` WHERE `ZDOWNLOADED` LIKE '1' AND `ZUNUSED` LIKE '0' \
     AND ZNOTE IS NOT NULL AND ZFILENAME IS NOT NULL ORDER BY Z_PK";

/// One row of `ZSFNOTE`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawNoteRecord {
    pub id: i64,
    /// Full Markdown body; may contain tags and a frontmatter block.
    pub text: String,
    pub title: Option<String>,
    pub created: Option<f64>,
    pub modified: Option<f64>,
}

/// One row of `ZSFNOTEFILE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAssetRecord {
    /// Directory name under Bear's "Note Images" folder.
    pub unique_id: String,
    pub filename: String,
    /// `ZSFNOTE.Z_PK` of the owning note.
    pub note_id: i64,
}

/// Copy the live database to a temporary file with the SQLite backup API,
/// so Bear can keep writing while we read.
pub fn snapshot_database(db_path: &Path, quiet: bool) -> Result<NamedTempFile> {
    let spinner = if quiet {
        ProgressBar::hidden()
    } else {
        let s = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
            s.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
        }
        s.set_message("Snapshotting Bear database...");
        s.enable_steady_tick(Duration::from_millis(80));
        s
    };

    let src = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .wrap_err_with(|| format!("Failed to open Bear database: {}", db_path.display()))?;

    let tmp = NamedTempFile::new().wrap_err("Failed to create temporary file")?;
    let mut dst =
        Connection::open(tmp.path()).wrap_err("Failed to open snapshot database connection")?;

    {
        let backup = Backup::new(&src, &mut dst).wrap_err("Failed to initialize backup")?;
        backup
            .run_to_completion(1000, Duration::from_millis(5), None)
            .wrap_err("Backup did not complete successfully")?;
    }

    drop(src);
    spinner.finish_and_clear();
    Ok(tmp)
}

pub fn open_snapshot(path: &Path) -> Result<Connection> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .wrap_err("Failed to open snapshot database")
}

pub fn load_notes(conn: &Connection) -> Result<Vec<RawNoteRecord>> {
    let mut stmt = conn
        .prepare(NOTES_QUERY)
        .wrap_err("Failed to prepare note query")?;
    stmt.query_map([], |row| {
        Ok(RawNoteRecord {
            id: row.get(0)?,
            text: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            title: row.get(2)?,
            created: row.get(3)?,
            modified: row.get(4)?,
        })
    })
    .wrap_err("Failed to execute note query")?
    .collect::<Result<_, _>>()
    .wrap_err("Failed to read note rows")
}

pub fn load_assets(conn: &Connection) -> Result<Vec<RawAssetRecord>> {
    let mut stmt = conn
        .prepare(ASSETS_QUERY)
        .wrap_err("Failed to prepare asset query")?;
    stmt.query_map([], |row| {
        Ok(RawAssetRecord {
            unique_id: row.get(0)?,
            note_id: row.get(1)?,
            filename: row.get(2)?,
        })
    })
    .wrap_err("Failed to execute asset query")?
    .collect::<Result<_, _>>()
    .wrap_err("Failed to read asset rows")
}

/// Notes and assets in one pass over the same connection.
pub fn load_records(conn: &Connection) -> Result<(Vec<RawNoteRecord>, Vec<RawAssetRecord>)> {
    Ok((load_notes(conn)?, load_assets(conn)?))
}
