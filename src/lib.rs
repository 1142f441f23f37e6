//! # bear-quartz-export
//!
//! A CLI tool that exports [Bear](https://bear.app) notes to a folder of Markdown
//! files laid out for the [Quartz](https://quartz.jzhao.xyz) static-site generator.
//!
//! ## What it does
//!
//! Bear keeps notes in a Core Data SQLite database. This tool snapshots that
//! database, reads every live note and attachment, and:
//!
//! - files each note under the folder named by its folder tag (`#30 External/31 Books#`),
//!   stripping the marker from the body;
//! - drops notes carrying excluded tags (`#blog`, `#draft`, ...) and, with
//!   `--publish-only`, notes whose frontmatter lacks `publish: true`;
//! - copies referenced images into one attachment folder, renaming clashes and
//!   rewriting `![](name)` references to match;
//! - generates auto-updating index pages (books read, recently edited, ...).
//!
//! The database is opened **read-only**; your notes are never modified.
//!
//! ## Usage
//!
//! ```sh
//! # Export everything to ~/Desktop/BearExport
//! bear-quartz-export
//!
//! # Only published notes, into a Quartz content folder, without writing anything
//! bear-quartz-export ~/quartz/content --publish-only --dry-run
//! ```
//!
//! Preferences can be persisted in `~/.config/bear-quartz-export/config.toml`.
pub mod assets;
pub mod error;
pub mod exporter;
pub mod frontmatter;
pub mod importer;
pub mod mapper;
pub mod reports;
pub mod tags;
pub mod utils;

pub use error::{InvalidTimestamp, MapError};
pub use exporter::{ExportPlan, ExportSummary, plan_export, write_plan};
pub use importer::{RawAssetRecord, RawNoteRecord};
pub use mapper::MappedNote;
pub use utils::{ExportConfig, RunLog};
