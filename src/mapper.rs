use crate::error::MapError;
use crate::frontmatter::{self, Frontmatter};
use crate::importer::RawNoteRecord;
use crate::tags;
use crate::utils::{ExportConfig, RunLog, from_core_data_timestamp};
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// A Bear note ready to be written, with its folder and tags resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedNote {
    /// Body with the resolved folder marker stripped. Frontmatter stays inline.
    pub content: String,
    pub title: String,
    /// Inline tags in first-occurrence order.
    pub tags: Vec<String>,
    pub id: i64,
    /// Resolved folder path; empty when the note is unclassified.
    pub folder: String,
    pub frontmatter: Frontmatter,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl MappedNote {
    pub fn is_published(&self) -> bool {
        frontmatter::is_truthy(self.frontmatter.get("publish"))
    }

    /// Destination relative to the export root.
    pub fn relative_path(&self, index_title: &str) -> PathBuf {
        if self.title == index_title {
            return PathBuf::from("index.md");
        }
        let file_name = format!("{}.md", safe_file_stem(&self.title));
        if self.folder.is_empty() {
            PathBuf::from(file_name)
        } else {
            PathBuf::from(&self.folder).join(file_name)
        }
    }
}

/// Title with path separators and colons replaced, so it stays a single path segment.
fn safe_file_stem(title: &str) -> String {
    title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '-',
            c => c,
        })
        .collect()
}

fn placeholder_title(id: i64) -> String {
    format!("Untitled {}", id)
}

/// Map a single raw note.
///
/// `Ok(None)` means the note was dropped by policy (publish-only or ignored title).
pub fn map_note(
    raw: RawNoteRecord,
    config: &ExportConfig,
    log: &mut RunLog,
) -> Result<Option<MappedNote>, MapError> {
    let fm = frontmatter::extract_frontmatter(&raw.text);
    if config.publish_only && !frontmatter::is_truthy(fm.get("publish")) {
        return Ok(None);
    }

    let title = raw.title.as_deref().map(str::trim).unwrap_or("");
    if !title.is_empty() && config.ignore_titles.iter().any(|t| t == title) {
        tracing::debug!("Ignoring note {} ({})", raw.id, title);
        return Ok(None);
    }

    let resolution = tags::resolve_folder(&raw.text, &config.treat_as_folders);
    for rejected in &resolution.rejected {
        log.warn(format!(
            "Ignoring folder {:?} in {:?} (note {}): not a path inside the export",
            rejected.folder, title, raw.id
        ));
    }
    if resolution.is_ambiguous() {
        let names: Vec<&str> = resolution
            .candidates
            .iter()
            .map(|c| c.folder.as_str())
            .collect();
        log.warn(format!(
            "Too many folders in {:?} (note {}): {:?}; using {:?}",
            title,
            raw.id,
            names,
            resolution.folder()
        ));
    }
    let content = match resolution.selected() {
        Some(candidate) => tags::strip_folder_marker(&raw.text, candidate),
        None => raw.text.clone(),
    };
    let note_tags = tags::extract_inline_tags(&raw.text);

    let title = if title.is_empty() {
        let placeholder = placeholder_title(raw.id);
        log.warn(format!(
            "No title in note {}; writing it as {:?}",
            raw.id, placeholder
        ));
        placeholder
    } else {
        title.to_string()
    };

    let created =
        from_core_data_timestamp(raw.created).map_err(|source| MapError::InvalidTimestamp {
            id: raw.id,
            field: "creation",
            source,
        })?;
    let modified =
        from_core_data_timestamp(raw.modified).map_err(|source| MapError::InvalidTimestamp {
            id: raw.id,
            field: "modification",
            source,
        })?;

    Ok(Some(MappedNote {
        folder: resolution.folder().to_string(),
        content,
        title,
        tags: note_tags,
        id: raw.id,
        frontmatter: fm,
        created,
        modified,
    }))
}

/// Map every raw note, preserving input order.
///
/// A broken timestamp aborts the whole run unless `skip_invalid_notes` is set,
/// in which case the note is logged and skipped.
pub fn map_notes(
    raws: Vec<RawNoteRecord>,
    config: &ExportConfig,
    log: &mut RunLog,
) -> Result<Vec<MappedNote>, MapError> {
    let mut mapped = Vec::with_capacity(raws.len());
    for raw in raws {
        match map_note(raw, config, log) {
            Ok(Some(note)) => mapped.push(note),
            Ok(None) => {}
            Err(e) if config.skip_invalid_notes => {
                log.error(format!("Skipping note {}: {}", e.note_id(), e));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(mapped)
}

/// Drop notes carrying any tag that starts with one of `exclude`.
///
/// Prefix match on the whole tag string: `blog` removes `blog/personal`
/// and `blogger` alike.
pub fn without_excluded_tags(notes: Vec<MappedNote>, exclude: &[String]) -> Vec<MappedNote> {
    notes
        .into_iter()
        .filter(|note| {
            !note
                .tags
                .iter()
                .any(|tag| exclude.iter().any(|prefix| tag.starts_with(prefix.as_str())))
        })
        .collect()
}
