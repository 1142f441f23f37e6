//! Attachment routing: which Bear images get copied into the export, under
//! which names, and how note content is rewritten to match.

use crate::importer::RawAssetRecord;
use crate::mapper::MappedNote;
use crate::utils::ExportConfig;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Note id → attachment source paths, in asset-record order.
pub type AssetIndex = HashMap<i64, Vec<PathBuf>>;

/// An attachment scheduled for copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedAsset {
    pub note_id: i64,
    pub source: PathBuf,
    /// File name inside the attachment directory, after collision renaming.
    pub file_name: String,
}

/// Build the index once, from every asset record, before any note filtering.
pub fn build_asset_index(assets: &[RawAssetRecord], assets_root: &Path) -> AssetIndex {
    let mut index = AssetIndex::new();
    for asset in assets {
        index
            .entry(asset.note_id)
            .or_default()
            .push(assets_root.join(&asset.unique_id).join(&asset.filename));
    }
    index
}

/// Names already handed out during this run, in staging order.
#[derive(Debug, Default)]
struct StagingLedger {
    order: Vec<String>,
    taken: HashSet<String>,
}

impl StagingLedger {
    fn contains(&self, name: &str) -> bool {
        self.taken.contains(name)
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn record(&mut self, name: String) {
        self.taken.insert(name.clone());
        self.order.push(name);
    }

    /// `base` itself if free, otherwise `<stem>_<n><ext>` where `n` starts at the
    /// number of names staged so far and grows until the name is free.
    fn allocate(&self, base: &str) -> String {
        if !self.contains(base) {
            return base.to_string();
        }
        let path = Path::new(base);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let mut n = self.len();
        loop {
            let candidate = format!("{}_{}{}", stem, n, ext);
            if !self.contains(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Replace every inline image reference to `original` with `renamed`.
fn rewrite_image_reference(content: &str, original: &str, renamed: &str) -> String {
    content.replace(
        &format!("![]({})", original),
        &format!("![]({})", renamed),
    )
}

/// Decide which attachments to stage for `notes`, in note order.
///
/// Renaming is order dependent: the first note to claim a file name keeps it,
/// later ones get a numbered name and have their content rewritten in place.
pub fn stage_assets(
    notes: &mut [MappedNote],
    index: &AssetIndex,
    config: &ExportConfig,
) -> Vec<StagedAsset> {
    let mut ledger = StagingLedger::default();
    let mut staged = Vec::new();

    for note in notes.iter_mut() {
        let Some(sources) = index.get(&note.id) else {
            continue;
        };
        if config.only_stage_published_assets && !note.is_published() {
            continue;
        }
        for source in sources {
            let Some(base) = source.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            let file_name = ledger.allocate(&base);
            if file_name != base {
                tracing::debug!(
                    "Renaming attachment {} -> {} for note {}",
                    base,
                    file_name,
                    note.id
                );
                note.content = rewrite_image_reference(&note.content, &base, &file_name);
            }
            ledger.record(file_name.clone());
            staged.push(StagedAsset {
                note_id: note.id,
                source: source.clone(),
                file_name,
            });
        }
    }
    staged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontmatter::Frontmatter;
    use chrono::{TimeZone, Utc};

    fn note(id: i64, content: &str, published: bool) -> MappedNote {
        let mut frontmatter = Frontmatter::new();
        frontmatter.insert("publish".into(), serde_yaml::Value::Bool(published));
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        MappedNote {
            content: content.to_string(),
            title: format!("Note {}", id),
            tags: vec![],
            id,
            folder: String::new(),
            frontmatter,
            created: at,
            modified: at,
        }
    }

    fn asset(unique_id: &str, filename: &str, note_id: i64) -> RawAssetRecord {
        RawAssetRecord {
            unique_id: unique_id.into(),
            filename: filename.into(),
            note_id,
        }
    }

    fn config() -> ExportConfig {
        ExportConfig {
            only_stage_published_assets: false,
            ..ExportConfig::default()
        }
    }

    #[test]
    fn test_index_preserves_record_order() {
        let root = Path::new("/bear/images");
        let index = build_asset_index(
            &[asset("A", "one.png", 1), asset("B", "x.png", 2), asset("C", "two.png", 1)],
            root,
        );
        assert_eq!(
            index[&1],
            vec![root.join("A").join("one.png"), root.join("C").join("two.png")]
        );
        assert_eq!(index[&2].len(), 1);
    }

    #[test]
    fn test_same_name_across_notes_is_renamed_and_rewritten() {
        let index = build_asset_index(
            &[asset("A", "image.png", 1), asset("B", "image.png", 2)],
            Path::new("/bear"),
        );
        let mut notes = vec![
            note(1, "first ![](image.png)", true),
            note(2, "second ![](image.png) and again ![](image.png)", true),
        ];
        let staged = stage_assets(&mut notes, &index, &config());

        let names: Vec<&str> = staged.iter().map(|s| s.file_name.as_str()).collect();
        assert_eq!(names, vec!["image.png", "image_1.png"]);
        assert_eq!(notes[0].content, "first ![](image.png)");
        assert_eq!(
            notes[1].content,
            "second ![](image_1.png) and again ![](image_1.png)"
        );
        assert_eq!(staged[1].source, Path::new("/bear").join("B").join("image.png"));
    }

    #[test]
    fn test_suffix_uses_running_count() {
        let index = build_asset_index(
            &[
                asset("A", "a.png", 1),
                asset("B", "b.jpg", 1),
                asset("C", "b.jpg", 2),
                asset("D", "noext", 2),
                asset("E", "noext", 3),
            ],
            Path::new("/bear"),
        );
        let mut notes = vec![note(1, "", true), note(2, "", true), note(3, "", true)];
        let staged = stage_assets(&mut notes, &index, &config());
        let names: Vec<&str> = staged.iter().map(|s| s.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b.jpg", "b_2.jpg", "noext", "noext_4"]);
    }

    #[test]
    fn test_renamed_name_collision_keeps_counting() {
        let index = build_asset_index(
            &[
                asset("A", "pic.png", 1),
                asset("B", "pic_2.png", 1),
                asset("D", "pic.png", 2),
            ],
            Path::new("/bear"),
        );
        let mut notes = vec![note(1, "", true), note(2, "![](pic.png)", true)];
        let staged = stage_assets(&mut notes, &index, &config());
        // two names staged, but "pic_2.png" is already taken
        assert_eq!(staged[2].file_name, "pic_3.png");
        assert_eq!(notes[1].content, "![](pic_3.png)");
    }

    #[test]
    fn test_only_published_notes_stage_when_configured() {
        let index = build_asset_index(
            &[asset("A", "a.png", 1), asset("B", "b.png", 2)],
            Path::new("/bear"),
        );
        let mut notes = vec![note(1, "", false), note(2, "", true)];
        let cfg = ExportConfig {
            only_stage_published_assets: true,
            ..ExportConfig::default()
        };
        let staged = stage_assets(&mut notes, &index, &cfg);
        assert_eq!(staged.len(), 1);
        assert_eq!(staged[0].note_id, 2);
    }

    #[test]
    fn test_notes_without_assets_are_untouched() {
        let index = AssetIndex::new();
        let mut notes = vec![note(9, "![](x.png)", true)];
        assert!(stage_assets(&mut notes, &index, &config()).is_empty());
        assert_eq!(notes[0].content, "![](x.png)");
    }
}
