//! Bear tag grammar: folder tags (`#NN Name/Sub#`) and inline tags (`#word/sub`).
//!
//! Folder resolution, marker stripping and inline-tag extraction are kept
//! as separate pure functions; callers decide what to log and when to
//! rewrite content.

use regex::Regex;
use std::path::{Component, Path};
use std::sync::LazyLock;

/// `#`, two digits, then anything up to the nearest closing `#` on the same line.
static FOLDER_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([0-9]{2}.+?)#").unwrap());

/// Tail of a multi-word folder tag, e.g. ` Journals#` after `#10`.
static FOLDER_TAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[/ A-Za-z0-9_]+[A-Za-z0-9_]#").unwrap());

/// A folder-tag match accepted against the configured roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderCandidate {
    /// Text between the `#` markers, exactly as it appears in the body.
    pub raw: String,
    /// Folder path: `raw` without Bear's backslash escapes.
    pub folder: String,
}

impl FolderCandidate {
    /// The literal marker in the body, including both `#`.
    pub fn marker(&self) -> String {
        format!("#{}#", self.raw)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderResolution {
    /// Every accepted candidate, in body order.
    pub candidates: Vec<FolderCandidate>,
    /// Root matches whose path would leave the export root (`..`, `.`, empty segments).
    pub rejected: Vec<FolderCandidate>,
}

impl FolderResolution {
    /// First candidate in body order.
    pub fn selected(&self) -> Option<&FolderCandidate> {
        self.candidates.first()
    }

    pub fn folder(&self) -> &str {
        self.selected().map(|c| c.folder.as_str()).unwrap_or("")
    }

    pub fn is_ambiguous(&self) -> bool {
        self.candidates.len() > 1
    }
}

/// Folder-tag matches in `body` that belong to one of `roots`.
///
/// A match is kept when its unescaped, lowercased text equals a root or the
/// root is a prefix of it with a trailing `/` appended (so
/// `30 External/31 Books` belongs to root `30 external`).
pub fn folder_candidates(body: &str, roots: &[String]) -> Vec<FolderCandidate> {
    FOLDER_TAG_RE
        .captures_iter(body)
        .filter_map(|cap| cap.get(1))
        .map(|m| FolderCandidate {
            raw: m.as_str().to_string(),
            folder: m.as_str().replace('\\', ""),
        })
        .filter(|candidate| {
            let lower = candidate.folder.to_lowercase();
            let with_slash = format!("{}/", lower);
            roots.iter().any(|root| {
                let root = root.to_lowercase();
                with_slash.starts_with(&root) || lower == root
            })
        })
        .collect()
}

/// True when `folder` is a plain relative path: every segment a normal name.
pub fn is_contained_folder(folder: &str) -> bool {
    folder
        .split('/')
        .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
        && Path::new(folder)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

pub fn resolve_folder(body: &str, roots: &[String]) -> FolderResolution {
    let (candidates, rejected) = folder_candidates(body, roots)
        .into_iter()
        .partition(|c| is_contained_folder(&c.folder));
    FolderResolution {
        candidates,
        rejected,
    }
}

/// Remove every occurrence of the candidate's marker from `body`, along
/// with one adjacent newline (trailing preferred, else leading).
pub fn strip_folder_marker(body: &str, candidate: &FolderCandidate) -> String {
    let marker = candidate.marker();
    let mut out = String::with_capacity(body.len());
    let mut rest = body;
    while let Some(idx) = rest.find(&marker) {
        let before = &rest[..idx];
        let after = &rest[idx + marker.len()..];
        if let Some(after) = after.strip_prefix('\n') {
            out.push_str(before);
            rest = after;
        } else {
            out.push_str(before.strip_suffix('\n').unwrap_or(before));
            rest = after;
        }
    }
    out.push_str(rest);
    out
}

fn is_tag_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'/' | b'-')
}

/// Inline tags (`#name`, `#name/sub`, `#v1.2`) in body order, duplicates kept.
///
/// A candidate is rejected when what follows it looks like the remainder of a
/// folder tag; shorter candidates at the same `#` are then tried, longest
/// first, so `#ab.cd ef#` still yields `ab`.
///
/// Worst case is quadratic in the length of a single line (a long tag run
/// followed by a folder tail); note lines are short enough for this to be moot.
pub fn extract_inline_tags(body: &str) -> Vec<String> {
    let bytes = body.as_bytes();
    let mut tags = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        if bytes[pos] != b'#' {
            pos += 1;
            continue;
        }
        let start = pos + 1;
        let run = bytes[start..]
            .iter()
            .take_while(|&&b| is_tag_byte(b))
            .count();

        let mut matched = None;
        'lengths: for len in (1..=run).rev() {
            let tag_end = start + len;
            let trailing_ws = matches!(bytes.get(tag_end), Some(b' ' | b'\n'));
            let ends: &[usize] = if trailing_ws {
                &[tag_end + 1, tag_end]
            } else {
                &[tag_end]
            };
            for &end in ends {
                // The tail class has no newline, so one line is all it can see.
                let line_end = body[end..].find('\n').map_or(body.len(), |i| end + i);
                if !FOLDER_TAIL_RE.is_match(&body[end..line_end]) {
                    matched = Some((tag_end, end));
                    break 'lengths;
                }
            }
        }

        match matched {
            Some((tag_end, end)) => {
                tags.push(body[start..tag_end].to_string());
                pos = end;
            }
            None => pos += 1,
        }
    }
    tags
}
