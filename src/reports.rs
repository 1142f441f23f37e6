//! Auto-updating index pages computed from the whole exported note set.
//!
//! Every report is a [`ReportDescriptor`]: filter, sort key, optional row
//! limit and column layout. The permalinks are referenced from the published
//! site and must never change.

use crate::frontmatter;
use crate::mapper::MappedNote;
use chrono::{DateTime, FixedOffset, Utc};
use std::cmp::Ordering;
use std::path::PathBuf;

const BOOK_FOLDER: &str = "30 External/31 Books";

/// Australia/Brisbane, which has no daylight saving.
const DISPLAY_OFFSET_SECS: i32 = 10 * 3600;

const DATE_FORMAT: &str = "%b %-d, %Y";
const DATE_TIME_FORMAT: &str = "%b %-d, %Y, %-I:%M %p";

/// A generated Markdown document and where it goes, relative to the export root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicFile {
    pub path: PathBuf,
    pub content: String,
}

type DateKey = fn(&MappedNote) -> Option<DateTime<Utc>>;

#[derive(Clone, Copy)]
pub enum Cell {
    /// Thumbnail from frontmatter `thumbnail`, rendered at the given width.
    Cover(u32),
    /// `[[title]]` wikilink.
    Title,
    Date(DateKey, &'static str),
}

#[derive(Clone, Copy)]
pub struct Column {
    pub header: &'static str,
    /// Separator cell, including alignment colons.
    pub rule: &'static str,
    pub cell: Cell,
}

pub struct ReportDescriptor {
    pub heading: &'static str,
    /// Output path without the `.md` extension.
    pub path: &'static str,
    pub permalink: &'static str,
    pub filter: fn(&MappedNote) -> bool,
    /// Rows are sorted by this key, most recent first.
    pub sort_key: DateKey,
    pub limit: Option<usize>,
    pub columns: &'static [Column],
}

fn frontmatter_date(note: &MappedNote, key: &str) -> Option<DateTime<Utc>> {
    note.frontmatter
        .get(key)
        .and_then(frontmatter::parse_date_value)
}

fn read_date(note: &MappedNote) -> Option<DateTime<Utc>> {
    frontmatter_date(note, "read")
}

fn started_date(note: &MappedNote) -> Option<DateTime<Utc>> {
    frontmatter_date(note, "started")
}

fn modified_date(note: &MappedNote) -> Option<DateTime<Utc>> {
    Some(note.modified)
}

fn created_date(note: &MappedNote) -> Option<DateTime<Utc>> {
    Some(note.created)
}

fn is_published_book(note: &MappedNote) -> bool {
    note.folder.starts_with(BOOK_FOLDER) && note.is_published()
}

fn books_read(note: &MappedNote) -> bool {
    is_published_book(note) && frontmatter::is_truthy(note.frontmatter.get("read"))
}

fn books_reading(note: &MappedNote) -> bool {
    is_published_book(note) && note.content.contains("#book/currently-reading")
}

fn books_to_read(note: &MappedNote) -> bool {
    is_published_book(note) && note.content.contains("#book/to-read")
}

fn published(note: &MappedNote) -> bool {
    note.is_published()
}

const fn cover(width: u32) -> Column {
    Column {
        header: "Cover",
        rule: ":---------------",
        cell: Cell::Cover(width),
    }
}

const TITLE_CENTERED: Column = Column {
    header: "Title",
    rule: ":------------------:",
    cell: Cell::Title,
};

const NOTE: Column = Column {
    header: "Note",
    rule: ":---------------",
    cell: Cell::Title,
};

pub const REPORTS: &[ReportDescriptor] = &[
    ReportDescriptor {
        heading: "Books Read (Auto-Updating)",
        path: "60 Outputs/Books Read (Auto-Updating)",
        permalink: "dn7aBKbWWW931tT8DQSvRu",
        filter: books_read,
        sort_key: read_date,
        limit: None,
        columns: &[
            cover(80),
            TITLE_CENTERED,
            Column {
                header: "Read",
                rule: ":-----------------",
                cell: Cell::Date(read_date, DATE_FORMAT),
            },
        ],
    },
    ReportDescriptor {
        heading: "Currently Reading (Auto-Updating)",
        path: "60 Outputs/Currently Reading (Auto-Updating)",
        permalink: "rEcyrvGqKjvf4D7dB3ketR",
        filter: books_reading,
        sort_key: started_date,
        limit: None,
        columns: &[cover(60), TITLE_CENTERED],
    },
    ReportDescriptor {
        heading: "Recently read",
        path: "60 Outputs/Recently read",
        permalink: "uktgERNWudD3eZ4fcwdUry",
        filter: books_read,
        sort_key: read_date,
        limit: Some(5),
        columns: &[
            cover(50),
            Column {
                header: "Title",
                rule: ":------------------",
                cell: Cell::Title,
            },
            Column {
                header: "Read",
                rule: ":------------------:",
                cell: Cell::Date(read_date, DATE_FORMAT),
            },
        ],
    },
    ReportDescriptor {
        heading: "Recently edited",
        path: "60 Outputs/Recently edited",
        permalink: "oskqEgv91u4hJnQBUfx2u4",
        filter: published,
        sort_key: modified_date,
        limit: Some(7),
        columns: &[
            NOTE,
            Column {
                header: "Modified",
                rule: ":------------------:",
                cell: Cell::Date(modified_date, DATE_TIME_FORMAT),
            },
        ],
    },
    ReportDescriptor {
        heading: "Recent new files",
        path: "60 Outputs/Recent new files",
        permalink: "4domq73qZGB6ySfhcoZXhr",
        filter: published,
        sort_key: created_date,
        limit: Some(7),
        columns: &[
            NOTE,
            Column {
                header: "Added",
                rule: ":------------------:",
                cell: Cell::Date(created_date, DATE_TIME_FORMAT),
            },
        ],
    },
    ReportDescriptor {
        heading: "Want to Read (Auto-Updating)",
        path: "60 Outputs/Want to Read (Auto-Updating)",
        permalink: "Hn3pWkq8ZcY2xRvTb6mJsA",
        filter: books_to_read,
        sort_key: created_date,
        limit: None,
        columns: &[
            cover(60),
            TITLE_CENTERED,
            Column {
                header: "Added",
                rule: ":-----------------",
                cell: Cell::Date(created_date, DATE_FORMAT),
            },
        ],
    },
];

/// Format a timestamp for display in Brisbane time.
pub fn display_date(date: Option<DateTime<Utc>>, format: &str) -> String {
    let Some(offset) = FixedOffset::east_opt(DISPLAY_OFFSET_SECS) else {
        return String::new();
    };
    date.map(|d| d.with_timezone(&offset).format(format).to_string())
        .unwrap_or_default()
}

/// Most recent first; undated notes sink to the bottom in input order.
fn newest_first(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn render_cell(cell: &Cell, note: &MappedNote) -> String {
    match cell {
        Cell::Cover(width) => note
            .frontmatter
            .get("thumbnail")
            .filter(|v| frontmatter::is_truthy(Some(*v)))
            .map(|v| {
                let url = match v {
                    serde_yaml::Value::String(s) => s.clone(),
                    other => serde_yaml::to_string(other)
                        .map(|s| s.trim_end().to_string())
                        .unwrap_or_default(),
                };
                format!("![thumb\\|{}]({})", width, url)
            })
            .unwrap_or_default(),
        Cell::Title => format!("[[{}]]", note.title),
        Cell::Date(key, format) => display_date(key(note), format),
    }
}

impl ReportDescriptor {
    /// Notes this report lists, filtered, sorted and truncated.
    pub fn select<'a>(&self, notes: &'a [MappedNote]) -> Vec<&'a MappedNote> {
        let mut rows: Vec<&MappedNote> = notes.iter().filter(|n| (self.filter)(n)).collect();
        rows.sort_by(|a, b| newest_first((self.sort_key)(a), (self.sort_key)(b)));
        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
        rows
    }

    pub fn render_table(&self, rows: &[&MappedNote]) -> String {
        let header = format!(
            "| {} |",
            self.columns
                .iter()
                .map(|c| c.header)
                .collect::<Vec<_>>()
                .join(" | ")
        );
        let separator = format!(
            "| {} |",
            self.columns
                .iter()
                .map(|c| c.rule)
                .collect::<Vec<_>>()
                .join(" | ")
        );
        let mut lines = vec![header, separator];
        if rows.is_empty() {
            lines.push(format!("|{}", " |".repeat(self.columns.len())));
        }
        for note in rows {
            let cells: Vec<String> = self
                .columns
                .iter()
                .map(|c| render_cell(&c.cell, note))
                .collect();
            lines.push(format!("| {} |", cells.join(" | ")));
        }
        lines.join("\n")
    }

    pub fn build(&self, notes: &[MappedNote]) -> DynamicFile {
        let rows = self.select(notes);
        let content = format!(
            "---\npublish: true\npermalink: {}\n---\n\n# {}\n\n{}",
            self.permalink,
            self.heading,
            self.render_table(&rows)
        );
        DynamicFile {
            path: PathBuf::from(format!("{}.md", self.path)),
            content,
        }
    }
}

/// Build every report from the final note set.
pub fn build_reports(notes: &[MappedNote]) -> Vec<DynamicFile> {
    REPORTS.iter().map(|report| report.build(notes)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontmatter::Frontmatter;
    use chrono::{Duration, TimeZone};
    use serde_yaml::Value;

    fn note(id: i64, folder: &str, content: &str, fm: &[(&str, Value)]) -> MappedNote {
        let frontmatter: Frontmatter = fm
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 2, 30, 0).unwrap();
        MappedNote {
            content: content.to_string(),
            title: format!("Note {}", id),
            tags: vec![],
            id,
            folder: folder.to_string(),
            frontmatter,
            created: base + Duration::days(id),
            modified: base + Duration::hours(id),
        }
    }

    fn report(permalink: &str) -> &'static ReportDescriptor {
        REPORTS.iter().find(|r| r.permalink == permalink).unwrap()
    }

    fn published() -> (&'static str, Value) {
        ("publish", Value::Bool(true))
    }

    #[test]
    fn test_six_reports_with_unique_permalinks() {
        assert_eq!(REPORTS.len(), 6);
        let mut permalinks: Vec<&str> = REPORTS.iter().map(|r| r.permalink).collect();
        permalinks.sort();
        permalinks.dedup();
        assert_eq!(permalinks.len(), 6);
    }

    #[test]
    fn test_recently_edited_keeps_seven_newest() {
        let notes: Vec<MappedNote> = (1..=9).map(|id| note(id, "", "", &[published()])).collect();
        let edited = report("oskqEgv91u4hJnQBUfx2u4");
        let rows = edited.select(&notes);
        let ids: Vec<i64> = rows.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![9, 8, 7, 6, 5, 4, 3]);

        let file = edited.build(&notes);
        let table_rows = file
            .content
            .lines()
            .filter(|l| l.starts_with("| [[Note"))
            .count();
        assert_eq!(table_rows, 7);
        assert_eq!(file.path, PathBuf::from("60 Outputs/Recently edited.md"));
    }

    #[test]
    fn test_header_and_date_cells() {
        let notes = vec![note(1, "", "", &[published()])];
        let file = report("oskqEgv91u4hJnQBUfx2u4").build(&notes);
        // modified = 2024-05-01T03:30Z, shown in UTC+10
        assert_eq!(
            file.content,
            "---\npublish: true\npermalink: oskqEgv91u4hJnQBUfx2u4\n---\n\n# Recently edited\n\n\
             | Note | Modified |\n\
             | :--------------- | :------------------: |\n\
             | [[Note 1]] | May 1, 2024, 1:30 PM |"
        );
    }

    #[test]
    fn test_unpublished_notes_are_left_out() {
        let notes = vec![note(1, "", "", &[]), note(2, "", "", &[published()])];
        let rows = report("4domq73qZGB6ySfhcoZXhr").select(&notes);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, 2);
    }

    #[test]
    fn test_books_read_filters_and_sorts_by_read_date() {
        let books = "30 External/31 Books";
        let notes = vec![
            note(1, books, "", &[published(), ("read", Value::from("2023-01-10"))]),
            note(2, books, "", &[published(), ("read", Value::from("2024-03-02"))]),
            note(3, books, "", &[published()]),
            note(4, "50 Slipbox", "", &[published(), ("read", Value::from("2024-06-01"))]),
            note(5, books, "", &[("read", Value::from("2024-06-01"))]),
            note(
                6,
                "30 External/31 Books/Fiction",
                "",
                &[
                    published(),
                    ("read", Value::from("2022-12-31")),
                    ("thumbnail", Value::from("https://covers.example/6.jpg")),
                ],
            ),
        ];
        let read = report("dn7aBKbWWW931tT8DQSvRu");
        let ids: Vec<i64> = read.select(&notes).iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![2, 1, 6]);

        let content = read.build(&notes).content;
        assert!(content.contains("| ![thumb\\|80](https://covers.example/6.jpg) | [[Note 6]] | Dec 31, 2022 |"));
        assert!(content.contains("|  | [[Note 2]] | Mar 2, 2024 |"));
    }

    #[test]
    fn test_unparseable_read_date_renders_empty_cell() {
        let notes = vec![note(
            1,
            "30 External/31 Books",
            "",
            &[published(), ("read", Value::from("last summer"))],
        )];
        let content = report("uktgERNWudD3eZ4fcwdUry").build(&notes).content;
        assert!(content.ends_with("|  | [[Note 1]] |  |"));
    }

    #[test]
    fn test_recently_read_truncates_to_five() {
        let notes: Vec<MappedNote> = (1..=8)
            .map(|id| {
                note(
                    id,
                    "30 External/31 Books",
                    "",
                    &[published(), ("read", Value::from(format!("2024-01-{:02}", id)))],
                )
            })
            .collect();
        let ids: Vec<i64> = report("uktgERNWudD3eZ4fcwdUry")
            .select(&notes)
            .iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec![8, 7, 6, 5, 4]);
    }

    #[test]
    fn test_currently_reading_uses_content_tag() {
        let books = "30 External/31 Books";
        let notes = vec![
            note(1, books, "#book/currently-reading", &[published(), ("started", Value::from("2024-01-01"))]),
            note(2, books, "#book/currently-reading", &[published(), ("started", Value::from("2024-02-01"))]),
            note(3, books, "#book/read", &[published()]),
        ];
        let ids: Vec<i64> = report("rEcyrvGqKjvf4D7dB3ketR")
            .select(&notes)
            .iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn test_empty_report_has_placeholder_row() {
        let content = report("rEcyrvGqKjvf4D7dB3ketR").build(&[]).content;
        assert!(content.ends_with("| :--------------- | :------------------: |\n| | |"));
        let content = report("dn7aBKbWWW931tT8DQSvRu").build(&[]).content;
        assert!(content.ends_with("\n| | | |"));
    }

    #[test]
    fn test_undated_rows_sort_last_in_input_order() {
        assert_eq!(newest_first(None, None), Ordering::Equal);
        let d = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(newest_first(Some(d), None), Ordering::Less);
        assert_eq!(newest_first(None, Some(d)), Ordering::Greater);
    }
}
