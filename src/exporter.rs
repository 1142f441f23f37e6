use crate::assets::{self, StagedAsset};
use crate::importer::{RawAssetRecord, RawNoteRecord};
use crate::mapper;
use crate::reports::{self, DynamicFile};
use crate::utils::{ExportConfig, RunLog};
use crossbeam_channel::bounded;
use eyre::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A note body and where it goes, relative to the export root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteFile {
    pub note_id: i64,
    pub path: PathBuf,
    pub content: String,
}

/// Every byte and path a run will produce, computed before anything touches disk.
#[derive(Debug, Clone, Default)]
pub struct ExportPlan {
    pub notes: Vec<NoteFile>,
    pub assets: Vec<StagedAsset>,
    pub reports: Vec<DynamicFile>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub notes_written: usize,
    pub assets_staged: usize,
    pub reports_written: usize,
    pub failures: usize,
}

/// Run the whole transformation over raw records.
///
/// Fails only on a broken timestamp when `skip_invalid_notes` is off.
pub fn plan_export(
    notes: Vec<RawNoteRecord>,
    assets: &[RawAssetRecord],
    config: &ExportConfig,
    log: &mut RunLog,
) -> Result<ExportPlan> {
    let index = assets::build_asset_index(assets, &config.assets_root);

    let mapped = mapper::map_notes(notes, config, log).wrap_err("Failed to map notes")?;
    let mut kept = mapper::without_excluded_tags(mapped, &config.exclude_tags);
    tracing::info!("{} notes left after tag exclusion", kept.len());

    let staged = assets::stage_assets(&mut kept, &index, config);
    let reports = reports::build_reports(&kept);
    let note_files = dedupe_paths(
        kept.iter()
            .map(|note| NoteFile {
                note_id: note.id,
                path: note.relative_path(&config.index_title),
                content: note.content.clone(),
            })
            .collect(),
        log,
    );
    let note_files = yield_to_reports(note_files, &reports, log);

    Ok(ExportPlan {
        notes: note_files,
        assets: staged,
        reports,
    })
}

/// Destination identity on a case-insensitive filesystem (APFS default).
fn path_key(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}

/// Keep one file per destination. The later note wins, as it would when
/// writing one after another, and the clash is logged.
fn dedupe_paths(files: Vec<NoteFile>, log: &mut RunLog) -> Vec<NoteFile> {
    let mut last_by_path: HashMap<String, usize> = HashMap::new();
    for (i, file) in files.iter().enumerate() {
        if let Some(prev) = last_by_path.insert(path_key(&file.path), i) {
            log.warn(format!(
                "Notes {} ({}) and {} ({}) map to the same file; keeping note {}",
                files[prev].note_id,
                files[prev].path.display(),
                file.note_id,
                file.path.display(),
                file.note_id
            ));
        }
    }
    files
        .into_iter()
        .enumerate()
        .filter(|(i, file)| last_by_path.get(&path_key(&file.path)) == Some(i))
        .map(|(_, file)| file)
        .collect()
}

/// Reports are written after notes, so a note sharing a report's path is dropped.
fn yield_to_reports(
    files: Vec<NoteFile>,
    reports: &[DynamicFile],
    log: &mut RunLog,
) -> Vec<NoteFile> {
    let report_keys: HashMap<String, &Path> = reports
        .iter()
        .map(|r| (path_key(&r.path), r.path.as_path()))
        .collect();
    files
        .into_iter()
        .filter(|file| match report_keys.get(&path_key(&file.path)) {
            Some(report) => {
                log.warn(format!(
                    "Note {} ({}) is replaced by the generated report {}",
                    file.note_id,
                    file.path.display(),
                    report.display()
                ));
                false
            }
            None => true,
        })
        .collect()
}

/// Persist `plan` under `config.export_root`. In dry-run mode nothing is
/// written and the counts describe what would have been.
pub fn write_plan(plan: &ExportPlan, config: &ExportConfig, log: &mut RunLog) -> Result<ExportSummary> {
    if config.dry_run {
        for line in describe_plan(plan, config.verbose) {
            tracing::info!("{}", line);
        }
        return Ok(ExportSummary {
            notes_written: plan.notes.len(),
            assets_staged: plan.assets.len(),
            reports_written: plan.reports.len(),
            failures: 0,
        });
    }

    let root = &config.export_root;
    if config.clean && root.exists() {
        fs::remove_dir_all(root)
            .wrap_err_with(|| format!("Failed to clear export directory: {}", root.display()))?;
    }
    fs::create_dir_all(root)
        .wrap_err_with(|| format!("Failed to create export directory: {}", root.display()))?;

    let mut summary = ExportSummary::default();

    let attachment_dir = root.join(&config.attachment_subdir);
    if !plan.assets.is_empty() {
        fs::create_dir_all(&attachment_dir).wrap_err_with(|| {
            format!(
                "Failed to create attachment directory: {}",
                attachment_dir.display()
            )
        })?;
    }
    for asset in &plan.assets {
        let dest = attachment_dir.join(&asset.file_name);
        match fs::copy(&asset.source, &dest) {
            Ok(_) => summary.assets_staged += 1,
            Err(e) => {
                summary.failures += 1;
                log.error(format!(
                    "Error copying {} (note {}): {}",
                    asset.source.display(),
                    asset.note_id,
                    e
                ));
            }
        }
    }

    let jobs: Vec<(&Path, &str)> = plan
        .notes
        .iter()
        .map(|f| (f.path.as_path(), f.content.as_str()))
        .chain(
            plan.reports
                .iter()
                .map(|r| (r.path.as_path(), r.content.as_str())),
        )
        .collect();

    let pb = make_bar(jobs.len() as u64, config.quiet);
    let failures = write_files(root, &jobs, &pb);
    pb.finish_and_clear();

    let note_count = plan.notes.len();
    let mut note_failures = 0;
    let mut report_failures = 0;
    for (idx, path, err) in failures {
        summary.failures += 1;
        if idx < note_count {
            note_failures += 1;
        } else {
            report_failures += 1;
        }
        log.error(format!("Error writing {}: {:#}", path.display(), err));
    }
    summary.notes_written = note_count - note_failures;
    summary.reports_written = plan.reports.len() - report_failures;

    Ok(summary)
}

/// Dry-run listing: one line per file when verbose, otherwise totals only.
fn describe_plan(plan: &ExportPlan, verbose: bool) -> Vec<String> {
    if !verbose {
        return vec![format!(
            "Would write {} notes and {} reports, and copy {} attachments",
            plan.notes.len(),
            plan.reports.len(),
            plan.assets.len()
        )];
    }
    let notes = plan
        .notes
        .iter()
        .map(|f| format!("Would write {}", f.path.display()));
    let assets = plan
        .assets
        .iter()
        .map(|a| format!("Would copy {} -> {}", a.source.display(), a.file_name));
    let reports = plan
        .reports
        .iter()
        .map(|r| format!("Would write {}", r.path.display()));
    notes.chain(assets).chain(reports).collect()
}

fn make_bar(total: u64, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total);
    if let Ok(style) =
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)")
    {
        bar.set_style(style.progress_chars("=>-"));
    }
    bar
}

/// Write files on a small worker pool. Every path is distinct, so completion
/// order does not affect the result. Returns failures sorted by job index.
fn write_files(
    root: &Path,
    jobs: &[(&Path, &str)],
    pb: &ProgressBar,
) -> Vec<(usize, PathBuf, eyre::Report)> {
    let (tx, rx) = bounded::<usize>(64);
    let failures = Mutex::new(Vec::new());
    let n_workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
        .min(jobs.len().max(1));

    std::thread::scope(|s| {
        for _ in 0..n_workers {
            let rx = rx.clone();
            let failures = &failures;
            s.spawn(move || {
                while let Ok(idx) = rx.recv() {
                    let (rel, content) = jobs[idx];
                    let dest = root.join(rel);
                    if let Err(e) = write_file(&dest, content) {
                        if let Ok(mut f) = failures.lock() {
                            f.push((idx, dest, e));
                        }
                    }
                    pb.inc(1);
                }
            });
        }
        drop(rx);

        for idx in 0..jobs.len() {
            if tx.send(idx).is_err() {
                break;
            }
        }
        drop(tx);
    });

    let mut failures = failures.into_inner().unwrap_or_else(|e| e.into_inner());
    failures.sort_by_key(|(idx, _, _)| *idx);
    failures
}

fn write_file(dest: &Path, content: &str) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .wrap_err_with(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::write(dest, content).wrap_err_with(|| format!("Failed to write: {}", dest.display()))
}

/// The main entry point for the business logic: snapshot, plan, write, report.
pub fn execute(config: ExportConfig) -> Result<()> {
    let snapshot = crate::importer::snapshot_database(&config.db_path, config.quiet)?;
    let conn = crate::importer::open_snapshot(snapshot.path())?;
    let (notes, assets) = crate::importer::load_records(&conn)?;
    drop(conn);

    if !config.quiet {
        eprintln!("Found {} notes and {} attachments.", notes.len(), assets.len());
    }

    let mut log = RunLog::new();
    let plan = plan_export(notes, &assets, &config, &mut log)?;
    let summary = write_plan(&plan, &config, &mut log)?;

    if !config.quiet {
        print_summary(&summary, &log, config.dry_run);
    }
    Ok(())
}

fn print_summary(summary: &ExportSummary, log: &RunLog, dry_run: bool) {
    if !log.is_empty() {
        eprintln!("Warnings and errors, in order:");
        for entry in log.entries() {
            eprintln!("  [{:?}] {}", entry.severity, entry.message);
        }
    }
    let mut line = format!(
        "{}{} notes written, {} attachments staged, {} reports written.",
        if dry_run { "Dry run. " } else { "Done. " },
        summary.notes_written,
        summary.assets_staged,
        summary.reports_written
    );
    if summary.failures > 0 {
        line.push_str(&format!(" Completed with {} error(s).", summary.failures));
    }
    eprintln!("{}", line);
}
