use bear_quartz_export::{ExportConfig, exporter};
use clap::Parser;
use eyre::{Context, Result, eyre};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Export Bear notes to a Markdown folder for Quartz.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory to export markdown files.
    /// Defaults to ~/Desktop/BearExport if not set in config.
    #[arg(value_name = "EXPORT_DIR")]
    export_dir: Option<PathBuf>,

    /// Path to Bear's database.sqlite.
    /// Auto-detected if omitted.
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Path to Bear's "Note Images" directory.
    /// Auto-detected if omitted.
    #[arg(long, value_name = "PATH")]
    assets: Option<PathBuf>,

    /// Path to a specific configuration file.
    /// Defaults to $XDG_CONFIG_HOME/bear-quartz-export/config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Only export notes whose frontmatter has `publish: true`.
    #[arg(long)]
    publish_only: bool,

    /// Compute everything but write nothing.
    #[arg(long)]
    dry_run: bool,

    /// Delete the export directory before writing.
    #[arg(long)]
    clean: bool,

    /// Skip notes with missing dates instead of aborting.
    #[arg(long)]
    skip_invalid: bool,

    /// Copy attachments of unpublished notes too.
    #[arg(long)]
    all_assets: bool,

    /// Log each file written and each policy decision.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress standard output (progress bars, summary).
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct FileConfig {
    export_dir: Option<PathBuf>,
    db_path: Option<PathBuf>,
    assets_path: Option<PathBuf>,
    attachment_subdir: Option<PathBuf>,
    exclude_tags: Option<Vec<String>>,
    treat_as_folders: Option<Vec<String>>,
    ignore_titles: Option<Vec<String>>,
    index_title: Option<String>,
    publish_only: Option<bool>,
    only_stage_published_assets: Option<bool>,
    skip_invalid_notes: Option<bool>,
}

fn load_file_config(explicit_path: Option<&Path>) -> Result<FileConfig> {
    let path = if let Some(p) = explicit_path {
        if !p.exists() {
            return Err(eyre!("Config file not found: {}", p.display()));
        }
        Some(p.to_path_buf())
    } else {
        dirs::config_dir()
            .map(|d| d.join("bear-quartz-export/config.toml"))
            .filter(|p| p.exists())
    };

    match path {
        None => Ok(FileConfig::default()),
        Some(p) => {
            let content = fs::read_to_string(&p)
                .wrap_err_with(|| format!("Failed to read config: {}", p.display()))?;
            toml::from_str(&content)
                .wrap_err_with(|| format!("Failed to parse config: {}", p.display()))
        }
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else if verbose {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    // 1. Load config file (CLI path > default path)
    let file_cfg = load_file_config(cli.config.as_deref())?;
    let defaults = ExportConfig::default();

    // 2. Resolve paths (CLI > Config > Default)
    let export_root = cli
        .export_dir
        .or(file_cfg.export_dir)
        .unwrap_or(defaults.export_root);
    let db_path = cli.db.or(file_cfg.db_path).unwrap_or(defaults.db_path);
    if !db_path.exists() {
        return Err(eyre!(
            "Bear database not found at: {}\nUse --db to specify the path manually.",
            db_path.display()
        ));
    }
    let assets_root = cli
        .assets
        .or(file_cfg.assets_path)
        .unwrap_or(defaults.assets_root);

    // 3. Build the Export Config
    let config = ExportConfig {
        export_root,
        db_path,
        assets_root,
        attachment_subdir: file_cfg
            .attachment_subdir
            .unwrap_or(defaults.attachment_subdir),
        exclude_tags: file_cfg.exclude_tags.unwrap_or(defaults.exclude_tags),
        treat_as_folders: file_cfg
            .treat_as_folders
            .map(|folders| folders.iter().map(|f| f.to_lowercase()).collect())
            .unwrap_or(defaults.treat_as_folders),
        ignore_titles: file_cfg.ignore_titles.unwrap_or(defaults.ignore_titles),
        index_title: file_cfg.index_title.unwrap_or(defaults.index_title),
        publish_only: cli.publish_only || file_cfg.publish_only.unwrap_or(false),
        only_stage_published_assets: !cli.all_assets
            && file_cfg
                .only_stage_published_assets
                .unwrap_or(defaults.only_stage_published_assets),
        dry_run: cli.dry_run,
        clean: cli.clean,
        skip_invalid_notes: cli.skip_invalid || file_cfg.skip_invalid_notes.unwrap_or(false),
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    // 4. Run the Business Logic
    exporter::execute(config)
}
