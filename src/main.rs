// loglens - main.rs
//
// CLI entry point. Handles:
// 1. CLI argument parsing
// 2. Logging initialisation (debug mode support)
// 3. Config directory resolution and engine config loading
// 4. Dispatch into the engine (session, analyzers, baseline store)
//
// Exit codes: 0 on clean completion, 1 on fatal failure (unreadable file,
// unwritable config directory, unknown baseline, ...).

use clap::{Parser, Subcommand};
use loglens::app::baseline_store::{BaselineStore, BaselineUpdate};
use loglens::app::folder_search::{search_folder, FolderSearchConfig};
use loglens::app::session::Session;
use loglens::core::baseline::{build_fingerprint, compare_fingerprints};
use loglens::core::columns::analyze_with_columns;
use loglens::core::drain::{analyze_with_drain, DrainConfig};
use loglens::core::export::{export_csv, export_json};
use loglens::core::filter::{FilterConfig, FilterPattern};
use loglens::core::model::Level;
use loglens::core::search::{SearchFlavor, SearchOptions};
use loglens::platform::config::{EngineConfig, PlatformPaths};
use loglens::util::cancel::CancelToken;
use loglens::util::error::{EngineError, Result};
use loglens::util::{constants, logging};
use std::path::PathBuf;

/// loglens - interactive log analysis engine.
///
/// Index huge log files for random access, search and filter them, mine
/// structural patterns, and compare runs against saved baselines.
#[derive(Parser, Debug)]
#[command(name = "loglens", version, about)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug", global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Index a file and print its metadata.
    Info { file: PathBuf },

    /// Print a line range from an indexed file.
    Lines {
        file: PathBuf,

        /// First line (0-based).
        #[arg(long, default_value_t = 0)]
        start: u64,

        #[arg(long, default_value_t = 20)]
        count: u64,
    },

    /// Search a file (or a folder with --folder) for a pattern.
    Search {
        target: PathBuf,
        pattern: String,

        /// Interpret the pattern as a regular expression.
        #[arg(long, conflicts_with = "wildcard")]
        regex: bool,

        /// Interpret the pattern as a glob-style wildcard.
        #[arg(long)]
        wildcard: bool,

        #[arg(long)]
        match_case: bool,

        #[arg(long)]
        whole_word: bool,

        /// Treat the target as a directory and scan every log file in it.
        #[arg(long)]
        folder: bool,
    },

    /// Run a pattern analyzer over a file.
    Analyze {
        file: PathBuf,

        /// Analyzer: "columns" or "drain".
        #[arg(long, default_value = "columns")]
        analyzer: String,
    },

    /// Apply a filter and print the visible lines.
    Filter {
        file: PathBuf,

        /// Levels to keep (error, warning, info, debug, trace).
        #[arg(long = "level")]
        levels: Vec<String>,

        /// Include patterns (a line passes if it matches any).
        #[arg(long = "include")]
        includes: Vec<String>,

        /// Exclude patterns (matching lines are removed).
        #[arg(long = "exclude")]
        excludes: Vec<String>,

        #[arg(long, default_value_t = 0)]
        context: u64,

        /// Print at most this many visible lines.
        #[arg(long, default_value_t = 100)]
        limit: u64,
    },

    /// Export a line range to CSV or JSON.
    Export {
        file: PathBuf,

        /// Output format: "csv" or "json".
        #[arg(long, default_value = "csv")]
        format: String,

        #[arg(long)]
        out: PathBuf,
    },

    /// Manage saved baselines.
    Baseline {
        #[command(subcommand)]
        command: BaselineCommand,
    },
}

#[derive(Subcommand, Debug)]
enum BaselineCommand {
    /// Analyze a file and save its fingerprint under a name.
    Save {
        file: PathBuf,

        #[arg(long)]
        name: String,

        #[arg(long, default_value = "")]
        description: String,

        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Analyzer feeding the fingerprint: "columns" or "drain".
        #[arg(long, default_value = "columns")]
        analyzer: String,
    },

    /// List saved baselines.
    List,

    /// Rename or re-describe a baseline.
    Update {
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },

    /// Compare a file against a saved baseline.
    Compare { file: PathBuf, baseline_id: String },

    /// Delete a baseline.
    Delete { id: String },
}

fn main() {
    let cli = Cli::parse();

    let paths = PlatformPaths::resolve();
    let config = EngineConfig::load(&paths.config_dir);
    logging::init(cli.debug, config.log_level.as_deref());

    tracing::info!(
        version = constants::APP_VERSION,
        debug = cli.debug,
        "loglens starting"
    );

    if let Err(e) = run(cli.command, &paths, &config) {
        if !e.is_cancelled() {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {e}");
        }
        std::process::exit(1);
    }
}

fn run(command: CliCommand, paths: &PlatformPaths, config: &EngineConfig) -> Result<()> {
    let cancel = CancelToken::new();
    match command {
        CliCommand::Info { file } => {
            let mut session = Session::new();
            let info = session.open_file(&file, &cancel, None)?;
            println!("{}", to_json(&info)?);
        }

        CliCommand::Lines { file, start, count } => {
            let mut session = Session::new();
            session.open_file(&file, &cancel, None)?;
            for record in session.get_lines(&file, start, count)? {
                println!("{:>8}  {}", record.line_number, record.text);
            }
        }

        CliCommand::Search {
            target,
            pattern,
            regex,
            wildcard,
            match_case,
            whole_word,
            folder,
        } => {
            let options = SearchOptions {
                pattern,
                flavor: if regex {
                    SearchFlavor::Regex
                } else if wildcard {
                    SearchFlavor::Wildcard
                } else {
                    SearchFlavor::Literal
                },
                match_case,
                whole_word,
                ..Default::default()
            };
            if folder {
                let mut folder_config = FolderSearchConfig::default();
                if let Some(max_files) = config.folder_search_max_files {
                    folder_config.max_files = max_files;
                }
                let matches = search_folder(&target, &options, &folder_config, &cancel)?;
                for m in &matches {
                    println!(
                        "{}:{}:{}:{}",
                        m.file.display(),
                        m.line_number + 1,
                        m.column + 1,
                        m.text
                    );
                }
                eprintln!("{} match(es)", matches.len());
            } else {
                let mut session = Session::new();
                session.open_file(&target, &cancel, None)?;
                let outcome = session.search(&target, &options, &cancel, None)?;
                for m in &outcome.matches {
                    println!(
                        "{}:{}:{}",
                        m.line_number + 1,
                        m.column + 1,
                        m.line_text_snippet
                    );
                }
                if outcome.truncated {
                    eprintln!(
                        "Match limit of {} reached; further matches dropped",
                        constants::MAX_SEARCH_MATCHES
                    );
                }
                eprintln!("{} match(es)", outcome.matches.len());
            }
        }

        CliCommand::Analyze { file, analyzer } => {
            let mut session = Session::new();
            session.open_file(&file, &cancel, None)?;
            let view = session.view(&file)?;
            match analyzer.as_str() {
                "columns" => {
                    let report = analyze_with_columns(view, &cancel, None)?;
                    println!("{}", to_json(&report.result)?);
                }
                "drain" => {
                    let report = analyze_with_drain(view, DrainConfig::default(), &cancel, None)?;
                    for cluster in report.clusters.iter().take(50) {
                        println!("{:>8}  {}", cluster.count, cluster.template_text());
                    }
                    println!("{}", to_json(&report.result)?);
                }
                other => {
                    return Err(EngineError::invalid(format!(
                        "unknown analyzer '{other}' (expected 'columns' or 'drain')"
                    )))
                }
            }
        }

        CliCommand::Filter {
            file,
            levels,
            includes,
            excludes,
            context,
            limit,
        } => {
            let mut parsed_levels = std::collections::HashSet::new();
            for name in &levels {
                let level = Level::parse(name)
                    .ok_or_else(|| EngineError::invalid(format!("unknown level '{name}'")))?;
                parsed_levels.insert(level);
            }
            let filter = FilterConfig {
                levels: parsed_levels,
                include_patterns: includes.into_iter().map(FilterPattern::new).collect(),
                exclude_patterns: excludes.into_iter().map(FilterPattern::new).collect(),
                context_lines: if context > 0 {
                    context
                } else {
                    config.context_lines.unwrap_or(0)
                },
                advanced: None,
            };
            let mut session = Session::new();
            session.open_file(&file, &cancel, None)?;
            let projection = session.apply_filter(&file, filter, &cancel, None)?;
            eprintln!("{} visible line(s)", projection.len());
            for record in session.get_lines(&file, 0, limit)? {
                println!("{:>8}  {}", record.line_number, record.text);
            }
        }

        CliCommand::Export { file, format, out } => {
            let mut session = Session::new();
            let info = session.open_file(&file, &cancel, None)?;
            let records = session.get_lines(&file, 0, info.total_lines)?;
            let writer = std::fs::File::create(&out)
                .map_err(|e| EngineError::io(&out, "create", e))?;
            let count = match format.as_str() {
                "csv" => export_csv(&records, writer, &out)?,
                "json" => export_json(&records, writer, &out)?,
                other => {
                    return Err(EngineError::invalid(format!(
                        "unknown export format '{other}' (expected 'csv' or 'json')"
                    )))
                }
            };
            eprintln!("Exported {count} line(s) to {}", out.display());
        }

        CliCommand::Baseline { command } => {
            paths
                .ensure_config_dir()
                .map_err(|e| EngineError::io(&paths.config_dir, "create_dir", e))?;
            let mut store = BaselineStore::open(&paths.config_dir)?;
            run_baseline(command, &mut store, &cancel)?;
        }
    }
    Ok(())
}

fn run_baseline(
    command: BaselineCommand,
    store: &mut BaselineStore,
    cancel: &CancelToken,
) -> Result<()> {
    match command {
        BaselineCommand::Save {
            file,
            name,
            description,
            tags,
            analyzer,
        } => {
            let mut session = Session::new();
            session.open_file(&file, cancel, None)?;
            let view = session.view(&file)?;
            let analysis = match analyzer.as_str() {
                "columns" => analyze_with_columns(view, cancel, None)?.result,
                "drain" => analyze_with_drain(view, DrainConfig::default(), cancel, None)?.result,
                other => {
                    return Err(EngineError::invalid(format!(
                        "unknown analyzer '{other}' (expected 'columns' or 'drain')"
                    )))
                }
            };
            let fingerprint = build_fingerprint(view, &analysis, cancel, None)?;
            let id = store.save(&name, &description, tags, fingerprint)?;
            println!("{id}");
        }

        BaselineCommand::List => {
            for summary in store.list() {
                println!(
                    "{}  {}  {} lines  {}",
                    summary.id,
                    summary.created_at.format("%Y-%m-%d %H:%M"),
                    summary.total_lines,
                    summary.name
                );
            }
        }

        BaselineCommand::Update {
            id,
            name,
            description,
        } => {
            store.update(
                &id,
                BaselineUpdate {
                    name,
                    description,
                    tags: None,
                },
            )?;
        }

        BaselineCommand::Compare { file, baseline_id } => {
            let mut session = Session::new();
            session.open_file(&file, cancel, None)?;
            let view = session.view(&file)?;
            let analysis = analyze_with_columns(view, cancel, None)?.result;
            let current = build_fingerprint(view, &analysis, cancel, None)?;
            let record = store.get(&baseline_id)?;
            let report = compare_fingerprints(&current, &record.fingerprint)?;
            println!("{}", to_json(&report)?);
        }

        BaselineCommand::Delete { id } => {
            store.delete(&id)?;
        }
    }
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| EngineError::InvalidInput {
        message: format!("serialisation failed: {e}"),
    })
}
