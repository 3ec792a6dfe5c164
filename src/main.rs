use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use similar::{ChangeTag, TextDiff};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Dispatch;
use tracing_subscriber::EnvFilter;
use treekeep::config::{load_from_path, load_or_default};
use treekeep::ts::language::{extensions, from_extension, language_name, resolve};
use treekeep::ts::{CompiledQuery, ExecutionStats, LanguageParser, ParserBackend, QueryMatch};
use treekeep::{AstEngine, EngineLog, Position, SupportLang, SyntaxTree};
use walkdir::WalkDir;

const DEFAULT_CONFIG: &str = "treekeep.toml";

#[derive(Parser)]
#[command(name = "treekeep")]
#[command(about = "Incremental tree-sitter parsing, editing and structural queries", long_about = None)]
#[command(version)]
struct Cli {
    /// Engine config (defaults to ./treekeep.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the syntax tree of a file and any syntax errors
    Parse {
        file: PathBuf,

        /// Language name (inferred from the extension if omitted)
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Run a registered or ad-hoc pattern against a file
    Query {
        file: PathBuf,

        /// Name of a registered pattern, e.g. `function`
        #[arg(short, long, conflicts_with = "source")]
        pattern: Option<String>,

        /// Ad-hoc pattern source, e.g. `(identifier) @id`
        #[arg(short, long)]
        source: Option<String>,

        #[arg(short, long)]
        language: Option<String>,

        #[arg(long)]
        match_limit: Option<u32>,

        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Emit matches and stats as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replace text at a position, reparse, and show the diff
    Edit {
        file: PathBuf,

        /// 1-based line of the text to replace
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        line: u64,

        /// 1-based byte column of the text to replace
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        column: u64,

        #[arg(long)]
        old: String,

        #[arg(long)]
        new: String,

        #[arg(short, long)]
        language: Option<String>,

        /// Write the result back to the file
        #[arg(short, long)]
        write: bool,
    },

    /// Validate every source file under a directory
    Check {
        dir: PathBuf,

        /// Only check files of this language
        #[arg(short, long)]
        language: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let log = init_logging();
    let engine = build_engine(cli.config.as_deref(), log)?;

    match cli.command {
        Commands::Parse { file, language } => cmd_parse(engine, &file, language.as_deref()),
        Commands::Query {
            file,
            pattern,
            source,
            language,
            match_limit,
            timeout_ms,
            json,
        } => cmd_query(
            engine,
            &file,
            QueryArgs {
                pattern,
                source,
                language,
                match_limit,
                timeout_ms,
                json,
            },
        ),
        Commands::Edit {
            file,
            line,
            column,
            old,
            new,
            language,
            write,
        } => {
            let start = Position::new(line as usize - 1, column as usize - 1);
            cmd_edit(engine, &file, start, &old, &new, language.as_deref(), write)
        }
        Commands::Check { dir, language } => cmd_check(engine, &dir, language.as_deref()),
    }
}

/// Log to stderr, filtered by `TREEKEEP_LOG` (default `warn`).
fn init_logging() -> EngineLog {
    let filter = EnvFilter::try_from_env("TREEKEEP_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    EngineLog::new(Dispatch::new(subscriber))
}

fn build_engine(config: Option<&Path>, log: EngineLog) -> Result<AstEngine> {
    let config = match config {
        Some(path) => load_from_path(path)?,
        None => load_or_default(DEFAULT_CONFIG)?,
    };
    Ok(AstEngine::from_config(&config, log)?)
}

fn detect_language(file: &Path, explicit: Option<&str>) -> Result<SupportLang> {
    if let Some(name) = explicit {
        return Ok(resolve(name)?);
    }
    file.extension()
        .and_then(|ext| ext.to_str())
        .and_then(from_extension)
        .with_context(|| {
            format!(
                "cannot infer language for {}; pass --language",
                file.display()
            )
        })
}

fn read_source(file: &Path) -> Result<String> {
    fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))
}

fn file_id(file: &Path) -> String {
    file.display().to_string()
}

fn cmd_parse(mut engine: AstEngine, file: &Path, language: Option<&str>) -> Result<()> {
    let language = detect_language(file, language)?;
    let source = read_source(file)?;
    let id = file_id(file);
    let _ = engine.open(&id, &source, language)?;

    if let Some(tree) = engine.tree(&id) {
        print!("{}", tree.render());
    }

    println!();
    match engine.validate(&id) {
        Some((true, _)) => println!("{} no syntax errors", "✓".green()),
        Some((false, messages)) => {
            for message in messages {
                eprintln!("{} {}", "✗".red(), message);
            }
        }
        None => bail!("{} was not cached", id),
    }
    Ok(())
}

struct QueryArgs {
    pattern: Option<String>,
    source: Option<String>,
    language: Option<String>,
    match_limit: Option<u32>,
    timeout_ms: Option<u64>,
    json: bool,
}

#[derive(Serialize)]
struct QueryReport<'a> {
    file: String,
    language: String,
    matches: Vec<MatchReport>,
    stats: &'a ExecutionStats,
}

#[derive(Serialize)]
struct MatchReport {
    pattern_index: usize,
    captures: BTreeMap<String, Vec<CaptureReport>>,
}

#[derive(Serialize)]
struct CaptureReport {
    kind: String,
    text: String,
    start: Position,
    end: Position,
    start_byte: usize,
    end_byte: usize,
}

fn match_report(tree: &SyntaxTree, m: &QueryMatch<'_>) -> MatchReport {
    let captures = m
        .captures
        .iter()
        .map(|(name, nodes)| {
            let reports = nodes
                .iter()
                .map(|node| CaptureReport {
                    kind: node.kind().to_string(),
                    text: tree.text(*node).into_owned(),
                    start: node.start_position().into(),
                    end: node.end_position().into(),
                    start_byte: node.start_byte(),
                    end_byte: node.end_byte(),
                })
                .collect();
            (name.clone(), reports)
        })
        .collect();
    MatchReport {
        pattern_index: m.pattern_index,
        captures,
    }
}

fn cmd_query(mut engine: AstEngine, file: &Path, args: QueryArgs) -> Result<()> {
    let language = detect_language(file, args.language.as_deref())?;
    let source = read_source(file)?;
    let tree = LanguageParser::new(language)?
        .parse(source.as_bytes(), None)
        .context("parser produced no tree")?;

    let mut adhoc: CompiledQuery;
    let query: &mut CompiledQuery = match (&args.pattern, &args.source) {
        (_, Some(pattern_source)) => {
            adhoc = engine.compile(pattern_source, language)?;
            &mut adhoc
        }
        (Some(name), None) => engine
            .registry_mut()
            .get_mut(language, name)
            .with_context(|| {
                format!(
                    "no pattern named `{name}` for {}",
                    language_name(language)
                )
            })?,
        (None, None) => bail!("pass --pattern NAME or --source PATTERN"),
    };

    if args.match_limit.is_some() || args.timeout_ms.is_some() {
        let mut settings = query.settings().clone();
        if let Some(limit) = args.match_limit {
            settings.match_limit = Some(limit);
        }
        if let Some(ms) = args.timeout_ms {
            settings.timeout = Some(Duration::from_millis(ms));
        }
        query.configure(settings);
    }

    let matches = query.execute(&tree);
    let reports: Vec<MatchReport> = matches.iter().map(|m| match_report(&tree, m)).collect();
    let stats = query.get_query_stats();

    if args.json {
        let report = QueryReport {
            file: file_id(file),
            language: language_name(language),
            matches: reports,
            stats,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for (idx, report) in reports.iter().enumerate() {
        println!(
            "{} match {} (pattern {})",
            "●".cyan(),
            idx + 1,
            report.pattern_index
        );
        for (name, captures) in &report.captures {
            for capture in captures {
                let first_line = capture.text.lines().next().unwrap_or_default();
                println!(
                    "  @{} {} [{}] {}",
                    name.bold(),
                    capture.kind.dimmed(),
                    capture.start,
                    first_line
                );
            }
        }
    }

    println!();
    println!("{} matches", format!("{}", stats.match_count).green());
    if stats.did_exceed_match_limit {
        eprintln!(
            "{}",
            "Warning: match limit exceeded; results are incomplete".yellow()
        );
    }
    if stats.timed_out {
        eprintln!("{}", "Warning: query timed out; results are partial".yellow());
    }
    Ok(())
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (edited)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

fn cmd_edit(
    mut engine: AstEngine,
    file: &Path,
    start: Position,
    old: &str,
    new: &str,
    language: Option<&str>,
    write: bool,
) -> Result<()> {
    let language = detect_language(file, language)?;
    let source = read_source(file)?;
    let id = file_id(file);
    let _ = engine.open(&id, &source, language)?;

    let Some(updated) = engine.edit(&id, old, new, start)? else {
        eprintln!(
            "{} edit rejected: the edited source does not parse cleanly",
            "✗".red()
        );
        std::process::exit(1);
    };

    let modified = String::from_utf8_lossy(updated.source()).into_owned();
    display_diff(file, &source, &modified);

    if write {
        fs::write(file, &modified)
            .with_context(|| format!("failed to write {}", file.display()))?;
        println!("\n{} wrote {}", "✓".green(), file.display());
    }
    Ok(())
}

fn cmd_check(mut engine: AstEngine, dir: &Path, language: Option<&str>) -> Result<()> {
    let only = language.map(resolve).transpose()?;

    let mut total_ok = 0;
    let mut total_invalid = 0;
    let mut total_unreadable = 0;

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                eprintln!("{} {}", "✗".red(), e);
                total_unreadable += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
            continue;
        };
        let file_language = match only {
            Some(lang) if extensions(lang).contains(&ext) => lang,
            Some(_) => continue,
            None => match from_extension(ext) {
                Some(lang) => lang,
                None => continue,
            },
        };

        let source = match fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), path.display(), e);
                total_unreadable += 1;
                continue;
            }
        };

        let id = file_id(path);
        if let Err(e) = engine.open(&id, &source, file_language) {
            eprintln!("{} {}: {}", "✗".red(), path.display(), e);
            total_unreadable += 1;
            continue;
        }
        match engine.validate(&id) {
            Some((true, _)) => {
                println!("{} {}", "✓".green(), path.display());
                total_ok += 1;
            }
            Some((false, messages)) => {
                eprintln!("{} {}", "✗".red(), path.display());
                for message in messages {
                    eprintln!("  {}", message);
                }
                total_invalid += 1;
            }
            None => total_unreadable += 1,
        }
        engine.store_mut().evict(&id);
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} valid", format!("{}", total_ok).green());
    println!("  {} with syntax errors", format!("{}", total_invalid).red());
    println!("  {} unreadable", format!("{}", total_unreadable).yellow());

    if total_invalid > 0 || total_unreadable > 0 {
        std::process::exit(1);
    }

    Ok(())
}
