use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use norm_patcher::config::{self, Settings};
use norm_patcher::workflow::{self, Analysis};
use norm_patcher::{
    dates, reference, DocumentChecker, Extractor, PatternLibrary, Status, SubstitutionOutcome,
};
use similar::{ChangeTag, TextDiff};
use std::env;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "norm-patcher")]
#[command(
    about = "Find, classify and update norm codes in documents",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Settings file (defaults to $NORM_PATCHER_CONFIG, then ./norm-patcher.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Reference table (overrides [reference] path)
    #[arg(short, long, global = true)]
    table: Option<PathBuf>,

    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report the norm codes of documents and their status
    Analyze {
        /// Documents, or directories searched for .docx files
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,

        /// Write the detected codes to a file, one per line
        #[arg(short, long)]
        export: Option<PathBuf>,
    },

    /// Write a copy of a document with superseded codes replaced
    Apply {
        path: PathBuf,

        /// Dry run - show what would be replaced without writing anything
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show the changed fragments
        #[arg(short, long)]
        diff: bool,
    },

    /// List the dates and times found in a text file
    FindDates {
        file: PathBuf,

        /// Print the matched text instead of the parsed value
        #[arg(long)]
        raw: bool,
    },

    /// Format the dates of a text file, one per line
    FormatDates {
        file: PathBuf,

        /// Write the formatted dates here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// strftime pattern (overrides [dates] format)
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Write a copy of a text file with every date normalized
    ReplaceDates {
        input: PathBuf,
        output: PathBuf,

        /// strftime pattern (overrides [dates] format)
        #[arg(short, long)]
        format: Option<String>,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cwd = env::current_dir().context("cannot determine the working directory")?;
    let settings = config::resolve(cli.config.as_deref(), &cwd)?;

    match cli.command {
        Commands::Analyze {
            paths,
            json,
            export,
        } => cmd_analyze(&settings, cli.table, &paths, json, export),

        Commands::Apply {
            path,
            dry_run,
            diff,
        } => cmd_apply(&settings, cli.table, &path, dry_run, diff),

        Commands::FindDates { file, raw } => cmd_find_dates(&settings, &file, raw),

        Commands::FormatDates {
            file,
            output,
            format,
        } => cmd_format_dates(&settings, &file, output, format),

        Commands::ReplaceDates {
            input,
            output,
            format,
            diff,
        } => cmd_replace_dates(&settings, &input, &output, format, diff),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn extractor(settings: &Settings) -> Result<Extractor> {
    let patterns = PatternLibrary::with_marker(&settings.patterns.marker)
        .with_context(|| format!("invalid marker '{}'", settings.patterns.marker))?;
    Ok(Extractor::new(patterns))
}

/// Build the checker from the table given on the command line or in
/// the settings file.
fn document_checker(settings: &Settings, table: Option<PathBuf>) -> Result<DocumentChecker> {
    let Some(table_path) = table.or_else(|| settings.reference.path.clone()) else {
        anyhow::bail!(
            "{}\n{}\n  {}\n  {}",
            "No reference table configured.".red(),
            "Try one of:".bold(),
            "1. Pass it explicitly: norm-patcher --table db/baza.csv analyze opis.docx",
            "2. Set [reference] path in norm-patcher.toml"
        )
    };

    let table = reference::load_from_path(&table_path, settings.load_options())?;
    if table.is_empty() {
        eprintln!(
            "{}",
            format!("Warning: {} has no entries", table_path.display()).yellow()
        );
    }

    Ok(DocumentChecker::new(extractor(settings)?, table)
        .with_member(settings.document.member.as_str())
        .with_output_suffix(settings.document.output_suffix.as_str()))
}

fn date_pattern(settings: &Settings, format: Option<String>) -> Result<String> {
    let pattern = format.unwrap_or_else(|| settings.dates.format.clone());
    dates::validate_pattern(&pattern)?;
    Ok(pattern)
}

/// Expand directories into the `.docx` files below them.
///
/// Patched copies (names ending in the output suffix) are skipped when
/// walking directories; explicit file arguments are taken as given.
fn collect_documents(paths: &[PathBuf], suffix: &str) -> Result<Vec<PathBuf>> {
    let mut documents = Vec::new();

    for path in paths {
        if !path.is_dir() {
            documents.push(path.clone());
            continue;
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(path) {
            let entry = entry?;
            let candidate = entry.path();
            let is_docx = candidate
                .extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("docx"));
            let is_patched = candidate
                .file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|stem| stem.ends_with(suffix));
            if entry.file_type().is_file() && is_docx && !is_patched {
                found.push(candidate.to_path_buf());
            }
        }
        found.sort();
        documents.extend(found);
    }

    Ok(documents)
}

fn status_symbol(status: Status) -> colored::ColoredString {
    match status {
        Status::Current => "✓".green(),
        Status::Superseded => "⊙".yellow(),
        Status::Unknown => "?".red(),
        Status::Legacy => "⊘".cyan(),
    }
}

fn print_analysis(checker: &DocumentChecker, analysis: &Analysis) {
    println!("{}", analysis.path.display().to_string().bold());

    if analysis.results.is_empty() {
        println!("  {}", "No norm codes found".dimmed());
        return;
    }

    for result in &analysis.results {
        let code = result.token().raw_text();
        let symbol = status_symbol(result.status());
        match result.status() {
            Status::Superseded => println!(
                "  {} {}: {} → {}",
                symbol,
                code,
                result.status(),
                result.replacement().unwrap_or_default().green()
            ),
            Status::Unknown => match checker.table().closest(code) {
                Some(hint) => println!(
                    "  {} {}: {} (did you mean {}?)",
                    symbol,
                    code,
                    result.status(),
                    hint.dimmed()
                ),
                None => println!("  {} {}: {}", symbol, code, result.status()),
            },
            _ => println!("  {} {}: {}", symbol, code, result.status()),
        }
    }
}

fn cmd_analyze(
    settings: &Settings,
    table: Option<PathBuf>,
    paths: &[PathBuf],
    json: bool,
    export: Option<PathBuf>,
) -> Result<()> {
    let checker = document_checker(settings, table)?;
    let documents = collect_documents(paths, &settings.document.output_suffix)?;
    if documents.is_empty() {
        anyhow::bail!("No .docx documents found");
    }

    let mut analyses = Vec::new();
    let mut total_failed = 0;

    for document in &documents {
        match checker.analyze(document) {
            Ok(analysis) => {
                if !json {
                    print_analysis(&checker, &analysis);
                    println!();
                }
                analyses.push(analysis);
            }
            Err(e) => {
                eprintln!("{} {}: Error - {}", "✗".red(), document.display(), e);
                total_failed += 1;
            }
        }
    }

    if json {
        let report: Vec<serde_json::Value> = analyses
            .iter()
            .map(|analysis| {
                serde_json::json!({
                    "path": analysis.path,
                    "results": analysis.results,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let mut up_to_date = 0;
        let mut out_of_date = 0;
        let mut unknown = 0;
        let mut legacy = 0;
        for analysis in &analyses {
            let summary = analysis.summary();
            up_to_date += summary.current;
            out_of_date += summary.superseded;
            unknown += summary.unknown;
            legacy += summary.legacy;
        }

        let total = up_to_date + out_of_date + unknown + legacy;
        let known = analyses
            .iter()
            .flat_map(|analysis| &analysis.results)
            .filter(|result| result.status().is_known())
            .count();

        println!("{}", "Summary:".bold());
        println!("  {} of {} codes in the reference table", known, total);
        println!("  {} up-to-date", format!("{}", up_to_date).green());
        println!("  {} out-of-date", format!("{}", out_of_date).yellow());
        println!("  {} unknown", format!("{}", unknown).red());
        println!("  {} pre-1994 notation", format!("{}", legacy).cyan());
        if total_failed > 0 {
            println!("  {} failed", format!("{}", total_failed).red());
        }
    }

    if let Some(output) = export {
        workflow::export_codes(&analyses, &output)?;
        if !json {
            println!("Codes written to {}", output.display());
        }
    }

    if total_failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

/// Helper: Show the changed words with a little context
fn display_fragments(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_words(original, modified);

    for group in diff.grouped_ops(3) {
        println!("{}", "@@".cyan());
        for op in &group {
            for change in diff.iter_changes(op) {
                let text = match change.tag() {
                    ChangeTag::Delete => change.value().red().strikethrough(),
                    ChangeTag::Insert => change.value().green(),
                    ChangeTag::Equal => change.value().normal(),
                };
                print!("{}", text);
            }
        }
        println!();
    }
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

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

fn cmd_apply(
    settings: &Settings,
    table: Option<PathBuf>,
    path: &Path,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    // 1. Classify every code in the document
    let checker = document_checker(settings, table)?;
    let analysis = checker.analyze(path)?;

    // 2. Substitute (or only plan the substitution)
    let (patch, output) = if dry_run {
        println!("{}", "[DRY RUN - showing what would be replaced]".cyan());
        (checker.plan(path, &analysis.results)?, None)
    } else {
        let report = checker.apply(path, &analysis.results)?;
        (report.patch, Some(report.output))
    };

    // 3. Report outcomes
    let mut total_applied = 0;
    let mut total_missing = 0;
    for (pair, outcome) in &patch.outcomes {
        let replacement = pair.replacement.as_deref().unwrap_or_default();
        match outcome {
            SubstitutionOutcome::Applied { .. } => {
                let verb = if dry_run { "Would replace" } else { "Replaced" };
                println!(
                    "{} {} {} → {}",
                    "✓".green(),
                    verb,
                    pair.original,
                    replacement.green()
                );
                total_applied += 1;
            }
            SubstitutionOutcome::NotFound => {
                println!(
                    "{} {}: no occurrence left to replace",
                    "⊙".yellow(),
                    pair.original
                );
                total_missing += 1;
            }
            SubstitutionOutcome::SkippedEmpty => {
                println!("{} {}: no replacement", "⊘".cyan(), pair.original);
            }
        }
    }

    if show_diff && !patch.is_noop() {
        display_fragments(path, &patch.original, &patch.patched);
    }

    // 4. Summary
    let summary = analysis.summary();
    println!();
    println!("{}", "Summary:".bold());
    println!("  {} replaced", format!("{}", total_applied).green());
    println!("  {} not found", format!("{}", total_missing).yellow());
    println!("  {} up-to-date", format!("{}", summary.current).green());
    println!("  {} unknown", format!("{}", summary.unknown).red());
    println!("  {} pre-1994 notation", format!("{}", summary.legacy).cyan());

    if let Some(output) = output {
        println!();
        println!("Created {}", output.display());
    }

    Ok(())
}

fn cmd_find_dates(settings: &Settings, file: &Path, raw: bool) -> Result<()> {
    let extractor = extractor(settings)?;
    let found = dates::find_in_file(&extractor, file)?;

    if found.is_empty() {
        println!("{}", "No dates found".dimmed());
        return Ok(());
    }

    for date in &found {
        match (&date.value, raw) {
            (Some(value), false) => println!("{} {}", "✓".green(), value),
            (None, false) => println!("{} {} {}", "✗".red(), date.raw, "(unparseable)".dimmed()),
            (_, true) => println!("{}", date.raw),
        }
    }

    Ok(())
}

fn cmd_format_dates(
    settings: &Settings,
    file: &Path,
    output: Option<PathBuf>,
    format: Option<String>,
) -> Result<()> {
    let extractor = extractor(settings)?;
    let pattern = date_pattern(settings, format)?;
    let formatted = dates::format_file(&extractor, file, output.as_deref(), &pattern)?;

    match output {
        Some(output) => println!(
            "{} {} dates written to {}",
            "✓".green(),
            formatted.len(),
            output.display()
        ),
        None => {
            for line in &formatted {
                println!("{}", line);
            }
        }
    }

    Ok(())
}

fn cmd_replace_dates(
    settings: &Settings,
    input: &Path,
    output: &Path,
    format: Option<String>,
    show_diff: bool,
) -> Result<()> {
    let extractor = extractor(settings)?;
    let pattern = date_pattern(settings, format)?;

    let original = dates::read_text(input)?;
    let replaced = dates::replace_file(&extractor, input, output, &pattern)?;

    if show_diff && original != replaced {
        display_diff(output, &original, &replaced);
    }
    println!("{} Wrote {}", "✓".green(), output.display());

    Ok(())
}
