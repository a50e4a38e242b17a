use anyhow::{Context, Result};
use array_guard::config::{load_or_default, RuleConfig};
use array_guard::{discover_files, Detector, FileOutcome, Rewriter, ScanReport};
use clap::{Parser, Subcommand};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const DEFAULT_REPORT: &str = "array-guard-report.json";

#[derive(Parser)]
#[command(name = "array-guard")]
#[command(about = "Find and rewrite unguarded array method calls", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan source files and write a report
    Scan {
        /// Project root to scan
        #[arg(short, long, default_value = ".")]
        root: PathBuf,

        /// Rule config (TOML); built-in rules when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Where to write the JSON report
        #[arg(short, long, default_value = DEFAULT_REPORT)]
        output: PathBuf,

        /// Also write the list of files needing fixes, most issues first
        #[arg(short, long)]
        worklist: Option<PathBuf>,
    },

    /// Rewrite the files listed in a report
    Fix {
        /// Project root the report paths are relative to
        #[arg(short, long, default_value = ".")]
        root: PathBuf,

        /// Rule config (TOML); must match the one used for the scan
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Report produced by `scan`
        #[arg(long, default_value = DEFAULT_REPORT)]
        report: PathBuf,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Scan without writing anything; exit 1 if any file needs fixing
    Check {
        /// Project root to scan
        #[arg(short, long, default_value = ".")]
        root: PathBuf,

        /// Rule config (TOML); built-in rules when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the effective method table and exemptions
    Rules {
        /// Rule config (TOML); built-in rules when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Scan {
            root,
            config,
            output,
            worklist,
        } => cmd_scan(&root, config.as_deref(), &output, worklist.as_deref()),

        Commands::Fix {
            root,
            config,
            report,
            dry_run,
            diff,
        } => cmd_fix(&root, config.as_deref(), &report, dry_run, diff),

        Commands::Check { root, config } => cmd_check(&root, config.as_deref()),

        Commands::Rules { config } => cmd_rules(config.as_deref()),
    }
}

/// Logs go to stderr; stdout carries the report.
fn init_logging(verbose: bool) {
    let default_filter = if verbose { "array_guard=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // a subscriber may already be installed when embedded; keep it
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Helper: discover and scan every candidate file under `root`.
fn run_scan(root: &Path, config: &RuleConfig) -> Result<ScanReport> {
    let files = discover_files(root, &config.discovery)
        .with_context(|| format!("failed to walk {}", root.display()))?;
    let detector = Detector::new(config)?;
    Ok(ScanReport::from_file_reports(detector.scan(root, &files)))
}

fn print_scan_summary(report: &ScanReport) {
    let summary = &report.summary;
    println!("{}", "Summary:".bold());
    println!("  {} files scanned", summary.total_files);
    println!(
        "  {} files already protected",
        format!("{}", summary.files_protected).green()
    );
    println!(
        "  {} files with issues",
        format!("{}", summary.files_with_issues).yellow()
    );
    println!(
        "  {} issues total",
        format!("{}", summary.total_issues).yellow()
    );
    if !report.files_failed.is_empty() {
        println!(
            "  {} files unreadable",
            format!("{}", report.files_failed.len()).red()
        );
    }
}

fn cmd_scan(
    root: &Path,
    config_path: Option<&Path>,
    output: &Path,
    worklist: Option<&Path>,
) -> Result<()> {
    let config = load_or_default(config_path)?;

    println!("Scanning {}...", root.display());
    let report = run_scan(root, &config)?;

    for failed in &report.files_failed {
        eprintln!("{} {}: {}", "✗".red(), failed.file, failed.error);
    }

    report.save(output)?;
    println!("Report written to {}", output.display());

    if let Some(path) = worklist {
        report.write_worklist(path)?;
        println!("Worklist written to {}", path.display());
    }

    println!();
    print_scan_summary(&report);
    Ok(())
}

/// Helper: Show unified diff between original and rewritten content
fn display_diff(file: &str, original: &str, modified: &str) {
    println!("\n{}", format!("--- {} (original)", file).dimmed());
    println!("{}", format!("+++ {} (fixed)", file).dimmed());

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

fn cmd_fix(
    root: &Path,
    config_path: Option<&Path>,
    report_path: &Path,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let config = load_or_default(config_path)?;

    // a missing or malformed report aborts the run
    let report = ScanReport::load(report_path)?;

    let rewriter = Rewriter::new(config, root)
        .with_context(|| format!("invalid project root {}", root.display()))?
        .dry_run(dry_run);

    println!("Project root: {}", root.display());
    println!("Report: {}", report_path.display());
    if dry_run {
        println!("{}", "[DRY RUN - no files will be modified]".cyan());
    }
    println!();

    if show_diff {
        for candidate in report.fix_candidates() {
            match rewriter.plan_file(candidate) {
                Ok(plan) if plan.is_change() => {
                    display_diff(&plan.file, &plan.original, &plan.rewritten);
                }
                Ok(_) => {}
                Err(e) => {
                    println!(
                        "{}",
                        format!("cannot diff {}: {}", candidate.file, e).dimmed()
                    );
                }
            }
        }
        println!();
    }

    let result = rewriter.apply(&report);

    for outcome in &result.outcomes {
        match outcome {
            FileOutcome::Modified {
                file,
                calls_rewritten,
                import_added,
            } => {
                let verb = if dry_run { "Would fix" } else { "Fixed" };
                let import = if *import_added { ", import added" } else { "" };
                println!(
                    "{} {} {} ({} calls{})",
                    "✓".green(),
                    verb,
                    file,
                    calls_rewritten,
                    import
                );
            }
            FileOutcome::Skipped { file, reason } => {
                println!("{} {}: Skipped ({})", "⊘".cyan(), file, reason);
            }
            FileOutcome::Failed { file, reason } => {
                eprintln!("{} {}: Failed - {}", "✗".red(), file, reason);
            }
        }
    }

    let summary = result.summary();
    println!();
    println!("{}", "Summary:".bold());
    println!("  {} fixed", format!("{}", summary.modified).green());
    println!("  {} skipped", format!("{}", summary.skipped).cyan());
    println!("  {} failed", format!("{}", summary.failed).red());

    if summary.failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_check(root: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = load_or_default(config_path)?;
    let report = run_scan(root, &config)?;

    let worklist = report.worklist();
    if worklist.is_empty() {
        println!("{} No unguarded array calls found", "✓".green());
        return Ok(());
    }

    println!(
        "{} {} files need fixing:",
        "✗".red(),
        format!("{}", worklist.len()).red().bold()
    );
    for candidate in report.fix_candidates() {
        println!("  - {} ({} issues)", candidate.file, candidate.issues_count);
    }
    println!();
    print_scan_summary(&report);

    std::process::exit(1);
}

fn cmd_rules(config_path: Option<&Path>) -> Result<()> {
    let config = load_or_default(config_path)?;

    println!("{}", "Methods:".bold());
    for rule in &config.methods {
        println!("  .{}(  ->  {}(", rule.method, rule.helper);
    }
    println!();
    println!("{} {}", "Helper module:".bold(), config.helper_module);
    println!("{} {}", "Empty check:".bold(), config.empty_check_helper);
    println!();
    println!("{}", "Exempt identifiers:".bold());
    for ident in &config.exemptions.identifiers {
        println!("  {}", ident);
    }

    Ok(())
}
