use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use postfix_patcher::alias::{derive_alias, lookup_alias, normalize_model_name, resolve_collisions};
use postfix_patcher::apply::{run_batch, BatchOptions, FileOutcome, FileReport};
use postfix_patcher::commit::{CommitOutcome, Committer};
use postfix_patcher::config::{
    default_config_path, default_openclaw_json_path, expand_tilde, load_from_path, openclaw_home,
    save_model_aliases, PackConfig,
};
use postfix_patcher::discover::{
    family_inventory, find_target_bundles, read_target_version, PackageLocator,
};
use postfix_patcher::patch::{PatchEngine, PatchKind, PatchStatus};
use postfix_patcher::prefix::{sync_response_prefix, SyncOutcome};
use postfix_patcher::report::{self, Summary};
use postfix_patcher::safety::DistGuard;
use postfix_patcher::stamp::{render_template, StampParts};
use postfix_patcher::validate::{NodeValidator, OnValidatorMissing};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const EXIT_DIST_MISSING: i32 = 2;
const EXIT_NO_ANCHOR: i32 = 3;
const EXIT_SYNTAX_FAIL: i32 = 4;
const EXIT_PREFIX_OUT_OF_SYNC: i32 = 5;

const ANCHOR_HINT_LIMIT: usize = 5;

const PREVIEW_MODEL: &str = "claude-sonnet-4-6";

#[derive(Parser)]
#[command(name = "postfix-patcher")]
#[command(about = "Patch OpenClaw dist bundles for postfix reply stamps", long_about = None)]
#[command(version)]
struct Cli {
    /// Verbose diagnostics on stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct TargetArgs {
    /// Pack config with alias tables and the response prefix template
    #[arg(long, env = "OPENCLAW_POSTFIX_CONFIG")]
    config: Option<PathBuf>,

    /// openclaw.json whose responsePrefix settings are synchronized
    #[arg(long, env = "OPENCLAW_JSON")]
    openclaw_json: Option<PathBuf>,

    /// OpenClaw package dir that contains dist/ (auto-detected if not specified)
    #[arg(long)]
    openclaw_pkg_dir: Option<PathBuf>,

    /// Re-patch model stamp logic even when already present
    #[arg(long)]
    force_modelstamp: bool,

    /// What to do when `node` is unavailable for syntax checks
    #[arg(long, value_enum, default_value_t = OnValidatorMissing::Fail)]
    on_validator_missing: OnValidatorMissing,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync the response prefix and patch target bundles
    Apply {
        #[command(flatten)]
        target: TargetArgs,

        /// Do not write files; exit 5 if the response prefix is out of sync
        #[arg(long)]
        check_only: bool,

        /// Show what would change without writing
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Report per-bundle patch status without writing
    Status {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Resolve model aliases, deriving new ones for unknown models
    Aliases {
        /// Raw model identifiers
        #[arg(required = true)]
        models: Vec<String>,

        #[arg(long, env = "OPENCLAW_POSTFIX_CONFIG")]
        config: Option<PathBuf>,

        /// Save derived aliases into the pack config
        #[arg(long)]
        write: bool,
    },

    /// Render the stamp a reply would carry
    Preview {
        #[arg(long)]
        provider: String,

        /// Auth profile mode (oauth, api_key, token)
        #[arg(long)]
        auth_mode: Option<String>,

        #[arg(long, default_value = PREVIEW_MODEL)]
        model: String,

        /// Agent identity name (defaults to the host name's initial)
        #[arg(long)]
        identity: Option<String>,

        #[arg(long, env = "OPENCLAW_POSTFIX_CONFIG")]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy)]
struct RunMode {
    check_only: bool,
    dry_run: bool,
    diff: bool,
    per_file: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = match cli.command {
        Commands::Apply {
            target,
            check_only,
            dry_run,
            diff,
        } => cmd_apply(
            target,
            RunMode {
                check_only,
                dry_run,
                diff,
                per_file: false,
            },
        )?,

        Commands::Status { target } => cmd_apply(
            target,
            RunMode {
                check_only: true,
                dry_run: false,
                diff: false,
                per_file: true,
            },
        )?,

        Commands::Aliases {
            models,
            config,
            write,
        } => cmd_aliases(&models, config, write)?,

        Commands::Preview {
            provider,
            auth_mode,
            model,
            identity,
            config,
        } => cmd_preview(&provider, auth_mode.as_deref(), &model, identity.as_deref(), config)?,
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn config_path(explicit: Option<PathBuf>) -> PathBuf {
    expand_tilde(explicit.unwrap_or_else(default_config_path))
}

fn load_config(path: &Path) -> Result<PackConfig> {
    load_from_path(path).with_context(|| format!("failed to load config {}", path.display()))
}

fn print_sync(outcome: &SyncOutcome) {
    match outcome {
        SyncOutcome::Missing { path } => println!(
            "{}",
            format!(
                "response-prefix: WARNING: openclaw config not found: {}",
                path.display()
            )
            .yellow()
        ),
        SyncOutcome::Checked { template, changed } => {
            println!("response-prefix: template={template}");
            println!("response-prefix: changed_keys={changed}");
        }
        SyncOutcome::Written {
            template,
            changed,
            backup,
        } => {
            println!("response-prefix: template={template}");
            println!("response-prefix: backup={}", backup.display());
            println!("response-prefix: changed_keys={changed}");
        }
    }
}

fn cmd_apply(target: TargetArgs, mode: RunMode) -> Result<i32> {
    let force = target.force_modelstamp || env_flag("OPENCLAW_PATCH_FORCE_MODELSTAMP");
    let no_write = mode.check_only || mode.dry_run;

    // 1. Config errors abort before anything is touched
    let cfg_path = config_path(target.config);
    let config = load_config(&cfg_path)?;

    // 2. Response prefix
    let openclaw_json = expand_tilde(target.openclaw_json.unwrap_or_else(default_openclaw_json_path));
    let sync = sync_response_prefix(
        &openclaw_json,
        &config.response_prefix_template,
        no_write,
        &openclaw_home().join("backups"),
    )?;
    print_sync(&sync);

    // 3. Target bundles
    let pkg_dir = match target.openclaw_pkg_dir {
        Some(dir) => expand_tilde(dir),
        None => PackageLocator::system().resolve()?,
    };
    let dist = pkg_dir.join("dist");
    if !dist.is_dir() {
        eprintln!("{}", format!("dist dir not found: {}", dist.display()).red());
        return Ok(EXIT_DIST_MISSING);
    }
    let bundles = find_target_bundles(&dist)?;
    if bundles.is_empty() {
        eprintln!(
            "{}",
            format!("no target bundles found in {}", dist.display()).red()
        );
        return Ok(EXIT_DIST_MISSING);
    }

    // 4. Patch
    let engine = PatchEngine::new(&config.aliases, force);
    let validator = NodeValidator::locate();
    let committer = Committer::new(&validator, target.on_validator_missing)
        .with_guard(DistGuard::new(&dist)?);
    let reports = run_batch(
        &bundles,
        &engine,
        (!no_write).then_some(&committer),
        BatchOptions {
            capture_changes: mode.diff,
        },
    );

    // 5. Report
    for file in &reports {
        print_file_report(file, mode);
        if mode.diff {
            if let Some(change) = &file.change {
                display_diff(&file.file_name(), &change.before, &change.after);
            }
        }
    }
    if mode.dry_run {
        println!("{}", "DRY RUN - no files written".cyan());
        for file in &reports {
            println!("  {}", report::dry_run_line(file));
        }
    }

    let summary = Summary::from_reports(&reports);
    print_summary(&summary);
    println!(
        "{}",
        format!(
            "postfix-patch: {} (pkg={}, config={})",
            summary.counters_line(),
            pkg_dir.display(),
            cfg_path.display()
        )
        .dimmed()
    );

    if summary.needs_escape_hatch() {
        let version = read_target_version(&pkg_dir);
        let families = family_inventory(&dist).unwrap_or_else(|error| {
            tracing::warn!(%error, "could not list dist bundles");
            BTreeMap::new()
        });
        let hints = report::nearest_anchors(&bundles, ANCHOR_HINT_LIMIT);
        eprint!(
            "{}",
            report::escape_hatch(&pkg_dir, &version, &families, &hints)
        );
        return Ok(EXIT_NO_ANCHOR);
    }
    if summary.syntax_fail > 0 {
        return Ok(EXIT_SYNTAX_FAIL);
    }
    if mode.check_only && !sync.is_in_sync() {
        return Ok(EXIT_PREFIX_OUT_OF_SYNC);
    }
    Ok(0)
}

fn print_file_report(report: &FileReport, mode: RunMode) {
    let name = report.file_name();
    match &report.outcome {
        FileOutcome::Failed { error } => {
            eprintln!("{} {}: Error - {}", "✗".red(), name, error);
        }
        FileOutcome::Committed(CommitOutcome::RolledBack { diagnostic }) => {
            eprintln!(
                "{} {}: syntax check failed; reverted file",
                "✗".red(),
                name
            );
            if !diagnostic.is_empty() {
                eprintln!("  {}", diagnostic.dimmed());
            }
        }
        FileOutcome::Committed(CommitOutcome::WrittenUnvalidated { reason }) => {
            println!(
                "{} {}: Patched without syntax check ({})",
                "⊘".cyan(),
                name,
                reason
            );
        }
        FileOutcome::Committed(CommitOutcome::Written) => {
            println!("{} {}: Patched", "✓".green(), name);
        }
        FileOutcome::Committed(CommitOutcome::Unchanged) | FileOutcome::NotWritten => {
            if mode.per_file {
                print_statuses(report);
            }
        }
    }
}

fn print_statuses(report: &FileReport) {
    let Some(statuses) = &report.statuses else {
        return;
    };
    let line = statuses
        .iter()
        .map(|(kind, status)| format!("{kind}={status}"))
        .collect::<Vec<_>>()
        .join(", ");
    let all_applied = statuses
        .iter()
        .all(|(_, status)| status == PatchStatus::Already);
    let glyph = if all_applied {
        "✓".green()
    } else {
        "⊙".yellow()
    };
    println!("{} {}: {}", glyph, report.file_name(), line);
}

fn print_summary(summary: &Summary) {
    println!();
    println!("{}", "Summary:".bold());
    println!("  {} bundles", summary.files);
    for kind in PatchKind::ALL {
        let tally = summary.tally(kind);
        println!(
            "  {:<11} {} patched, {} already, {} no-match",
            format!("{kind}:"),
            format!("{}", tally.patched).green(),
            format!("{}", tally.already).yellow(),
            format!("{}", tally.no_match).red()
        );
    }
    if summary.unvalidated > 0 {
        println!(
            "  {} written without syntax check",
            format!("{}", summary.unvalidated).cyan()
        );
    }
    println!(
        "  {} syntax failures",
        format!("{}", summary.syntax_fail).red()
    );
    if summary.errors > 0 {
        println!("  {} errors", format!("{}", summary.errors).red());
    }
}

/// Helper: Show unified diff between original and patched content
fn display_diff(name: &str, original: &str, patched: &str) {
    println!();
    for line in report::unified_diff(name, original, patched).lines() {
        let styled = if line.starts_with("---") || line.starts_with("+++") {
            line.dimmed()
        } else if line.starts_with('-') {
            line.red()
        } else if line.starts_with('+') {
            line.green()
        } else if line.starts_with("@@") {
            line.cyan()
        } else {
            line.normal()
        };
        println!("{styled}");
    }
}

fn cmd_aliases(models: &[String], config: Option<PathBuf>, write: bool) -> Result<i32> {
    let cfg_path = config_path(config);
    let config = load_config(&cfg_path)?;
    let table = &config.aliases.model_aliases;

    let mut candidates = Vec::new();
    for model in models {
        let normalized = normalize_model_name(model);
        if normalized.is_empty() {
            eprintln!("{} {:?}: empty model name", "⊘".cyan(), model);
            continue;
        }
        match lookup_alias(model, table) {
            Some(alias) => println!("{} {} -> {} (table)", "⊙".yellow(), normalized, alias),
            None => candidates.push((normalized, derive_alias(model))),
        }
    }

    let assignments = resolve_collisions(candidates, config.aliases.used_aliases());
    for assignment in &assignments {
        println!(
            "{} {} -> {} (derived)",
            "✓".green(),
            assignment.model,
            assignment.alias
        );
    }

    if write && !assignments.is_empty() {
        let entries: BTreeMap<String, String> = assignments
            .into_iter()
            .map(|a| (a.model, a.alias))
            .collect();
        let changed = save_model_aliases(&cfg_path, &entries)
            .with_context(|| format!("failed to save aliases to {}", cfg_path.display()))?;
        println!("Saved {} alias(es) to {}", changed, cfg_path.display());
    }
    Ok(0)
}

fn cmd_preview(
    provider: &str,
    auth_mode: Option<&str>,
    model: &str,
    identity: Option<&str>,
    config: Option<PathBuf>,
) -> Result<i32> {
    let config = load_config(&config_path(config))?;
    let host = local_hostname();
    let parts = StampParts::resolve(&config.aliases, provider, auth_mode, model, identity)
        .with_preview_identity(host.as_deref());
    println!("{}", render_template(&config.response_prefix_template, &parts));
    println!(
        "{}",
        format!(
            "provider={} model={} modelfull={} identity={}",
            parts.provider, parts.model, parts.model_full, parts.identity
        )
        .dimmed()
    );
    Ok(0)
}

fn local_hostname() -> Option<String> {
    if let Some(name) = env::var("HOSTNAME").ok().filter(|n| !n.trim().is_empty()) {
        return Some(name);
    }
    let output = std::process::Command::new("hostname").output().ok()?;
    let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (output.status.success() && !name.is_empty()).then_some(name)
}
