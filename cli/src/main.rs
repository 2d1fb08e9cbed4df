//! Tyr CLI - binary entry point.
//!
//! stdout is the wire to the host: only the hook response (for `judge`)
//! and requested views (`log`, `stats`, …) are ever printed there.
//! Diagnostics go to stderr via tracing.
//!
//! Exit codes: 0 for every evaluated request (abstain included) and for
//! successful cold-path commands; 1 for flag usage errors and cold-path
//! failures; 2 for malformed `judge` input.

mod commands;

use clap::error::ErrorKind;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tyr_config::LlmProviderKind;

#[derive(Parser)]
#[command(
    name = "tyr",
    version,
    about = "Permission-decision hook for AI coding assistants",
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate a permission request from stdin (the hot path).
    Judge(JudgeArgs),
    /// View or clear the audit log.
    Log(LogArgs),
    /// Aggregate decision statistics.
    Stats(StatsArgs),
    /// Recommend allow rules mined from the audit log.
    Suggest(SuggestArgs),
    /// Database maintenance.
    Db(DbArgs),
    /// Show or edit tyr's configuration and env file.
    Config(ConfigArgs),
    /// Print the tyr version.
    Version,
}

#[derive(Args)]
struct JudgeArgs {
    /// Structured progress on stderr.
    #[arg(long)]
    verbose: bool,
    /// Run the pipeline and log the decision, but never steer the host.
    #[arg(long, conflicts_with = "audit")]
    shadow: bool,
    /// Skip the pipeline entirely; only record the request.
    #[arg(long)]
    audit: bool,
    /// Convert a terminal abstain into allow.
    #[arg(long, overrides_with = "no_fail_open")]
    fail_open: bool,
    #[arg(long = "no-fail-open", hide = true)]
    no_fail_open: bool,
    /// Consult the decision cache before other providers.
    #[arg(long, overrides_with = "no_cache_checks")]
    cache_checks: bool,
    #[arg(long = "no-cache-checks", hide = true)]
    no_cache_checks: bool,
    /// Disable the chained-commands rule provider for this run.
    #[arg(long)]
    no_allow_chained_commands: bool,
    /// Override the active LLM backend's model.
    #[arg(long)]
    llm_model: Option<String>,
    /// Override the LLM timeout, in seconds.
    #[arg(long)]
    llm_timeout: Option<u64>,
    /// Select the LLM backend: claude or openrouter.
    #[arg(long, value_parser = parse_llm_provider)]
    llm_provider: Option<LlmProviderKind>,
}

fn parse_llm_provider(s: &str) -> Result<LlmProviderKind, String> {
    LlmProviderKind::parse(s).map_err(|e| e.to_string())
}

#[derive(Args)]
struct LogArgs {
    #[command(subcommand)]
    action: Option<LogAction>,
    /// Show only the newest N entries.
    #[arg(long)]
    last: Option<u32>,
    /// Emit JSON instead of text lines.
    #[arg(long)]
    json: bool,
    /// Lower time bound: N[smhd] back from now, or ISO-8601.
    #[arg(long)]
    since: Option<String>,
    /// Upper time bound, same grammar as --since.
    #[arg(long)]
    until: Option<String>,
    /// Filter by decision: allow, deny, abstain, or error.
    #[arg(long)]
    decision: Option<String>,
    /// Filter by deciding provider.
    #[arg(long)]
    provider: Option<String>,
    /// Filter by working-directory prefix.
    #[arg(long)]
    cwd: Option<String>,
    /// Include stored LLM prompts for verbose-logged rows.
    #[arg(long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum LogAction {
    /// Delete every audit log row.
    Clear,
}

#[derive(Args)]
struct StatsArgs {
    /// Restrict to rows newer than this (same grammar as log --since).
    #[arg(long)]
    since: Option<String>,
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct SuggestArgs {
    /// Minimum number of allowed runs before a command is suggested.
    #[arg(long, default_value_t = 3)]
    min_count: i64,
    /// Mine every project's history (default).
    #[arg(long, conflicts_with_all = ["project", "global"])]
    all: bool,
    /// Mine only the current project's history.
    #[arg(long, conflicts_with = "global")]
    project: bool,
    /// Alias of --all.
    #[arg(long)]
    global: bool,
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct DbArgs {
    #[command(subcommand)]
    action: DbAction,
}

#[derive(Subcommand)]
enum DbAction {
    /// Apply pending schema migrations.
    Migrate,
    /// Rewrite a project path prefix across logs and cache.
    Rename { old: String, new: String },
}

#[derive(Args)]
struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the resolved configuration.
    Show,
    /// Set one configuration key.
    Set { key: String, value: String },
    /// Print the config file path.
    Path,
    /// Manage the env dotfile.
    Env {
        #[command(subcommand)]
        action: EnvAction,
    },
}

#[derive(Subcommand)]
enum EnvAction {
    /// List entries in the env file.
    Show,
    /// Set one variable in the env file.
    Set { key: String, value: String },
    /// Print the env file path.
    Path,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help/--version are not usage errors.
            if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                let _ = e.print();
                std::process::exit(0);
            }
            let _ = e.print();
            std::process::exit(1);
        }
    };

    let verbose = match &cli.command {
        Command::Judge(args) => args.verbose,
        Command::Log(args) => args.verbose,
        _ => false,
    };
    init_tracing(verbose);

    // Populate missing env (credentials) from the dotfile; existing
    // process env always wins.
    tyr_config::load_env_file(&tyr_config::env_file_path());

    let code = match cli.command {
        Command::Judge(args) => commands::judge(&args),
        Command::Log(args) => commands::log(&args),
        Command::Stats(args) => commands::stats(&args),
        Command::Suggest(args) => commands::suggest(&args),
        Command::Db(args) => commands::db(&args),
        Command::Config(args) => commands::config(&args),
        Command::Version => {
            println!("tyr {}", env!("CARGO_PKG_VERSION"));
            0
        }
    };
    std::process::exit(code);
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    // stdout belongs to the host protocol; diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
