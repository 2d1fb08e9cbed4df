//! Subcommand implementations. Each returns the process exit code.

use std::io::Read;
use std::time::{SystemTime, UNIX_EPOCH};

use tyr_config::TyrConfig;
use tyr_engine::{Engine, JudgeOptions};
use tyr_rules::{Pattern, RuleStore};
use tyr_store::{LogFilter, Store};
use tyr_types::record::LogDecision;
use tyr_types::parse_time_spec;

use crate::{
    ConfigAction, ConfigArgs, DbAction, DbArgs, EnvAction, JudgeArgs, LogAction, LogArgs,
    StatsArgs, SuggestArgs,
};

pub(crate) fn judge(args: &JudgeArgs) -> i32 {
    let mut raw = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut raw) {
        eprintln!("tyr: failed to read stdin: {e}");
        return 2;
    }

    let config = load_config_or_default();
    let engine = Engine {
        config,
        rule_paths: None,
        db_path: tyr_config::db_path(),
    };
    let options = judge_options(args);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("tyr: failed to start runtime: {e}");
            return 1;
        }
    };

    match runtime.block_on(engine.judge(&raw, &options)) {
        Ok(Some(response)) => {
            println!("{response}");
            0
        }
        Ok(None) => 0,
        Err(e) => {
            eprintln!("tyr: {e}");
            2
        }
    }
}

fn judge_options(args: &JudgeArgs) -> JudgeOptions {
    let mut options = JudgeOptions::new();
    options.shadow = args.shadow;
    options.audit = args.audit;
    options.fail_open = flag_pair(args.fail_open, args.no_fail_open);
    options.cache_checks = flag_pair(args.cache_checks, args.no_cache_checks);
    options.allow_chained_commands = !args.no_allow_chained_commands;
    options.llm_model = args.llm_model.clone();
    options.llm_timeout_secs = args.llm_timeout;
    options.llm_provider = args.llm_provider;
    options
}

/// `--x` / `--no-x` pair to an optional override.
fn flag_pair(yes: bool, no: bool) -> Option<bool> {
    if yes {
        Some(true)
    } else if no {
        Some(false)
    } else {
        None
    }
}

pub(crate) fn log(args: &LogArgs) -> i32 {
    let mut store = match open_store() {
        Ok(store) => store,
        Err(code) => return code,
    };

    if matches!(args.action, Some(LogAction::Clear)) {
        return match store.clear_logs() {
            Ok(n) => {
                println!("cleared {n} log entries");
                0
            }
            Err(e) => {
                eprintln!("tyr: {e}");
                1
            }
        };
    }

    // Best-effort retention prune at view time.
    let config = load_config_or_default();
    if let Some(cutoff) = config.retention.cutoff_ms(now_ms()) {
        if let Err(e) = store.prune_logs(cutoff) {
            tracing::warn!("Retention prune failed: {e}");
        }
    }

    let mut filter = LogFilter {
        last: args.last,
        provider: args.provider.clone(),
        cwd_prefix: args.cwd.clone(),
        ..LogFilter::default()
    };
    if let Some(since) = &args.since {
        match parse_time_spec(since, now_ms()) {
            Ok(ms) => filter.since = Some(ms),
            Err(e) => {
                eprintln!("tyr: --since: {e}");
                return 1;
            }
        }
    }
    if let Some(until) = &args.until {
        match parse_time_spec(until, now_ms()) {
            Ok(ms) => filter.until = Some(ms),
            Err(e) => {
                eprintln!("tyr: --until: {e}");
                return 1;
            }
        }
    }
    if let Some(decision) = &args.decision {
        match LogDecision::from_str_opt(decision) {
            Some(decision) => filter.decision = Some(decision),
            None => {
                eprintln!("tyr: --decision must be allow, deny, abstain, or error");
                return 1;
            }
        }
    }

    let entries = match store.query_logs(&filter) {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("tyr: {e}");
            return 1;
        }
    };

    if args.json {
        match serde_json::to_string_pretty(&entries) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("tyr: {e}");
                return 1;
            }
        }
        return 0;
    }

    for entry in &entries {
        let provider = entry.provider.as_deref().unwrap_or("-");
        let mode = entry.mode.map_or("", |m| match m {
            tyr_types::record::RunMode::Shadow => " [shadow]",
            tyr_types::record::RunMode::Audit => " [audit]",
        });
        let cached = if entry.cached { " (cached)" } else { "" };
        println!(
            "{} {} {} {} via {}{}{} {}ms",
            entry.timestamp,
            entry.decision.as_str(),
            entry.tool_name,
            entry.tool_input,
            provider,
            cached,
            mode,
            entry.duration_ms,
        );
        if let Some(reason) = &entry.reason {
            println!("    reason: {reason}");
        }
        if args.verbose {
            if let Ok(Some(detail)) = store.llm_detail(entry.id) {
                println!("    model: {}", detail.model);
                println!("    prompt: {}", detail.prompt);
            }
        }
    }
    0
}

pub(crate) fn stats(args: &StatsArgs) -> i32 {
    let store = match open_store() {
        Ok(store) => store,
        Err(code) => return code,
    };

    let since = match &args.since {
        Some(spec) => match parse_time_spec(spec, now_ms()) {
            Ok(ms) => Some(ms),
            Err(e) => {
                eprintln!("tyr: --since: {e}");
                return 1;
            }
        },
        None => None,
    };

    let stats = match store.stats(since) {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("tyr: {e}");
            return 1;
        }
    };

    if args.json {
        let providers: serde_json::Map<String, serde_json::Value> = stats
            .per_provider
            .iter()
            .map(|(name, count)| (name.clone(), serde_json::json!(count)))
            .collect();
        let value = serde_json::json!({
            "total": stats.total,
            "allow": stats.allow,
            "deny": stats.deny,
            "abstain": stats.abstain,
            "error": stats.error,
            "cached": stats.cached,
            "cacheHitRate": stats.cache_hit_rate,
            "autoApprovals": stats.auto_approvals(),
            "providers": providers,
        });
        println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
        return 0;
    }

    println!("total:          {}", stats.total);
    println!("allow:          {}", stats.allow);
    println!("deny:           {}", stats.deny);
    println!("abstain:        {}", stats.abstain);
    println!("error:          {}", stats.error);
    println!(
        "cache hits:     {} ({:.1}%)",
        stats.cached,
        stats.cache_hit_rate * 100.0
    );
    println!("auto-approvals: {}", stats.auto_approvals());
    if !stats.per_provider.is_empty() {
        println!("providers:");
        for (name, count) in &stats.per_provider {
            println!("  {name}: {count}");
        }
    }
    0
}

pub(crate) fn suggest(args: &SuggestArgs) -> i32 {
    let store = match open_store() {
        Ok(store) => store,
        Err(code) => return code,
    };

    let cwd = std::env::current_dir()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();
    let scope_cwd = if args.project { Some(cwd.as_str()) } else { None };

    let suggestions = match store.suggest(args.min_count, scope_cwd) {
        Ok(suggestions) => suggestions,
        Err(e) => {
            eprintln!("tyr: {e}");
            return 1;
        }
    };

    // Drop commands the current allow rules already cover.
    let rules = RuleStore::load(std::path::Path::new(&cwd), None);
    let allow_patterns: Vec<Pattern> = rules
        .debug_info()
        .allow
        .iter()
        .filter_map(|raw| Pattern::new(raw).ok())
        .collect();
    let fresh: Vec<_> = suggestions
        .into_iter()
        .filter(|s| !allow_patterns.iter().any(|p| p.matches(&s.command)))
        .collect();

    if args.json {
        let value: Vec<serde_json::Value> = fresh
            .iter()
            .map(|s| {
                serde_json::json!({
                    "rule": format!("Bash({})", s.command),
                    "command": s.command,
                    "count": s.count,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&value).unwrap_or_default()
        );
        return 0;
    }

    if fresh.is_empty() {
        println!("no suggestions (min count {})", args.min_count);
        return 0;
    }
    for suggestion in &fresh {
        println!("Bash({})  # allowed {} times", suggestion.command, suggestion.count);
    }
    0
}

pub(crate) fn db(args: &DbArgs) -> i32 {
    match &args.action {
        DbAction::Migrate => match Store::migrate(tyr_config::db_path()) {
            Ok(0) => {
                println!("database is up to date");
                0
            }
            Ok(n) => {
                println!("applied {n} migration(s)");
                0
            }
            Err(e) => {
                eprintln!("tyr: {e}");
                1
            }
        },
        DbAction::Rename { old, new } => {
            let mut store = match open_store() {
                Ok(store) => store,
                Err(code) => return code,
            };
            match store.rename_cwd(old, new) {
                Ok(n) => {
                    println!("rewrote {n} row(s)");
                    0
                }
                Err(e) => {
                    eprintln!("tyr: {e}");
                    1
                }
            }
        }
    }
}

pub(crate) fn config(args: &ConfigArgs) -> i32 {
    match &args.action {
        ConfigAction::Show => match tyr_config::load_config() {
            Ok(config) => {
                println!("{}", tyr_config::show_config(&config));
                0
            }
            Err(e) => {
                eprintln!("tyr: {e}");
                1
            }
        },
        ConfigAction::Set { key, value } => {
            match tyr_config::set_config_key(&tyr_config::config_path(), key, value) {
                Ok(()) => {
                    println!("set {key}");
                    0
                }
                Err(e) => {
                    eprintln!("tyr: {e}");
                    1
                }
            }
        }
        ConfigAction::Path => {
            println!("{}", tyr_config::config_path().display());
            0
        }
        ConfigAction::Env { action } => match action {
            EnvAction::Show => match tyr_config::read_env_file(&tyr_config::env_file_path()) {
                Ok(entries) => {
                    for (key, value) in entries {
                        println!("{key}={value}");
                    }
                    0
                }
                Err(e) => {
                    eprintln!("tyr: {e}");
                    1
                }
            },
            EnvAction::Set { key, value } => {
                match tyr_config::set_env_var(&tyr_config::env_file_path(), key, value) {
                    Ok(()) => {
                        println!("set {key}");
                        0
                    }
                    Err(e) => {
                        eprintln!("tyr: {e}");
                        1
                    }
                }
            }
            EnvAction::Path => {
                println!("{}", tyr_config::env_file_path().display());
                0
            }
        },
    }
}

fn open_store() -> Result<Store, i32> {
    Store::open(tyr_config::db_path()).map_err(|e| {
        eprintln!("tyr: {e}");
        1
    })
}

fn load_config_or_default() -> TyrConfig {
    match tyr_config::load_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Config unreadable, using defaults: {e}");
            TyrConfig::default()
        }
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
