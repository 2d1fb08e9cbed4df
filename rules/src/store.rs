//! The rule store: merged allow/deny lists with atomic hot reload.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};

use crate::parse::extract_bash_patterns;
use crate::pattern::Pattern;
use crate::scopes::scope_paths;

/// Result of matching one simple command against the merged rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleMatch {
    Allow,
    Deny,
    Unknown,
}

/// Raw pattern lists, for LLM prompts and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RulesDebugInfo {
    pub allow: Vec<String>,
    pub deny: Vec<String>,
}

/// One immutable parse of every configured settings file. Readers hold an
/// `Arc` to the whole thing, so a reload can never expose half-updated
/// lists.
#[derive(Default)]
struct Snapshot {
    allow: Vec<Pattern>,
    deny: Vec<Pattern>,
}

/// Merged permission rules from the four settings scopes.
pub struct RuleStore {
    paths: Vec<PathBuf>,
    snapshot: Arc<RwLock<Arc<Snapshot>>>,
    watcher: Option<RecommendedWatcher>,
}

impl RuleStore {
    /// Read every scope file under `cwd` (or an explicit path list) and
    /// build the merged lists. Missing files are not errors; unparsable
    /// files are skipped without affecting their siblings.
    #[must_use]
    pub fn load(cwd: &Path, override_paths: Option<Vec<PathBuf>>) -> Self {
        let paths = override_paths.unwrap_or_else(|| scope_paths(cwd));
        let snapshot = Arc::new(RwLock::new(Arc::new(build_snapshot(&paths))));
        Self {
            paths,
            snapshot,
            watcher: None,
        }
    }

    /// Start watching the settings files for changes. Any event re-parses
    /// every configured path and swaps the snapshot wholesale; a burst of
    /// events collapses because each swap reflects the files as they are.
    pub fn watch(&mut self) -> notify::Result<()> {
        if self.watcher.is_some() {
            return Ok(());
        }

        let paths = self.paths.clone();
        let slot = Arc::clone(&self.snapshot);
        let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
            match event {
                Ok(_) => swap_snapshot(&paths, &slot),
                Err(e) => tracing::warn!("Rule watcher error: {e}"),
            }
        })?;

        let mut watched = Vec::new();
        for path in &self.paths {
            let Some(parent) = path.parent() else { continue };
            if !parent.is_dir() || watched.contains(&parent.to_path_buf()) {
                continue;
            }
            if let Err(e) = watcher.watch(parent, RecursiveMode::NonRecursive) {
                tracing::warn!(path = %parent.display(), "Failed to watch settings dir: {e}");
                continue;
            }
            watched.push(parent.to_path_buf());
        }

        self.watcher = Some(watcher);
        Ok(())
    }

    /// Re-parse every configured path now. The watcher does this on file
    /// events; callers can force it for deterministic tests.
    pub fn reload(&self) {
        swap_snapshot(&self.paths, &self.snapshot);
    }

    /// Match one reconstructed simple command. Deny patterns are checked
    /// first, so a deny anywhere beats every allow.
    #[must_use]
    pub fn classify(&self, command: &str) -> RuleMatch {
        let snapshot = self.current();
        if snapshot.deny.iter().any(|p| p.matches(command)) {
            return RuleMatch::Deny;
        }
        if snapshot.allow.iter().any(|p| p.matches(command)) {
            return RuleMatch::Allow;
        }
        RuleMatch::Unknown
    }

    /// The merged pattern lists as written in the settings files.
    #[must_use]
    pub fn debug_info(&self) -> RulesDebugInfo {
        let snapshot = self.current();
        RulesDebugInfo {
            allow: snapshot.allow.iter().map(|p| p.raw().to_string()).collect(),
            deny: snapshot.deny.iter().map(|p| p.raw().to_string()).collect(),
        }
    }

    /// Stop the file watcher. Classification keeps working against the
    /// last snapshot.
    pub fn close(&mut self) {
        self.watcher = None;
    }

    fn current(&self) -> Arc<Snapshot> {
        self.snapshot
            .read()
            .map(|guard| Arc::clone(&*guard))
            .unwrap_or_default()
    }
}

fn swap_snapshot(paths: &[PathBuf], slot: &RwLock<Arc<Snapshot>>) {
    let next = Arc::new(build_snapshot(paths));
    if let Ok(mut guard) = slot.write() {
        *guard = next;
    }
}

fn build_snapshot(paths: &[PathBuf]) -> Snapshot {
    let mut snapshot = Snapshot::default();
    for path in paths {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => {
                tracing::warn!(path = %path.display(), "Failed to read settings file: {e}");
                continue;
            }
        };
        let extracted = extract_bash_patterns(&text);
        compile_into(&mut snapshot.allow, &extracted.allow, path);
        compile_into(&mut snapshot.deny, &extracted.deny, path);
    }
    snapshot
}

fn compile_into(target: &mut Vec<Pattern>, patterns: &[String], path: &Path) {
    for raw in patterns {
        match Pattern::new(raw) {
            Ok(pattern) => target.push(pattern),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    pattern = %raw,
                    "Skipping uncompilable rule pattern: {e}"
                );
            }
        }
    }
}
