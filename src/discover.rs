//! Locating the installed package and its target bundles.

use globset::{Glob, GlobSet, GlobSetBuilder};
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use walkdir::WalkDir;

/// File-name families that may carry a patch site.
pub const TARGET_PATTERNS: [&str; 3] = ["reply-*.js", "pi-embedded-*.js", "subagent-registry-*.js"];

pub const PACKAGE_NAME: &str = "openclaw";

const FALLBACK_EXECUTABLES: [&str; 3] = [
    "/opt/homebrew/bin/openclaw",
    "/usr/local/bin/openclaw",
    "/usr/bin/openclaw",
];

static TARGET_GLOBS: Lazy<GlobSet> = Lazy::new(|| {
    let mut builder = GlobSetBuilder::new();
    for pattern in TARGET_PATTERNS {
        builder.add(Glob::new(pattern).expect("target pattern is a valid glob"));
    }
    builder.build().expect("target globs compile")
});

static JS_GLOB: Lazy<GlobSet> = Lazy::new(|| {
    let mut builder = GlobSetBuilder::new();
    builder.add(Glob::new("*.js").expect("valid glob"));
    builder.build().expect("js glob compiles")
});

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("dist dir not found: {0}")]
    DistMissing(PathBuf),

    #[error("failed to list {path}: {source}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },

    #[error("{} package dir not found. Tried paths:{}", PACKAGE_NAME, format_tried(.tried))]
    PackageNotFound { tried: Vec<String> },
}

fn format_tried(tried: &[String]) -> String {
    tried.iter().map(|entry| format!("\n  - {entry}")).collect()
}

/// File names directly inside `dist` matching `globs`, sorted.
fn list_dist(dist: &Path, globs: &GlobSet) -> Result<Vec<PathBuf>, DiscoveryError> {
    if !dist.is_dir() {
        return Err(DiscoveryError::DistMissing(dist.to_path_buf()));
    }

    let mut found = BTreeSet::new();
    for entry in WalkDir::new(dist).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|source| DiscoveryError::Walk {
            path: dist.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() && !entry.path_is_symlink() {
            continue;
        }
        if globs.is_match(entry.file_name()) {
            found.insert(entry.into_path());
        }
    }
    Ok(found.into_iter().collect())
}

/// Target bundles in `dist`, sorted and deduplicated.
pub fn find_target_bundles(dist: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    let bundles = list_dist(dist, &TARGET_GLOBS)?;
    tracing::debug!(dist = %dist.display(), count = bundles.len(), "found target bundles");
    Ok(bundles)
}

pub fn dist_has_target_bundles(dist: &Path) -> bool {
    find_target_bundles(dist).is_ok_and(|bundles| !bundles.is_empty())
}

/// `reply-AbC123.js` -> `reply-*.js`; `index.js` -> `index.js`.
pub fn bundle_family(file_name: &str) -> String {
    let stem = file_name.strip_suffix(".js").unwrap_or(file_name);
    match stem.rsplit_once('-') {
        Some((family, _)) => format!("{family}-*.js"),
        None => format!("{stem}.js"),
    }
}

/// Every `dist/*.js` grouped by bundle family.
pub fn family_inventory(dist: &Path) -> Result<BTreeMap<String, Vec<String>>, DiscoveryError> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for path in list_dist(dist, &JS_GLOB)? {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        grouped
            .entry(bundle_family(name))
            .or_default()
            .push(name.to_string());
    }
    Ok(grouped)
}

/// `version` from the package's `package.json`, else `unknown`.
pub fn read_target_version(pkg_dir: &Path) -> String {
    fs::read_to_string(pkg_dir.join("package.json"))
        .ok()
        .and_then(|text| serde_json::from_str::<serde_json::Value>(&text).ok())
        .and_then(|doc| {
            doc.get("version")
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// First executable file named `program` on `PATH`.
pub fn which(program: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Where to look for the installed package.
#[derive(Debug, Clone)]
pub struct PackageLocator {
    /// Candidate executables, in order.
    pub executables: Vec<PathBuf>,
    /// `(label, command)` pairs printing a global `node_modules` root.
    pub node_roots: Vec<(String, Vec<String>)>,
}

impl PackageLocator {
    /// `openclaw` on `PATH`, the usual install locations, then npm/pnpm.
    pub fn system() -> Self {
        let executables = which(PACKAGE_NAME)
            .into_iter()
            .chain(FALLBACK_EXECUTABLES.iter().map(PathBuf::from))
            .collect();
        let node_roots = ["npm", "pnpm"]
            .iter()
            .map(|tool| {
                (
                    tool.to_string(),
                    vec![tool.to_string(), "root".to_string(), "-g".to_string()],
                )
            })
            .collect();
        Self {
            executables,
            node_roots,
        }
    }

    pub fn resolve(&self) -> Result<PathBuf, DiscoveryError> {
        let mut search = Search::default();

        let mut seen_execs = HashSet::new();
        for exe in &self.executables {
            if !seen_execs.insert(exe.clone()) {
                continue;
            }
            if !exe.exists() {
                search.tried.push(format!("{} (executable missing)", exe.display()));
                continue;
            }
            if let Some(found) = search.from_executable(exe) {
                return Ok(found);
            }
        }

        for (label, command) in &self.node_roots {
            if let Some(found) = search.from_node_root(label, command) {
                return Ok(found);
            }
        }

        Err(DiscoveryError::PackageNotFound {
            tried: search.tried,
        })
    }
}

#[derive(Default)]
struct Search {
    tried: Vec<String>,
    seen: HashSet<PathBuf>,
}

impl Search {
    fn try_pkg_dir(&mut self, candidate: &Path, reason: &str) -> Option<PathBuf> {
        if !self.seen.insert(candidate.to_path_buf()) {
            return None;
        }

        let dist = candidate.join("dist");
        let note = if dist_has_target_bundles(&dist) {
            self.tried.push(format!(
                "{} ({reason}; dist has target bundles)",
                candidate.display()
            ));
            return Some(candidate.to_path_buf());
        } else if dist.is_dir() {
            "dist exists but no target bundles"
        } else {
            "missing dist"
        };
        self.tried
            .push(format!("{} ({reason}; {note})", candidate.display()));
        None
    }

    fn from_executable(&mut self, exe: &Path) -> Option<PathBuf> {
        let resolved = match exe.canonicalize() {
            Ok(resolved) => resolved,
            Err(error) => {
                self.tried
                    .push(format!("{} (resolve failed: {error})", exe.display()));
                return None;
            }
        };
        let pkg_candidate = resolved.parent()?.to_path_buf();

        let reason = format!(
            "from {PACKAGE_NAME} executable {} -> {}",
            exe.display(),
            resolved.display()
        );
        if let Some(found) = self.try_pkg_dir(&pkg_candidate, &reason) {
            return Some(found);
        }

        if pkg_candidate.join("dist").is_dir() {
            return None;
        }
        let reason = format!("parent walk from {}", pkg_candidate.display());
        for parent in pkg_candidate.ancestors().skip(1) {
            if let Some(found) = self.try_pkg_dir(parent, &reason) {
                return Some(found);
            }
        }
        None
    }

    fn from_node_root(&mut self, label: &str, command: &[String]) -> Option<PathBuf> {
        let (program, args) = command.split_first()?;
        let shown = command.join(" ");

        let output = match Command::new(program).args(args).output() {
            Ok(output) => output,
            Err(_) => {
                self.tried
                    .push(format!("{label}: command not found ({shown})"));
                return None;
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let detail = [stderr.trim(), stdout.trim()]
                .into_iter()
                .find(|s| !s.is_empty())
                .unwrap_or("no output");
            self.tried.push(format!(
                "{label}: failed ({shown}), rc={}, detail={detail}",
                output.status.code().unwrap_or(-1)
            ));
            return None;
        }

        let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if root.is_empty() {
            self.tried
                .push(format!("{label}: empty output from {shown}"));
            return None;
        }

        let candidate = crate::config::expand_tilde(root).join(PACKAGE_NAME);
        self.try_pkg_dir(&candidate, &format!("{label} root"))
    }
}
