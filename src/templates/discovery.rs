//! @acp:module "Template Discovery"
//! @acp:summary "Four-tier deterministic template lookup with a process-wide manifest cache"
//! @acp:domain templates
//! @acp:layer service
//!
//! Tiers, first match wins:
//! 1. built-in templates
//! 2. installed packages `<data_dir>/texsmith/packages/texsmith-template-<name>/`
//! 3. local `templates/<name>` in the working directory and each ancestor,
//!    nearest first, then configured template paths
//! 4. home `~/.texsmith/templates/<name>`
//!
//! An explicit path bypasses the tiers.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::SystemTime;

use serde::Serialize;
use walkdir::WalkDir;

use super::{builtin, ComponentRoot, LoadedTemplate, MANIFEST_FILE};
use crate::error::{Result, TexsmithError};

/// Prefix of installed template package directories.
pub const PACKAGE_PREFIX: &str = "texsmith-template-";

/// @acp:summary "Discovery tier a template was found in"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateTier {
    Builtin,
    Installed,
    Local,
    Home,
    Path,
}

impl fmt::Display for TemplateTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TemplateTier::Builtin => "builtin",
            TemplateTier::Installed => "installed",
            TemplateTier::Local => "local",
            TemplateTier::Home => "home",
            TemplateTier::Path => "path",
        };
        write!(f, "{}", name)
    }
}

/// @acp:summary "Filesystem anchors for discovery, injectable for tests"
#[derive(Debug, Clone, Default)]
pub struct DiscoveryRoots {
    pub cwd: PathBuf,
    pub data_dir: Option<PathBuf>,
    pub home: Option<PathBuf>,
    /// Extra directories searched at the end of the local tier
    pub template_paths: Vec<PathBuf>,
}

impl DiscoveryRoots {
    /// Anchors from the process environment.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            cwd: std::env::current_dir()?,
            data_dir: dirs::data_dir(),
            home: dirs::home_dir(),
            template_paths: Vec::new(),
        })
    }

    pub fn with_template_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.template_paths = paths;
        self
    }

    fn installed_dir(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|d| d.join("texsmith").join("packages"))
    }

    fn home_dir(&self) -> Option<PathBuf> {
        self.home.as_ref().map(|h| h.join(".texsmith").join("templates"))
    }

    /// Local tier directories, nearest first.
    fn local_dirs(&self) -> Vec<PathBuf> {
        self.cwd
            .ancestors()
            .map(|dir| dir.join("templates"))
            .chain(self.template_paths.iter().cloned())
            .collect()
    }
}

/// @acp:summary "Where a template name resolved to"
#[derive(Debug, Clone)]
pub struct TemplateLocation {
    pub tier: TemplateTier,
    pub root: ComponentRoot,
}

/// Directory holding the manifest: `dir/manifest.toml` or `dir/template/manifest.toml`.
pub fn find_manifest_dir(dir: &Path) -> Option<PathBuf> {
    [dir.to_path_buf(), dir.join("template")]
        .into_iter()
        .find(|candidate| candidate.join(MANIFEST_FILE).is_file())
}

fn is_explicit_path(reference: &str) -> bool {
    reference.contains('/')
        || reference.contains(std::path::MAIN_SEPARATOR)
        || reference.starts_with('.')
        || reference.starts_with('~')
}

/// @acp:summary "Locate a template by name or explicit path"
pub fn locate_template(reference: &str, roots: &DiscoveryRoots) -> Result<TemplateLocation> {
    if is_explicit_path(reference) {
        let path = match reference.strip_prefix("~/") {
            Some(rest) => roots.home.clone().unwrap_or_default().join(rest),
            None => roots.cwd.join(reference),
        };
        return find_manifest_dir(&path)
            .map(|dir| TemplateLocation {
                tier: TemplateTier::Path,
                root: ComponentRoot::Directory(dir),
            })
            .ok_or_else(|| TexsmithError::TemplateNotFound {
                name: reference.to_string(),
                searched: vec![format!("path: {}", path.display())],
            });
    }

    let mut searched = Vec::new();

    if let Some(bundle) = builtin::template(reference) {
        return Ok(TemplateLocation {
            tier: TemplateTier::Builtin,
            root: ComponentRoot::Builtin(bundle),
        });
    }
    searched.push("builtin".to_string());

    let mut candidates: Vec<(TemplateTier, PathBuf)> = Vec::new();
    if let Some(installed) = roots.installed_dir() {
        candidates.push((TemplateTier::Installed, installed.join(format!("{}{}", PACKAGE_PREFIX, reference))));
    }
    for dir in roots.local_dirs() {
        candidates.push((TemplateTier::Local, dir.join(reference)));
    }
    if let Some(home) = roots.home_dir() {
        candidates.push((TemplateTier::Home, home.join(reference)));
    }

    for (tier, candidate) in candidates {
        if let Some(dir) = find_manifest_dir(&candidate) {
            tracing::debug!(template = %reference, tier = %tier, path = %dir.display(), "template located");
            return Ok(TemplateLocation {
                tier,
                root: ComponentRoot::Directory(dir),
            });
        }
        searched.push(format!("{}: {}", tier, candidate.display()));
    }

    Err(TexsmithError::TemplateNotFound {
        name: reference.to_string(),
        searched,
    })
}

type CacheKey = (PathBuf, Option<SystemTime>);

fn cache() -> &'static Mutex<HashMap<CacheKey, Arc<LoadedTemplate>>> {
    static CACHE: OnceLock<Mutex<HashMap<CacheKey, Arc<LoadedTemplate>>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

fn cache_key(location: &TemplateLocation) -> CacheKey {
    match &location.root {
        ComponentRoot::Builtin(bundle) => (PathBuf::from(format!("builtin:{}", bundle.name)), None),
        ComponentRoot::Directory(dir) => {
            let manifest = dir.join(MANIFEST_FILE);
            let canonical = manifest.canonicalize().unwrap_or(manifest);
            (canonical, newest_modification(dir))
        }
    }
}

/// Newest mtime of any file in the template tree, so edits to the
/// entrypoint or partials invalidate the cache too.
fn newest_modification(dir: &Path) -> Option<SystemTime> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok()?.modified().ok())
        .max()
}

/// @acp:summary "Load a located template, memoized by manifest path and newest file mtime"
pub fn load_template(location: &TemplateLocation) -> Result<Arc<LoadedTemplate>> {
    let key = cache_key(location);
    if let Ok(cached) = cache().lock() {
        if let Some(template) = cached.get(&key) {
            return Ok(Arc::clone(template));
        }
    }

    let template = Arc::new(LoadedTemplate::load(location.root.clone(), location.tier)?);
    if let Ok(mut cached) = cache().lock() {
        cached.insert(key, Arc::clone(&template));
    }
    Ok(template)
}

/// @acp:summary "One discoverable template, for `templates list`"
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateListing {
    pub name: String,
    pub tier: TemplateTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Set when an earlier tier provides the same name
    pub shadowed: bool,
}

/// @acp:summary "Enumerate every template across all tiers"
pub fn list_templates(roots: &DiscoveryRoots) -> Vec<TemplateListing> {
    let mut listings: Vec<TemplateListing> = builtin::template_names()
        .map(|name| TemplateListing {
            name: name.to_string(),
            tier: TemplateTier::Builtin,
            path: None,
            shadowed: false,
        })
        .collect();

    let mut scan: Vec<(TemplateTier, PathBuf)> = Vec::new();
    if let Some(installed) = roots.installed_dir() {
        scan.push((TemplateTier::Installed, installed));
    }
    for dir in roots.local_dirs() {
        scan.push((TemplateTier::Local, dir));
    }
    if let Some(home) = roots.home_dir() {
        scan.push((TemplateTier::Home, home));
    }

    for (tier, dir) in scan {
        if !dir.is_dir() {
            continue;
        }
        let mut found: Vec<(String, PathBuf)> = WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir())
            .filter_map(|e| {
                let folder = e.file_name().to_string_lossy().to_string();
                let name = match tier {
                    TemplateTier::Installed => folder.strip_prefix(PACKAGE_PREFIX)?.to_string(),
                    _ => folder,
                };
                find_manifest_dir(e.path()).map(|manifest_dir| (name, manifest_dir))
            })
            .collect();
        found.sort();

        for (name, path) in found {
            let shadowed = listings.iter().any(|l| l.name == name);
            listings.push(TemplateListing {
                name,
                tier,
                path: Some(path),
                shadowed,
            });
        }
    }

    listings
}
