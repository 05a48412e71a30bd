//! Build context shared by every action
//!
//! The context holds the directory layout of a build, the user's
//! switches, the template variables and the collaborators (reporter and
//! revision store provider). It is created once by the caller and passed
//! by reference to every validate/run/cleanup call.

use crate::reporter::{NoopReporter, Reporter};
use oic_ostree::{OstreeCli, StoreProvider};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Name of the scratch directory inside the workspace
pub const SCRATCH_DIR_NAME: &str = "scrap";

/// Name of the download directory inside the workspace
pub const DOWNLOAD_DIR_NAME: &str = "downloads";

/// Context provided to actions during a build
#[derive(Clone)]
pub struct BuildContext {
    architecture: String,
    manifest_dir: PathBuf,
    output_dir: PathBuf,
    workspace_dir: PathBuf,
    scratch_dir: PathBuf,
    download_dir: PathBuf,
    keep: bool,
    force: bool,
    verbose: bool,
    template_vars: HashMap<String, Value>,
    reporter: Arc<dyn Reporter>,
    store_provider: Arc<dyn StoreProvider>,
}

impl BuildContext {
    /// Create a context for a build rooted at `workspace_dir`
    ///
    /// Scratch and download directories default to `scrap` and
    /// `downloads` inside the workspace.
    pub fn new(
        manifest_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        workspace_dir: impl Into<PathBuf>,
    ) -> Self {
        let workspace_dir = workspace_dir.into();
        Self {
            architecture: std::env::consts::ARCH.to_string(),
            manifest_dir: manifest_dir.into(),
            output_dir: output_dir.into(),
            scratch_dir: workspace_dir.join(SCRATCH_DIR_NAME),
            download_dir: workspace_dir.join(DOWNLOAD_DIR_NAME),
            workspace_dir,
            keep: false,
            force: false,
            verbose: false,
            template_vars: HashMap::new(),
            reporter: Arc::new(NoopReporter),
            store_provider: Arc::new(OstreeCli),
        }
    }

    pub fn with_architecture(mut self, arch: impl Into<String>) -> Self {
        self.architecture = arch.into();
        self
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    /// Keep the workspace when the build ends
    pub fn with_keep(mut self, keep: bool) -> Self {
        self.keep = keep;
        self
    }

    /// Allow overwriting existing output artifacts
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Replace the template variables
    pub fn with_template_vars(mut self, vars: HashMap<String, Value>) -> Self {
        self.template_vars = vars;
        self
    }

    /// Add a single template variable
    pub fn with_template_var(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.template_vars.insert(key.into(), value.into());
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_store_provider(mut self, provider: Arc<dyn StoreProvider>) -> Self {
        self.store_provider = provider;
        self
    }

    /// Target architecture name (e.g. `x86_64`)
    pub fn architecture(&self) -> &str {
        &self.architecture
    }

    /// Directory containing the manifest
    pub fn manifest_dir(&self) -> &Path {
        &self.manifest_dir
    }

    /// Directory receiving the final artifacts
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn workspace_dir(&self) -> &Path {
        &self.workspace_dir
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    pub fn keep(&self) -> bool {
        self.keep
    }

    pub fn force(&self) -> bool {
        self.force
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn template_vars(&self) -> &HashMap<String, Value> {
        &self.template_vars
    }

    pub fn template_var(&self, key: &str) -> Option<&Value> {
        self.template_vars.get(key)
    }

    pub fn reporter(&self) -> &Arc<dyn Reporter> {
        &self.reporter
    }

    pub fn store_provider(&self) -> &Arc<dyn StoreProvider> {
        &self.store_provider
    }

    /// Resolve a manifest path against the manifest directory
    pub fn manifest_path(&self, path: impl AsRef<Path>) -> PathBuf {
        join_clean(&self.manifest_dir, path.as_ref())
    }

    /// Resolve a path against the workspace
    pub fn workspace_path(&self, path: impl AsRef<Path>) -> PathBuf {
        join_clean(&self.workspace_dir, path.as_ref())
    }

    /// Resolve a path against the download directory
    pub fn download_path(&self, path: impl AsRef<Path>) -> PathBuf {
        join_clean(&self.download_dir, path.as_ref())
    }

    /// Resolve a path against the output directory
    pub fn output_path(&self, path: impl AsRef<Path>) -> PathBuf {
        join_clean(&self.output_dir, path.as_ref())
    }

    /// Whether `path` is the workspace or lies below it
    pub fn is_within_workspace(&self, path: &Path) -> bool {
        path.starts_with(&self.workspace_dir)
    }

    /// Create the workspace, scratch, download and output directories
    pub async fn create_dirs(&self) -> std::io::Result<()> {
        for dir in [
            &self.workspace_dir,
            &self.scratch_dir,
            &self.download_dir,
            &self.output_dir,
        ] {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildContext")
            .field("architecture", &self.architecture)
            .field("manifest_dir", &self.manifest_dir)
            .field("output_dir", &self.output_dir)
            .field("workspace_dir", &self.workspace_dir)
            .field("keep", &self.keep)
            .field("force", &self.force)
            .field("verbose", &self.verbose)
            .field("template_vars", &self.template_vars.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Join `path` under `base` and normalise the result lexically
///
/// An absolute `path` is still placed under `base`. `..` components are
/// applied, so the result can end up outside `base`; callers that care
/// check with [`Path::starts_with`].
pub fn join_clean(base: &Path, path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in base.components().chain(path.components()) {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                if out.as_os_str().is_empty() {
                    out.push(component.as_os_str());
                }
            }
            Component::CurDir => {}
            Component::ParentDir => match out.file_name() {
                Some(_) => {
                    out.pop();
                }
                None if out.has_root() => {}
                None => out.push(".."),
            },
            Component::Normal(name) => out.push(name),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}
