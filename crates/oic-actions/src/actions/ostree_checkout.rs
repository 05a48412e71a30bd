//! Selective checkout action
//!
//! Walks a subtree of a commit and checks out the entries whose name
//! matches one of the configured patterns, e.g. kernels and initramfs
//! images out of `/usr/lib/ostree-boot`.

use crate::context::BuildContext;
use crate::error::{ActionError, Result};
use crate::reporter::Event;
use crate::traits::{Action, ActionSpec, BaseAction};
use async_trait::async_trait;
use glob::Pattern;
use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;
use std::fmt;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

/// Configuration of an `ostree-checkout` entry
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OstreeCheckoutSpec {
    pub repository: String,
    pub branch: String,
    /// Root of the walk inside the commit
    pub from: String,
    pub to: String,
    pub files: Vec<FileEntry>,
}

/// Name pattern and optional permission bits of checked out files
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileEntry {
    pub glob: String,
    #[serde(deserialize_with = "deserialize_mode")]
    pub mode: u32,
}

/// Accept `"0644"`, `"644"` or `644`, all meaning `0o644`
fn deserialize_mode<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    struct ModeVisitor;

    impl<'de> Visitor<'de> for ModeVisitor {
        type Value = u32;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an octal file mode")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<u32, E> {
            parse_octal(v).ok_or_else(|| E::custom(format!("invalid file mode \"{}\"", v)))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<u32, E> {
            self.visit_str(&v.to_string())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<u32, E> {
            if v < 0 {
                return Err(E::custom(format!("invalid file mode {}", v)));
            }
            self.visit_str(&v.to_string())
        }
    }

    deserializer.deserialize_any(ModeVisitor)
}

fn parse_octal(s: &str) -> Option<u32> {
    let s = s.trim();
    let digits = s
        .strip_prefix("0o")
        .or_else(|| s.strip_prefix("0O"))
        .unwrap_or(s);
    if digits.is_empty() {
        return None;
    }
    u32::from_str_radix(digits, 8).ok().filter(|mode| *mode <= 0o7777)
}

impl ActionSpec for OstreeCheckoutSpec {
    fn validate(&self, base: &BaseAction, ctx: &BuildContext) -> Result<Box<dyn Action>> {
        for (property, value) in [
            ("repository", &self.repository),
            ("branch", &self.branch),
            ("from", &self.from),
            ("to", &self.to),
        ] {
            if value.is_empty() {
                return Err(ActionError::missing(property, &base.action));
            }
        }

        let to = ctx.workspace_path(&self.to);
        if !ctx.is_within_workspace(&to) {
            return Err(ActionError::OutsideWorkspace {
                property: "to".to_string(),
                path: to,
            });
        }

        let files = self
            .files
            .iter()
            .map(|file| {
                Pattern::new(&file.glob)
                    .map(|pattern| (pattern, file.mode))
                    .map_err(|e| {
                        ActionError::InvalidProperty(format!(
                            "invalid glob \"{}\" for the \"{}\" action: {}",
                            file.glob,
                            base.description(),
                            e
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Box::new(OstreeCheckoutAction {
            description: base.description().to_string(),
            repository: ctx.workspace_path(&self.repository),
            branch: self.branch.clone(),
            from: self.from.clone(),
            to,
            files,
        }))
    }
}

struct OstreeCheckoutAction {
    description: String,
    repository: PathBuf,
    branch: String,
    from: String,
    to: PathBuf,
    files: Vec<(Pattern, u32)>,
}

impl OstreeCheckoutAction {
    /// Mode of the first pattern matching `name`
    fn matching(&self, name: &str) -> Option<u32> {
        self.files
            .iter()
            .find(|(pattern, _)| pattern.matches(name))
            .map(|(_, mode)| *mode)
    }
}

#[async_trait]
impl Action for OstreeCheckoutAction {
    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, ctx: &BuildContext) -> Result<()> {
        tokio::fs::create_dir_all(&self.to).await?;

        let repo = ctx.store_provider().open(&self.repository).await?;
        let commit = repo.resolve_rev(&self.branch).await?;

        for entry in repo.walk(&commit, &self.from).await? {
            let name = entry.file_name();
            let Some(mode) = self.matching(name) else {
                continue;
            };

            ctx.reporter().report(Event::debug(format!(
                "Checking out {} into {}",
                entry.path,
                self.to.display()
            )));
            repo.checkout(&commit, &entry.path, &self.to).await?;

            // Directories merge into `to`, so there is no entry to chmod
            if mode > 0 && !entry.is_dir() {
                let permissions = std::fs::Permissions::from_mode(mode);
                tokio::fs::set_permissions(self.to.join(name), permissions).await?;
            }
        }
        Ok(())
    }
}
