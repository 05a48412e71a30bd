//! Action implementations
//!
//! # Available Actions
//!
//! - `copy` - Copy a tree from the manifest directory into the workspace
//! - `download` - Fetch a file over HTTP(S), optionally unpacking it
//! - `efiboot` - Build a FAT image with the EFI boot loader of a commit
//! - `mkiso` - Master a bootable ISO image
//! - `ostree-checkout` - Check out selected files of a commit
//! - `ostree-deploy` - Deploy an OS into a sysroot
//! - `ostree-mirror` - Mirror branches from a remote
//! - `ostree-pull` - Pull branches from a remote
//! - `run` - Run an inline command or a script
//! - `template` - Render a template file into the workspace

mod copy;
mod download;
mod efiboot;
mod mkiso;
mod ostree_checkout;
mod ostree_deploy;
mod ostree_mirror;
mod ostree_pull;
mod run;
mod template;

pub use copy::CopySpec;
pub use download::DownloadSpec;
pub use efiboot::EfiBootSpec;
pub use mkiso::{Artifacts, MkIsoSpec};
pub use ostree_checkout::{FileEntry, OstreeCheckoutSpec};
pub use ostree_deploy::OstreeDeploySpec;
pub use ostree_mirror::OstreeMirrorSpec;
pub use ostree_pull::OstreePullSpec;
pub use run::RunSpec;
pub use template::TemplateSpec;

use crate::traits::ActionSpec;
use serde::de::DeserializeOwned;
use std::fmt;

/// Every action kind a manifest may name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Copy,
    Download,
    EfiBoot,
    MkIso,
    OstreeCheckout,
    OstreeDeploy,
    OstreeMirror,
    OstreePull,
    Run,
    Template,
}

impl ActionKind {
    pub const ALL: [ActionKind; 10] = [
        ActionKind::Copy,
        ActionKind::Download,
        ActionKind::EfiBoot,
        ActionKind::MkIso,
        ActionKind::OstreeCheckout,
        ActionKind::OstreeDeploy,
        ActionKind::OstreeMirror,
        ActionKind::OstreePull,
        ActionKind::Run,
        ActionKind::Template,
    ];

    /// Tag used in manifests
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Copy => "copy",
            ActionKind::Download => "download",
            ActionKind::EfiBoot => "efiboot",
            ActionKind::MkIso => "mkiso",
            ActionKind::OstreeCheckout => "ostree-checkout",
            ActionKind::OstreeDeploy => "ostree-deploy",
            ActionKind::OstreeMirror => "ostree-mirror",
            ActionKind::OstreePull => "ostree-pull",
            ActionKind::Run => "run",
            ActionKind::Template => "template",
        }
    }

    /// Look up a kind by its exact tag
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }

    /// Decode the kind-specific fields of a manifest entry
    pub fn decode(self, value: serde_yaml::Value) -> Result<Box<dyn ActionSpec>, serde_yaml::Error> {
        match self {
            ActionKind::Copy => decode::<CopySpec>(value),
            ActionKind::Download => decode::<DownloadSpec>(value),
            ActionKind::EfiBoot => decode::<EfiBootSpec>(value),
            ActionKind::MkIso => decode::<MkIsoSpec>(value),
            ActionKind::OstreeCheckout => decode::<OstreeCheckoutSpec>(value),
            ActionKind::OstreeDeploy => decode::<OstreeDeploySpec>(value),
            ActionKind::OstreeMirror => decode::<OstreeMirrorSpec>(value),
            ActionKind::OstreePull => decode::<OstreePullSpec>(value),
            ActionKind::Run => decode::<RunSpec>(value),
            ActionKind::Template => decode::<TemplateSpec>(value),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn decode<T>(value: serde_yaml::Value) -> Result<Box<dyn ActionSpec>, serde_yaml::Error>
where
    T: ActionSpec + DeserializeOwned + 'static,
{
    Ok(Box::new(serde_yaml::from_value::<T>(value)?))
}
