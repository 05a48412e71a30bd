//! OS image creator action engine
//!
//! A build is described by a YAML manifest: a list of actions run in
//! order inside a workspace. This crate loads manifests, turns every
//! entry into a validated action and drives the pipeline.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │                Manifest                   │
//! │  template ─▶ YAML ─▶ ActionKind decode    │
//! └──────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌──────────────────────────────────────────┐
//! │                Pipeline                   │
//! │  - Validate every action first            │
//! │  - Run actions in manifest order          │
//! │  - Clean up started actions in reverse    │
//! └──────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use oic_actions::{BuildContext, Manifest, Pipeline};
//!
//! let manifest = Manifest::load("image.yaml", &vars)?;
//! let ctx = BuildContext::new(manifest_dir, output_dir, workspace);
//! Pipeline::new().build(&manifest, &ctx).await?;
//! ```

pub mod actions;
pub mod command;
pub mod context;
pub mod engine;
pub mod error;
pub mod fsutil;
pub mod manifest;
pub mod reporter;
pub mod template;
pub mod traits;

pub use actions::ActionKind;
pub use context::{join_clean, BuildContext};
pub use engine::{Pipeline, PipelineState};
pub use error::{ActionError, BuildError, ManifestError, Result};
pub use manifest::{Manifest, ManifestAction, Variables};
pub use reporter::{CollectingReporter, Event, Level, NoopReporter, Reporter, TracingReporter};
pub use traits::{Action, ActionSpec, BaseAction};
