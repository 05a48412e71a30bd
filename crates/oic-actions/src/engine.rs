//! Pipeline driver
//!
//! The [`Pipeline`] takes the actions declared by a manifest through
//! their lifecycle: every action is validated before anything runs, then
//! the prepared actions run in declaration order until one fails, and
//! finally every action that was started is cleaned up in reverse order.
//!
//! ```text
//!  Idle ──► Validating ──► Running ──► Succeeded
//!               │             │
//!               └─────────────┴──────► Failed
//! ```

use crate::context::BuildContext;
use crate::error::BuildError;
use crate::manifest::{Manifest, ManifestAction};
use crate::reporter::Event;
use crate::traits::Action;
use std::fmt;
use tokio::sync::watch;

/// Where a pipeline is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Validating,
    Running,
    Succeeded,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineState::Idle => "idle",
            PipelineState::Validating => "validating",
            PipelineState::Running => "running",
            PipelineState::Succeeded => "succeeded",
            PipelineState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Drives a list of actions through validate, run and cleanup
///
/// # Example
///
/// ```ignore
/// use oic_actions::{BuildContext, Manifest, Pipeline};
///
/// let manifest = Manifest::load("image.yaml".as_ref(), &vars)?;
/// let mut pipeline = Pipeline::new();
/// pipeline.build(&manifest, &ctx).await?;
/// ```
pub struct Pipeline {
    state: PipelineState,

    /// Set to `true` to stop before the next action starts
    cancel: Option<watch::Receiver<bool>>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            state: PipelineState::Idle,
            cancel: None,
        }
    }

    /// Stop starting new actions once `cancel` turns `true`
    ///
    /// The action in flight is left to finish; cleanup still runs.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Validate and run every action of `manifest`
    pub async fn build(&mut self, manifest: &Manifest, ctx: &BuildContext) -> Result<(), BuildError> {
        self.execute(manifest.actions(), ctx).await
    }

    /// Validate and run `actions` in order
    pub async fn execute(
        &mut self,
        actions: &[ManifestAction],
        ctx: &BuildContext,
    ) -> Result<(), BuildError> {
        let prepared = match self.validate(actions, ctx) {
            Ok(prepared) => prepared,
            Err(e) => {
                self.transition(PipelineState::Failed, ctx);
                return Err(e);
            }
        };
        self.run(&prepared, ctx).await
    }

    /// Validate every action, stopping at the first rejection
    ///
    /// Nothing runs if any action is invalid.
    pub fn validate(
        &mut self,
        actions: &[ManifestAction],
        ctx: &BuildContext,
    ) -> Result<Vec<Box<dyn Action>>, BuildError> {
        self.transition(PipelineState::Validating, ctx);

        let mut prepared = Vec::with_capacity(actions.len());
        for action in actions {
            let validated = action.validate(ctx).map_err(|source| BuildError::Validation {
                action: action.description().to_string(),
                source,
            })?;
            prepared.push(validated);
        }
        Ok(prepared)
    }

    /// Run prepared actions, then clean up the ones that started
    pub async fn run(
        &mut self,
        actions: &[Box<dyn Action>],
        ctx: &BuildContext,
    ) -> Result<(), BuildError> {
        self.transition(PipelineState::Running, ctx);

        let mut started: Vec<&dyn Action> = Vec::with_capacity(actions.len());
        let mut outcome = Ok(());

        for action in actions {
            if self.is_cancelled() {
                ctx.reporter().report(Event::warn("Build interrupted"));
                outcome = Err(BuildError::Cancelled);
                break;
            }

            ctx.reporter()
                .report(Event::action(format!("Running: {}", action.description())));

            let result = action.run(ctx).await;
            // A failed action may have left partial results behind
            started.push(action.as_ref());

            if let Err(source) = result {
                ctx.reporter().report(Event::error(format!(
                    "Action \"{}\" failed: {}",
                    action.description(),
                    source
                )));
                outcome = Err(BuildError::Run {
                    action: action.description().to_string(),
                    source,
                });
                break;
            }
        }

        for action in started.iter().rev() {
            if let Err(e) = action.cleanup(ctx).await {
                ctx.reporter().report(Event::warn(format!(
                    "Cleanup of \"{}\" failed: {}",
                    action.description(),
                    e
                )));
            }
        }

        let state = if outcome.is_ok() {
            PipelineState::Succeeded
        } else {
            PipelineState::Failed
        };
        self.transition(state, ctx);
        outcome
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    fn transition(&mut self, state: PipelineState, ctx: &BuildContext) {
        ctx.reporter()
            .report(Event::debug(format!("Pipeline {} -> {}", self.state, state)));
        self.state = state;
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("state", &self.state)
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}
