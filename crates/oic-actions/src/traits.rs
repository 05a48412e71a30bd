//! Action traits
//!
//! An action goes through two stages. The manifest decodes each entry
//! into an [`ActionSpec`], the raw configuration. Validating a spec
//! against the [`BuildContext`] checks it and resolves its paths,
//! producing a prepared [`Action`] that the pipeline can run and clean
//! up. A prepared action therefore never sees unchecked input.

use crate::context::BuildContext;
use crate::error::{ActionError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fields shared by every manifest entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseAction {
    /// Kind tag selecting the implementation
    pub action: String,

    /// Optional human-readable name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl BaseAction {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The name when set and not empty, otherwise the kind
    pub fn description(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.action,
        }
    }
}

/// Decoded configuration of one manifest entry
///
/// # Example
///
/// ```ignore
/// use oic_actions::{Action, ActionSpec, BaseAction, BuildContext, Result};
///
/// #[derive(Debug)]
/// struct EchoSpec { message: String }
///
/// impl ActionSpec for EchoSpec {
///     fn validate(&self, base: &BaseAction, _ctx: &BuildContext) -> Result<Box<dyn Action>> {
///         if self.message.is_empty() {
///             return Err(ActionError::missing("message", &base.action));
///         }
///         Ok(Box::new(Echo { description: base.description().into(), message: self.message.clone() }))
///     }
/// }
/// ```
pub trait ActionSpec: Send + Sync + fmt::Debug {
    /// Check the configuration and produce a runnable action
    ///
    /// Validation has no side effects on the filesystem beyond reading
    /// it.
    fn validate(&self, base: &BaseAction, ctx: &BuildContext) -> Result<Box<dyn Action>>;
}

/// A validated, runnable pipeline step
#[async_trait]
pub trait Action: Send + Sync {
    /// Human-readable label used in logs and errors
    fn description(&self) -> &str;

    /// Perform the step
    async fn run(&self, ctx: &BuildContext) -> Result<()>;

    /// Undo whatever `run` left behind that should not outlive the build
    ///
    /// Called after `run`, whether it succeeded or not. Must tolerate
    /// partial or missing results.
    async fn cleanup(&self, ctx: &BuildContext) -> Result<()> {
        let _ = ctx;
        Ok(())
    }
}

/// An action that does nothing
#[derive(Debug, Clone)]
pub struct NoopAction {
    description: String,
}

impl NoopAction {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

impl ActionSpec for NoopAction {
    fn validate(&self, base: &BaseAction, _ctx: &BuildContext) -> Result<Box<dyn Action>> {
        Ok(Box::new(NoopAction::new(base.description())))
    }
}

#[async_trait]
impl Action for NoopAction {
    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, _ctx: &BuildContext) -> Result<()> {
        Ok(())
    }
}

/// An action that always fails when run
#[derive(Debug, Clone)]
pub struct FailingAction {
    description: String,
    error_message: String,
}

impl FailingAction {
    pub fn new(description: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            error_message: error_message.into(),
        }
    }
}

impl ActionSpec for FailingAction {
    fn validate(&self, base: &BaseAction, _ctx: &BuildContext) -> Result<Box<dyn Action>> {
        Ok(Box::new(FailingAction::new(
            base.description(),
            self.error_message.clone(),
        )))
    }
}

#[async_trait]
impl Action for FailingAction {
    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, _ctx: &BuildContext) -> Result<()> {
        Err(ActionError::ExecutionFailed(self.error_message.clone()))
    }
}
