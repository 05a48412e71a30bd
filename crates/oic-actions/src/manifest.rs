//! Manifest loading
//!
//! A manifest is a YAML document run through the template engine first.
//! Its `actions` entries are decoded by kind into [`ActionSpec`]s.
//!
//! ```yaml
//! variables:
//!   kernelArguments: [quiet]
//! actions:
//!   - action: copy
//!     name: Copy skeleton
//!     from: skel
//!     to: rootfs
//! ```

use crate::actions::ActionKind;
use crate::context::BuildContext;
use crate::error::{ManifestError, Result};
use crate::template;
use crate::traits::{Action, ActionSpec, BaseAction};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::fmt;
use std::path::Path;

/// Global variables declared by a manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variables {
    #[serde(default)]
    pub kernel_arguments: Vec<String>,
}

/// One decoded entry of the `actions` list
#[derive(Debug)]
pub struct ManifestAction {
    base: BaseAction,
    spec: Box<dyn ActionSpec>,
}

impl ManifestAction {
    pub fn new(base: BaseAction, spec: Box<dyn ActionSpec>) -> Self {
        Self { base, spec }
    }

    pub fn base(&self) -> &BaseAction {
        &self.base
    }

    /// Kind tag of the entry
    pub fn kind(&self) -> &str {
        &self.base.action
    }

    pub fn description(&self) -> &str {
        self.base.description()
    }

    pub fn validate(&self, ctx: &BuildContext) -> Result<Box<dyn Action>> {
        self.spec.validate(&self.base, ctx)
    }
}

#[derive(Deserialize)]
struct Document {
    #[serde(default)]
    variables: Variables,
    #[serde(default)]
    actions: Vec<Value>,
}

/// A loaded manifest
#[derive(Debug)]
pub struct Manifest {
    variables: Variables,
    actions: Vec<ManifestAction>,
    text: String,
}

impl Manifest {
    /// Read, expand and decode the manifest at `path`
    pub fn load<S: Serialize>(path: &Path, vars: S) -> std::result::Result<Self, ManifestError> {
        let source = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::parse(&name, &source, vars)
    }

    /// Expand and decode manifest `source`; `name` identifies it in errors
    pub fn parse<S: Serialize>(
        name: &str,
        source: &str,
        vars: S,
    ) -> std::result::Result<Self, ManifestError> {
        let text = template::render(name, source, vars)?;
        let document: Document = serde_yaml::from_str(&text)?;

        if document.actions.is_empty() {
            return Err(ManifestError::NoActions);
        }

        let actions = document
            .actions
            .into_iter()
            .enumerate()
            .map(|(i, entry)| decode_action(i + 1, entry))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            variables: document.variables,
            actions,
            text,
        })
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn actions(&self) -> &[ManifestAction] {
        &self.actions
    }

    /// The manifest text after template expansion
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn decode_action(index: usize, entry: Value) -> std::result::Result<ManifestAction, ManifestError> {
    let Value::Mapping(mut fields) = entry else {
        return Err(ManifestError::InvalidAction {
            index,
            kind: String::new(),
            message: "expected a mapping".to_string(),
        });
    };

    let kind = match fields.remove("action") {
        Some(Value::String(kind)) if !kind.is_empty() => kind,
        None | Some(Value::Null) | Some(Value::String(_)) => {
            return Err(ManifestError::MissingKind { index });
        }
        Some(_) => {
            return Err(ManifestError::InvalidAction {
                index,
                kind: String::new(),
                message: "\"action\" must be a string".to_string(),
            });
        }
    };

    let name = match fields.remove("name") {
        None | Some(Value::Null) => None,
        Some(Value::String(name)) => Some(name),
        Some(_) => {
            return Err(ManifestError::InvalidAction {
                index,
                kind,
                message: "\"name\" must be a string".to_string(),
            });
        }
    };

    let Some(action_kind) = ActionKind::from_tag(&kind) else {
        return Err(ManifestError::UnknownKind { index, kind });
    };

    let spec = action_kind
        .decode(Value::Mapping(fields))
        .map_err(|e| ManifestError::InvalidAction {
            index,
            kind: kind.clone(),
            message: e.to_string(),
        })?;

    Ok(ManifestAction::new(BaseAction { action: kind, name }, spec))
}
