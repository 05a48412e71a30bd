//! Template action
//!
//! Renders a template from the manifest directory into the workspace.
//! The template sees the entry's own `variables` plus the build's
//! template variables under `manifest`.

use crate::context::BuildContext;
use crate::error::{ActionError, Result};
use crate::reporter::Event;
use crate::template;
use crate::traits::{Action, ActionSpec, BaseAction};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

/// Configuration of a `template` entry
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemplateSpec {
    /// Template file, relative to the manifest directory
    pub template: String,
    /// Output file, relative to the workspace
    pub path: String,
    pub variables: HashMap<String, Value>,
}

impl ActionSpec for TemplateSpec {
    fn validate(&self, base: &BaseAction, ctx: &BuildContext) -> Result<Box<dyn Action>> {
        if self.template.is_empty() {
            return Err(ActionError::missing("template", &base.action));
        }
        if self.path.is_empty() {
            return Err(ActionError::missing("path", &base.action));
        }

        let mut variables = self.variables.clone();
        let globals = serde_json::to_value(ctx.template_vars())
            .map_err(|e| ActionError::InvalidProperty(e.to_string()))?;
        variables.insert("manifest".to_string(), globals);

        Ok(Box::new(TemplateAction {
            description: base.description().to_string(),
            template: ctx.manifest_path(&self.template),
            output: ctx.workspace_path(&self.path),
            variables,
        }))
    }
}

struct TemplateAction {
    description: String,
    template: PathBuf,
    output: PathBuf,
    variables: HashMap<String, Value>,
}

#[async_trait]
impl Action for TemplateAction {
    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, ctx: &BuildContext) -> Result<()> {
        let source = tokio::fs::read_to_string(&self.template).await.map_err(|e| {
            ActionError::ExecutionFailed(format!("cannot read {}: {}", self.template.display(), e))
        })?;

        let name = self
            .template
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let rendered = template::render(&name, &source, &self.variables)?;

        if let Some(parent) = self.output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.output, rendered).await?;

        ctx.reporter().report(Event::debug(format!(
            "Rendered {} to {}",
            self.template.display(),
            self.output.display()
        )));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_requires_template_and_path() {
        let ctx = BuildContext::new("/src", "/out", "/ws");
        let base = BaseAction::new("template");

        let spec = TemplateSpec {
            path: "out".to_string(),
            ..TemplateSpec::default()
        };
        assert!(spec.validate(&base, &ctx).is_err());

        let spec = TemplateSpec {
            template: "in.j2".to_string(),
            ..TemplateSpec::default()
        };
        assert!(spec.validate(&base, &ctx).is_err());
    }

    #[tokio::test]
    async fn test_render_with_local_and_manifest_variables() {
        let temp = tempfile::tempdir().unwrap();
        let ws = temp.path().join("ws");
        std::fs::write(
            temp.path().join("grub.cfg.j2"),
            "menuentry \"{{ title }}\" {\n  linux /vmlinuz {{ strings_join(manifest.kernelArguments, ' ') }}\n}\n",
        )
        .unwrap();

        let ctx = BuildContext::new(temp.path(), temp.path().join("out"), &ws)
            .with_template_var("kernelArguments", json!(["quiet", "splash"]));

        let spec = TemplateSpec {
            template: "grub.cfg.j2".to_string(),
            path: "iso/boot/grub/grub.cfg".to_string(),
            variables: HashMap::from([("title".to_string(), json!("Live"))]),
        };
        let action = spec.validate(&BaseAction::new("template"), &ctx).unwrap();
        action.run(&ctx).await.unwrap();

        let rendered = std::fs::read_to_string(ws.join("iso/boot/grub/grub.cfg")).unwrap();
        assert_eq!(
            rendered,
            "menuentry \"Live\" {\n  linux /vmlinuz quiet splash\n}\n"
        );
    }

    #[tokio::test]
    async fn test_render_unknown_variable_fails() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("t.j2"), "{{ nope }}").unwrap();

        let ctx = BuildContext::new(temp.path(), temp.path().join("out"), temp.path().join("ws"));
        let spec = TemplateSpec {
            template: "t.j2".to_string(),
            path: "t".to_string(),
            ..TemplateSpec::default()
        };
        let action = spec.validate(&BaseAction::new("template"), &ctx).unwrap();

        let err = action.run(&ctx).await.unwrap_err();
        assert!(matches!(err, ActionError::Template(_)));
    }
}
