//! Template environment shared by manifest expansion and the `template` action

use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;

/// Build the environment used for every template in a build
///
/// Unknown variables are errors and trailing newlines are kept, so a
/// document without directives renders to itself.
pub fn environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_keep_trailing_newline(true);
    env.add_function("strings_join", strings_join);
    env
}

/// Render `source` with `vars`; `name` identifies the template in errors
pub fn render<S: Serialize>(name: &str, source: &str, vars: S) -> Result<String, minijinja::Error> {
    environment().render_named_str(name, source, vars)
}

fn strings_join(items: Vec<String>, separator: String) -> String {
    items.join(&separator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_variables() {
        let out = render(
            "t",
            "arch={{ architecture }} args={{ strings_join(manifest.kernelArguments, ' ') }}",
            json!({
                "architecture": "x86_64",
                "manifest": { "kernelArguments": ["quiet", "splash"] }
            }),
        )
        .unwrap();
        assert_eq!(out, "arch=x86_64 args=quiet splash");
    }

    #[test]
    fn test_literal_text_is_unchanged() {
        let text = "actions:\n  - action: run\n    command: echo hi\n";
        assert_eq!(render("m.yaml", text, json!({})).unwrap(), text);
    }

    #[test]
    fn test_unknown_variable_is_an_error() {
        assert!(render("t", "{{ missing }}", json!({})).is_err());
        assert!(render("t", "{{ manifest.missing }}", json!({"manifest": {}})).is_err());
    }

    #[test]
    fn test_malformed_directive() {
        let err = render("broken.yaml", "{% if %}", json!({})).unwrap_err();
        assert_eq!(err.kind(), minijinja::ErrorKind::SyntaxError);
    }
}
