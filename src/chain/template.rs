//! Strict template rendering for imports.
//!
//! Any reference to a variable that is not bound is an error, reported as
//! `MissingVariable` with the names that could not be resolved.

use minijinja::{Environment, ErrorKind, UndefinedBehavior};
use serde_json::{Map, Value};

use crate::error::{ChainError, ChainResult};

/// Render `template` against `vars`.
pub fn render(template: &str, vars: &Map<String, Value>) -> ChainResult<String> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    let compiled = env
        .template_from_str(template)
        .map_err(|e| ChainError::Template(e.to_string()))?;

    compiled.render(vars).map_err(|e| match e.kind() {
        ErrorKind::UndefinedError => {
            let mut missing: Vec<String> = compiled
                .undeclared_variables(false)
                .into_iter()
                .filter(|name| !vars.contains_key(name))
                .collect();
            missing.sort();
            if missing.is_empty() {
                ChainError::MissingVariable(template.to_string())
            } else {
                ChainError::MissingVariable(missing.join(", "))
            }
        }
        _ => ChainError::Template(e.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_render_substitutes() {
        let ctx = vars(json!({ "token": "abc", "user": { "id": 7 } }));
        assert_eq!(render("Bearer {{ token }}", &ctx).unwrap(), "Bearer abc");
        assert_eq!(render("{{ user.id }}", &ctx).unwrap(), "7");
        assert_eq!(render("plain", &ctx).unwrap(), "plain");
    }

    #[test]
    fn test_missing_variable_named() {
        let ctx = vars(json!({ "present": 1 }));
        match render("{{ present }}-{{ absent }}", &ctx) {
            Err(ChainError::MissingVariable(names)) => assert_eq!(names, "absent"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_syntax_error() {
        let ctx = Map::new();
        assert!(matches!(render("{{ unclosed", &ctx), Err(ChainError::Template(_))));
    }
}
