//! Typed params for the built-in refactor method.

use serde_json::Value;

use crate::envelope::Params;
use crate::error::ParamsError;

/// Method name of the refactor capability.
pub const REFACTOR_METHOD: &str = "RequestRefactor";

/// Params of a `RequestRefactor` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefactorParams {
    pub code_path: String,
    pub instruction: String,
    /// Identity of the requesting agent.
    pub from: String,
}

impl RefactorParams {
    pub fn new(
        code_path: impl Into<String>,
        instruction: impl Into<String>,
        from: impl Into<String>,
    ) -> Self {
        Self {
            code_path: code_path.into(),
            instruction: instruction.into(),
            from: from.into(),
        }
    }

    /// Extract and validate the refactor params. `code_path` is accepted as
    /// an alias of `codePath`.
    pub fn from_params(params: &Params) -> Result<Self, ParamsError> {
        let code_path = match params.get("codePath") {
            Some(value) => non_empty_string(value, "codePath")?,
            None => non_empty_string(
                params.get("code_path").ok_or(ParamsError::Missing("codePath"))?,
                "codePath",
            )?,
        };
        let instruction = non_empty_string(
            params.get("instruction").ok_or(ParamsError::Missing("instruction"))?,
            "instruction",
        )?;
        let from = non_empty_string(params.get("from").ok_or(ParamsError::Missing("from"))?, "from")?;

        Ok(Self {
            code_path,
            instruction,
            from,
        })
    }

    pub fn into_params(self) -> Params {
        let mut params = Params::new();
        params.insert("codePath".to_string(), Value::String(self.code_path));
        params.insert("instruction".to_string(), Value::String(self.instruction));
        params.insert("from".to_string(), Value::String(self.from));
        params
    }
}

fn non_empty_string(value: &Value, name: &'static str) -> Result<String, ParamsError> {
    match value {
        Value::String(s) if s.is_empty() => Err(ParamsError::Empty(name)),
        Value::String(s) => Ok(s.clone()),
        _ => Err(ParamsError::NotAString(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params_from(value: Value) -> Params {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_from_params_camel_case() {
        let params = params_from(json!({
            "codePath": "src/utils/math.js",
            "instruction": "simplify",
            "from": "gemini"
        }));
        let parsed = RefactorParams::from_params(&params).unwrap();
        assert_eq!(parsed, RefactorParams::new("src/utils/math.js", "simplify", "gemini"));
    }

    #[test]
    fn test_from_params_snake_case_alias() {
        let params = params_from(json!({
            "code_path": "lib.rs",
            "instruction": "inline",
            "from": "claude"
        }));
        assert_eq!(RefactorParams::from_params(&params).unwrap().code_path, "lib.rs");
    }

    #[test]
    fn test_from_params_validation() {
        let params = params_from(json!({"instruction": "x", "from": "a"}));
        assert_eq!(
            RefactorParams::from_params(&params),
            Err(ParamsError::Missing("codePath"))
        );

        let params = params_from(json!({"codePath": "", "instruction": "x", "from": "a"}));
        assert_eq!(
            RefactorParams::from_params(&params),
            Err(ParamsError::Empty("codePath"))
        );

        let params = params_from(json!({"codePath": "a.rs", "instruction": 3, "from": "a"}));
        assert_eq!(
            RefactorParams::from_params(&params),
            Err(ParamsError::NotAString("instruction"))
        );

        let params = params_from(json!({"codePath": "a.rs", "instruction": "x"}));
        assert_eq!(
            RefactorParams::from_params(&params),
            Err(ParamsError::Missing("from"))
        );
    }

    #[test]
    fn test_into_params_is_parseable() {
        let original = RefactorParams::new("a.rs", "rename", "gemini");
        let params = original.clone().into_params();
        assert_eq!(RefactorParams::from_params(&params).unwrap(), original);
    }
}
