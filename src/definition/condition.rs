//! Declarative conditions evaluated against a JSON context

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::workflow::EvaluationError;

/// A boolean expression over a JSON object context.
///
/// Keys are dot-separated paths, e.g. `account.email`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    /// The key exists and is not null
    Present { key: String },
    /// The key holds `true`. Missing or null counts as false; any other type is an error.
    Flag { key: String },
    /// The key holds exactly this value
    Equals { key: String, value: Value },
    /// Every condition holds
    All { conditions: Vec<Condition> },
    /// At least one condition holds
    Any { conditions: Vec<Condition> },
    /// The inner condition does not hold
    Not { condition: Box<Condition> },
}

impl Condition {
    pub fn present(key: impl Into<String>) -> Self {
        Condition::Present { key: key.into() }
    }

    pub fn flag(key: impl Into<String>) -> Self {
        Condition::Flag { key: key.into() }
    }

    pub fn equals(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Equals {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Evaluate against `context`.
    ///
    /// Errors propagate through `all`, `any` and `not`, so a broken leaf can
    /// never be negated into `true`.
    pub fn evaluate(&self, context: &Value) -> Result<bool, EvaluationError> {
        match self {
            Condition::Present { key } => Ok(lookup(context, key).is_some_and(|v| !v.is_null())),
            Condition::Flag { key } => match lookup(context, key) {
                None | Some(Value::Null) => Ok(false),
                Some(Value::Bool(flag)) => Ok(*flag),
                Some(other) => Err(EvaluationError::TypeMismatch {
                    key: key.clone(),
                    expected: "boolean",
                    found: type_name(other),
                }),
            },
            Condition::Equals { key, value } => Ok(lookup(context, key) == Some(value)),
            Condition::All { conditions } => {
                for condition in conditions {
                    if !condition.evaluate(context)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Condition::Any { conditions } => {
                for condition in conditions {
                    if condition.evaluate(context)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Condition::Not { condition } => Ok(!condition.evaluate(context)?),
        }
    }
}

/// Resolve a dot-separated path inside a JSON value
pub fn lookup<'a>(context: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.')
        .try_fold(context, |value, segment| value.get(segment))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> Value {
        json!({
            "account": { "email": "ada@example.com", "verified": true, "nickname": null },
            "plan": "pro",
            "seats": 3,
            "pending": "yes"
        })
    }

    #[test]
    fn test_lookup_nested() {
        let ctx = context();
        assert_eq!(lookup(&ctx, "account.email"), Some(&json!("ada@example.com")));
        assert_eq!(lookup(&ctx, "account.missing"), None);
        assert_eq!(lookup(&ctx, "plan.name"), None);
    }

    #[test]
    fn test_present() {
        let ctx = context();
        assert_eq!(Condition::present("account.email").evaluate(&ctx), Ok(true));
        assert_eq!(Condition::present("account.nickname").evaluate(&ctx), Ok(false));
        assert_eq!(Condition::present("billing").evaluate(&ctx), Ok(false));
    }

    #[test]
    fn test_flag() {
        let ctx = context();
        assert_eq!(Condition::flag("account.verified").evaluate(&ctx), Ok(true));
        assert_eq!(Condition::flag("account.locked").evaluate(&ctx), Ok(false));
        assert_eq!(
            Condition::flag("pending").evaluate(&ctx),
            Err(EvaluationError::TypeMismatch {
                key: "pending".to_string(),
                expected: "boolean",
                found: "string",
            })
        );
    }

    #[test]
    fn test_equals() {
        let ctx = context();
        assert_eq!(Condition::equals("plan", "pro").evaluate(&ctx), Ok(true));
        assert_eq!(Condition::equals("seats", 3).evaluate(&ctx), Ok(true));
        assert_eq!(Condition::equals("seats", "3").evaluate(&ctx), Ok(false));
    }

    #[test]
    fn test_combinators() {
        let ctx = context();
        let all = Condition::All {
            conditions: vec![Condition::present("account.email"), Condition::equals("plan", "pro")],
        };
        let any = Condition::Any {
            conditions: vec![Condition::present("billing"), Condition::flag("account.verified")],
        };
        assert_eq!(all.evaluate(&ctx), Ok(true));
        assert_eq!(any.evaluate(&ctx), Ok(true));
        assert_eq!(Condition::All { conditions: vec![] }.evaluate(&ctx), Ok(true));
        assert_eq!(Condition::Any { conditions: vec![] }.evaluate(&ctx), Ok(false));
    }

    #[test]
    fn test_not_does_not_hide_errors() {
        let ctx = context();
        let negated = Condition::Not {
            condition: Box::new(Condition::flag("pending")),
        };
        assert!(negated.evaluate(&ctx).is_err());
    }

    #[test]
    fn test_deserialize_tagged() {
        let condition: Condition =
            serde_json::from_value(json!({ "kind": "equals", "key": "plan", "value": "pro" }))
                .unwrap();
        assert_eq!(condition, Condition::equals("plan", "pro"));
    }
}
