use async_trait::async_trait;
use chrono::Local;
use serde_json::{Value, json};
use std::sync::Arc;

use super::{Tool, ToolError};

/// Default tool set registered by the CLI.
pub fn default_tools() -> Vec<Arc<dyn Tool>> {
    vec![Arc::new(CurrentTime), Arc::new(Calculator)]
}

pub struct CurrentTime;

#[async_trait]
impl Tool for CurrentTime {
    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Returns the current local date and time"
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {}, "required": []})
    }

    async fn call(&self, _input: Value) -> Result<Value, ToolError> {
        Ok(json!({"time": Local::now().to_rfc3339()}))
    }
}

pub struct Calculator;

#[async_trait]
impl Tool for Calculator {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluates a basic arithmetic operation on two numbers"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "op": {"type": "string", "enum": ["add", "sub", "mul", "div"]},
                "a": {"type": "number"},
                "b": {"type": "number"}
            },
            "required": ["op", "a", "b"]
        })
    }

    async fn call(&self, input: Value) -> Result<Value, ToolError> {
        let op = input
            .get("op")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidInput("missing 'op'".into()))?;
        let a = input
            .get("a")
            .and_then(Value::as_f64)
            .ok_or_else(|| ToolError::InvalidInput("missing numeric 'a'".into()))?;
        let b = input
            .get("b")
            .and_then(Value::as_f64)
            .ok_or_else(|| ToolError::InvalidInput("missing numeric 'b'".into()))?;

        let result = match op {
            "add" => a + b,
            "sub" => a - b,
            "mul" => a * b,
            "div" => {
                if b == 0.0 {
                    return Err(ToolError::InvalidInput("division by zero".into()));
                }
                a / b
            }
            other => {
                return Err(ToolError::InvalidInput(format!(
                    "unsupported op: {}",
                    other
                )));
            }
        };
        Ok(json!({"result": result}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn calculator_adds() {
        let out = Calculator
            .call(json!({"op": "add", "a": 1.5, "b": 2.5}))
            .await
            .unwrap();
        assert_eq!(out, json!({"result": 4.0}));
    }

    #[tokio::test]
    async fn calculator_rejects_division_by_zero() {
        let err = Calculator
            .call(json!({"op": "div", "a": 1, "b": 0}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn current_time_returns_a_timestamp() {
        let out = CurrentTime.call(json!({})).await.unwrap();
        assert!(out["time"].as_str().unwrap().contains('T'));
    }
}
