//! calculate 能力：两数四则运算

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::capability::{Capability, RuntimeContext};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Deserialize)]
struct CalcParams {
    op: Op,
    a: f64,
    b: f64,
}

pub struct CalculateCapability;

#[async_trait]
impl Capability for CalculateCapability {
    fn kind(&self) -> &str {
        "calculate"
    }

    fn description(&self) -> &str {
        "Apply add, sub, mul or div to two numbers."
    }

    fn signature(&self) -> &str {
        "params: {\"op\": \"add\"|\"sub\"|\"mul\"|\"div\", \"a\": number, \"b\": number} -> number"
    }

    async fn run(&self, params: Value, _ctx: &RuntimeContext) -> Result<Value, String> {
        let p: CalcParams =
            serde_json::from_value(params).map_err(|e| format!("Invalid params: {e}"))?;
        let value = match p.op {
            Op::Add => p.a + p.b,
            Op::Sub => p.a - p.b,
            Op::Mul => p.a * p.b,
            Op::Div if p.b == 0.0 => return Err("Division by zero".to_string()),
            Op::Div => p.a / p.b,
        };
        if !value.is_finite() {
            return Err("Result is not finite".to_string());
        }
        // 整数结果保持整数，便于生成器阅读
        if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
            Ok(json!(value as i64))
        } else {
            Ok(json!(value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_calculate_ops() {
        let ctx = RuntimeContext::offline();
        let run = |params: Value| {
            let ctx = ctx.clone();
            async move { CalculateCapability.run(params, &ctx).await }
        };
        assert_eq!(run(json!({"op": "add", "a": 2, "b": 3})).await, Ok(json!(5)));
        assert_eq!(run(json!({"op": "div", "a": 7, "b": 2})).await, Ok(json!(3.5)));
        assert_eq!(run(json!({"op": "mul", "a": -4, "b": 2.5})).await, Ok(json!(-10)));
        assert!(run(json!({"op": "div", "a": 1, "b": 0})).await.is_err());
        assert!(run(json!({"op": "pow", "a": 1, "b": 2})).await.is_err());
        assert_eq!(
            run(json!({"op": "mul", "a": 1e308, "b": 10})).await,
            Err("Result is not finite".to_string())
        );
        assert!(run(json!({"op": "sub", "a": -1e308, "b": 1e308})).await.is_err());
    }
}
