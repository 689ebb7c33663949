//! SUBSTRING scalar function

use super::{Function, FunctionContext, FunctionRegistry, FunctionSignature};
use crate::error::{Error, Result};
use crate::types::{DataType, Value};
use std::sync::Arc;

pub struct SubstringFunction;

impl Function for SubstringFunction {
    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: FunctionSignature = FunctionSignature {
            name: "SUBSTRING",
            min_args: 2,
            max_args: Some(3),
            aggregate: false,
        };
        &SIGNATURE
    }

    fn validate(&self, arg_types: &[DataType]) -> Result<DataType> {
        self.signature().check_arity(arg_types.len())?;
        if arg_types[0] != DataType::Str {
            return Err(Error::TypeMismatch {
                expected: DataType::Str.to_string(),
                found: arg_types[0].to_string(),
            });
        }
        for arg in &arg_types[1..] {
            if !matches!(arg, DataType::Int | DataType::Long) {
                return Err(Error::TypeMismatch {
                    expected: "integer".into(),
                    found: arg.to_string(),
                });
            }
        }
        Ok(DataType::Str)
    }

    fn evaluate(&self, args: &[Value], _ctx: &FunctionContext) -> Result<Value> {
        if args.iter().any(Value::is_null) {
            return Ok(Value::Null);
        }
        let text = match &args[0] {
            Value::Str(s) => s,
            other => {
                return Err(Error::TypeMismatch {
                    expected: DataType::Str.to_string(),
                    found: format!("{:?}", other),
                });
            }
        };
        // SQL SUBSTRING is 1-based; positions before the start clamp to it.
        let start = (args[1].to_long()?.max(1) - 1) as usize;
        let chars: Vec<char> = text.chars().collect();
        if start >= chars.len() {
            return Ok(Value::Str(String::new()));
        }
        let end = match args.get(2) {
            Some(length) => {
                let length = length.to_long()?;
                if length < 0 {
                    return Err(Error::InvalidValue(format!(
                        "SUBSTRING length must not be negative, got {}",
                        length
                    )));
                }
                (start + length as usize).min(chars.len())
            }
            None => chars.len(),
        };
        Ok(Value::Str(chars[start..end].iter().collect()))
    }
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register(Arc::new(SubstringFunction));
}
