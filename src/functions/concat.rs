//! CONCAT scalar function

use super::{Function, FunctionContext, FunctionRegistry, FunctionSignature};
use crate::error::Result;
use crate::types::{DataType, Value};
use std::sync::Arc;

pub struct ConcatFunction;

impl Function for ConcatFunction {
    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: FunctionSignature = FunctionSignature {
            name: "CONCAT",
            min_args: 1,
            max_args: None,
            aggregate: false,
        };
        &SIGNATURE
    }

    fn validate(&self, arg_types: &[DataType]) -> Result<DataType> {
        self.signature().check_arity(arg_types.len())?;
        Ok(DataType::Str)
    }

    fn evaluate(&self, args: &[Value], _ctx: &FunctionContext) -> Result<Value> {
        // SQL semantics: NULL in, NULL out.
        if args.iter().any(Value::is_null) {
            return Ok(Value::Null);
        }
        let mut out = String::new();
        for arg in args {
            match arg {
                Value::Str(s) => out.push_str(s),
                other => out.push_str(&other.to_string()),
            }
        }
        Ok(Value::Str(out))
    }
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register(Arc::new(ConcatFunction));
}
