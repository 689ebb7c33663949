//! AVG aggregate function

use super::{Function, FunctionContext, FunctionRegistry, FunctionSignature};
use crate::error::{Error, Result};
use crate::types::{DataType, Value};
use std::sync::Arc;

pub struct AvgFunction;

impl Function for AvgFunction {
    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: FunctionSignature = FunctionSignature {
            name: "AVG",
            min_args: 1,
            max_args: Some(1),
            aggregate: true,
        };
        &SIGNATURE
    }

    fn validate(&self, arg_types: &[DataType]) -> Result<DataType> {
        self.signature().check_arity(arg_types.len())?;
        if !arg_types[0].is_numeric() {
            return Err(Error::TypeMismatch {
                expected: "numeric".into(),
                found: arg_types[0].to_string(),
            });
        }
        Ok(DataType::Double)
    }

    fn evaluate(&self, args: &[Value], _ctx: &FunctionContext) -> Result<Value> {
        Ok(args[0].clone())
    }
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register(Arc::new(AvgFunction));
}
