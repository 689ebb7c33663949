//! MIN aggregate function

use super::{Function, FunctionContext, FunctionRegistry, FunctionSignature};
use crate::error::Result;
use crate::types::{DataType, Value};
use std::sync::Arc;

pub struct MinFunction;

impl Function for MinFunction {
    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: FunctionSignature = FunctionSignature {
            name: "MIN",
            min_args: 1,
            max_args: Some(1),
            aggregate: true,
        };
        &SIGNATURE
    }

    fn validate(&self, arg_types: &[DataType]) -> Result<DataType> {
        self.signature().check_arity(arg_types.len())?;
        // MIN preserves its argument type; any ordered type is allowed.
        Ok(arg_types[0])
    }

    fn evaluate(&self, args: &[Value], _ctx: &FunctionContext) -> Result<Value> {
        Ok(args[0].clone())
    }
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register(Arc::new(MinFunction));
}
