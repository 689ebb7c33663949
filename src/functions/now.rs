//! NOW scalar function

use super::{Function, FunctionContext, FunctionRegistry, FunctionSignature};
use crate::error::Result;
use crate::types::{DataType, Value};
use std::sync::Arc;

pub struct NowFunction;

impl Function for NowFunction {
    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: FunctionSignature = FunctionSignature {
            name: "NOW",
            min_args: 0,
            max_args: Some(0),
            aggregate: false,
        };
        &SIGNATURE
    }

    fn validate(&self, arg_types: &[DataType]) -> Result<DataType> {
        self.signature().check_arity(arg_types.len())?;
        Ok(DataType::Date)
    }

    fn evaluate(&self, _args: &[Value], ctx: &FunctionContext) -> Result<Value> {
        // The timestamp is snapshotted per execution, so NOW() is stable
        // across all rows of one statement.
        Ok(Value::Date(ctx.now()))
    }
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register(Arc::new(NowFunction));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_within_one_execution() {
        let func = NowFunction;
        let ctx = FunctionContext::default();
        let first = func.evaluate(&[], &ctx).unwrap();
        let second = func.evaluate(&[], &ctx).unwrap();
        assert_eq!(first, second);
        assert_eq!(func.validate(&[]).unwrap(), DataType::Date);
        assert!(func.validate(&[DataType::Str]).is_err());
    }
}
