//! COUNT aggregate function

use super::{Function, FunctionContext, FunctionRegistry, FunctionSignature};
use crate::error::Result;
use crate::types::{DataType, Value};
use std::sync::Arc;

pub struct CountFunction;

impl Function for CountFunction {
    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: FunctionSignature = FunctionSignature {
            name: "COUNT",
            min_args: 1,
            max_args: Some(1),
            aggregate: true,
        };
        &SIGNATURE
    }

    fn validate(&self, arg_types: &[DataType]) -> Result<DataType> {
        self.signature().check_arity(arg_types.len())?;
        // COUNT returns LONG regardless of input type; COUNT(*) is handled
        // by the planner.
        Ok(DataType::Long)
    }

    fn evaluate(&self, args: &[Value], _ctx: &FunctionContext) -> Result<Value> {
        // Row-level contribution: 1 for non-null values, 0 for null. The
        // summing happens in the aggregation layer.
        match &args[0] {
            Value::Null => Ok(Value::Long(0)),
            _ => Ok(Value::Long(1)),
        }
    }
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register(Arc::new(CountFunction));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_and_validation() {
        let func = CountFunction;
        let sig = func.signature();
        assert_eq!(sig.name, "COUNT");
        assert!(sig.aggregate);

        assert_eq!(func.validate(&[DataType::Str]).unwrap(), DataType::Long);
        assert_eq!(func.validate(&[DataType::Int]).unwrap(), DataType::Long);
        assert!(func.validate(&[]).is_err());
        assert!(func.validate(&[DataType::Str, DataType::Str]).is_err());
    }

    #[test]
    fn counts_non_null_rows() {
        let func = CountFunction;
        let ctx = FunctionContext::default();
        assert_eq!(
            func.evaluate(&[Value::Str("x".into())], &ctx).unwrap(),
            Value::Long(1)
        );
        assert_eq!(func.evaluate(&[Value::Null], &ctx).unwrap(), Value::Long(0));
    }
}
