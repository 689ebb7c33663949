//! SUM aggregate function

use super::{Function, FunctionContext, FunctionRegistry, FunctionSignature};
use crate::error::{Error, Result};
use crate::types::{DataType, Value};
use std::sync::Arc;

pub struct SumFunction;

impl Function for SumFunction {
    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: FunctionSignature = FunctionSignature {
            name: "SUM",
            min_args: 1,
            max_args: Some(1),
            aggregate: true,
        };
        &SIGNATURE
    }

    fn validate(&self, arg_types: &[DataType]) -> Result<DataType> {
        self.signature().check_arity(arg_types.len())?;
        match arg_types[0] {
            DataType::Int | DataType::Long => Ok(DataType::Long),
            DataType::Float | DataType::Double => Ok(DataType::Double),
            other => Err(Error::TypeMismatch {
                expected: "numeric".into(),
                found: other.to_string(),
            }),
        }
    }

    fn evaluate(&self, args: &[Value], _ctx: &FunctionContext) -> Result<Value> {
        // Row-level contribution is the value itself; folding happens in
        // the aggregation layer.
        Ok(args[0].clone())
    }
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register(Arc::new(SumFunction));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_integers_as_long_and_floats_as_double() {
        let func = SumFunction;
        assert_eq!(func.validate(&[DataType::Int]).unwrap(), DataType::Long);
        assert_eq!(func.validate(&[DataType::Long]).unwrap(), DataType::Long);
        assert_eq!(
            func.validate(&[DataType::Double]).unwrap(),
            DataType::Double
        );
        assert!(func.validate(&[DataType::Str]).is_err());
    }
}
