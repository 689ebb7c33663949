//! MAX aggregate function

use super::{Function, FunctionContext, FunctionRegistry, FunctionSignature};
use crate::error::Result;
use crate::types::{DataType, Value};
use std::sync::Arc;

pub struct MaxFunction;

impl Function for MaxFunction {
    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: FunctionSignature = FunctionSignature {
            name: "MAX",
            min_args: 1,
            max_args: Some(1),
            aggregate: true,
        };
        &SIGNATURE
    }

    fn validate(&self, arg_types: &[DataType]) -> Result<DataType> {
        self.signature().check_arity(arg_types.len())?;
        Ok(arg_types[0])
    }

    fn evaluate(&self, args: &[Value], _ctx: &FunctionContext) -> Result<Value> {
        Ok(args[0].clone())
    }
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register(Arc::new(MaxFunction));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_argument_type() {
        let func = MaxFunction;
        assert_eq!(func.validate(&[DataType::Long]).unwrap(), DataType::Long);
        assert_eq!(func.validate(&[DataType::Str]).unwrap(), DataType::Str);
    }
}
