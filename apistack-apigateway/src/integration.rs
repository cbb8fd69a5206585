//! Lambda proxy integration

use apistack_core::intrinsic::{join, partition, region};
use apistack_core::LogicalId;
use apistack_lambda::Function;
use serde_json::{json, Value};

/// Forwards requests to a function as proxy events
#[derive(Debug, Clone)]
pub struct LambdaIntegration {
    function_logical_id: LogicalId,
    function_arn: Value,
    allow_test_invoke: bool,
}

impl LambdaIntegration {
    pub fn new(function: &Function) -> Self {
        Self {
            function_logical_id: function.logical_id().clone(),
            function_arn: function.arn(),
            allow_test_invoke: true,
        }
    }

    /// Whether the console's test invocation may call the function
    pub fn allow_test_invoke(mut self, allow: bool) -> Self {
        self.allow_test_invoke = allow;
        self
    }

    pub fn allows_test_invoke(&self) -> bool {
        self.allow_test_invoke
    }

    pub fn function_logical_id(&self) -> &LogicalId {
        &self.function_logical_id
    }

    pub fn function_arn(&self) -> &Value {
        &self.function_arn
    }

    /// `Integration` block of a method
    pub fn to_cfn(&self) -> Value {
        json!({
            "IntegrationHttpMethod": "POST",
            "Type": "AWS_PROXY",
            "Uri": join("", vec![
                json!("arn:"),
                partition(),
                json!(":apigateway:"),
                region(),
                json!(":lambda:path/2015-03-31/functions/"),
                self.function_arn.clone(),
                json!("/invocations"),
            ]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apistack_lambda::{Code, FunctionProps, Runtime};

    fn function() -> Function {
        Function::new(
            "MyLambdaFunction",
            FunctionProps::new(
                Runtime::Nodejs18,
                Code::from_inline("exports.main = async () => ({});").unwrap(),
                "index.main",
            ),
        )
        .unwrap()
    }

    #[test]
    fn test_proxy_integration_block() {
        let integration = LambdaIntegration::new(&function());
        assert!(integration.allows_test_invoke());

        let cfn = integration.to_cfn();
        assert_eq!(cfn["Type"], "AWS_PROXY");
        assert_eq!(cfn["IntegrationHttpMethod"], "POST");
        assert_eq!(
            cfn["Uri"]["Fn::Join"][1][5],
            json!({ "Fn::GetAtt": ["MyLambdaFunction67CCA873", "Arn"] })
        );
    }

    #[test]
    fn test_disable_test_invoke() {
        let integration = LambdaIntegration::new(&function()).allow_test_invoke(false);
        assert!(!integration.allows_test_invoke());
    }
}
