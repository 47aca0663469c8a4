//! Lookup service compute: the Lambda function, its roles, and the REST
//! API that proxies every path to it.

use bronzedraw_core::stage::Stage;
use serde_json::json;

use crate::database;
use crate::error::InfraError;
use crate::naming;
use crate::network;
use crate::template::{pseudo, Output, Resource, Stack, Value};

pub const KIND: &str = "Api";

pub const RUNTIME: &str = "provided.al2023";
pub const HANDLER: &str = "bootstrap";
pub const ARCHITECTURE: &str = "arm64";

pub const EXPORT_API_URL: &str = "ApiUrl";
pub const EXPORT_FUNCTION_ARN: &str = "LambdaFunctionArn";
pub const EXPORT_FUNCTION_NAME: &str = "LambdaFunctionName";

const CORS_ALLOW_METHODS: &str = "'OPTIONS,GET,PUT,POST,DELETE,PATCH,HEAD'";

/// Location of the zipped `bootstrap` binary for the lookup service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LambdaArtifact {
    pub bucket: String,
    pub key: String,
}

impl LambdaArtifact {
    pub fn default_for(stage: Stage) -> Self {
        Self {
            bucket: naming::resource_name("artifacts", stage),
            key: "jan-api/bootstrap.zip".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiStack {
    pub stage: Stage,
    pub artifact: LambdaArtifact,
    pub timeout_secs: u32,
    pub memory_mb: u32,
    pub throttle_rate_limit: u32,
    pub throttle_burst_limit: u32,
    /// Number of private subnets exported by the network stack.
    pub zones: usize,
}

impl ApiStack {
    pub fn new(stage: Stage, artifact: LambdaArtifact) -> Self {
        Self {
            stage,
            artifact,
            timeout_secs: 30,
            memory_mb: 512,
            throttle_rate_limit: 1000,
            throttle_burst_limit: 2000,
            zones: 2,
        }
    }

    pub fn name(&self) -> String {
        naming::stack_name(KIND, self.stage)
    }

    pub fn function_name(&self) -> String {
        naming::resource_name("jan-api", self.stage)
    }

    pub fn build(&self) -> Result<Stack, InfraError> {
        if self.artifact.bucket.is_empty() || self.artifact.key.is_empty() {
            return Err(InfraError::InvalidConfig {
                stack: KIND,
                reason: "artifact bucket and key must be set".into(),
            });
        }

        let stage = self.stage;
        let import = |key: &str| Value::import(naming::export_name(key, stage));

        let mut stack = Stack::new(self.name(), naming::stack_description(KIND, stage));
        stack.add_dependency(naming::stack_name(network::KIND, stage));
        stack.add_dependency(naming::stack_name(database::KIND, stage));

        // -- Roles --

        stack.add_resource(Resource::new(
            "ApiGatewayCloudWatchRole",
            "AWS::IAM::Role",
            json!({
                "AssumeRolePolicyDocument": assume_role_policy("apigateway.amazonaws.com"),
                "ManagedPolicyArns": [
                    managed_policy_arn("service-role/AmazonAPIGatewayPushToCloudWatchLogs"),
                ],
            }),
        ));
        stack.add_resource(Resource::new(
            "ApiGatewayAccount",
            "AWS::ApiGateway::Account",
            json!({
                "CloudWatchRoleArn": Value::get_att("ApiGatewayCloudWatchRole", "Arn"),
            }),
        ));

        stack.add_resource(Resource::new(
            "LambdaExecutionRole",
            "AWS::IAM::Role",
            json!({
                "AssumeRolePolicyDocument": assume_role_policy("lambda.amazonaws.com"),
                "ManagedPolicyArns": [
                    managed_policy_arn("service-role/AWSLambdaVPCAccessExecutionRole"),
                    managed_policy_arn("service-role/AWSLambdaBasicExecutionRole"),
                ],
            }),
        ));
        stack.add_resource(Resource::new(
            "LambdaExecutionRoleSecretPolicy",
            "AWS::IAM::Policy",
            json!({
                "PolicyName": "ReadDatabaseSecret",
                "Roles": [Value::reference("LambdaExecutionRole")],
                "PolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Action": [
                            "secretsmanager:GetSecretValue",
                            "secretsmanager:DescribeSecret",
                        ],
                        "Resource": import(database::EXPORT_SECRET_ARN),
                    }],
                },
            }),
        ));

        // -- Function --

        stack.add_resource(
            Resource::new(
                "JanApiFunction",
                "AWS::Lambda::Function",
                json!({
                    "FunctionName": self.function_name(),
                    "Runtime": RUNTIME,
                    "Handler": HANDLER,
                    "Architectures": [ARCHITECTURE],
                    "Code": {
                        "S3Bucket": self.artifact.bucket,
                        "S3Key": self.artifact.key,
                    },
                    "Role": Value::get_att("LambdaExecutionRole", "Arn"),
                    "Timeout": self.timeout_secs,
                    "MemorySize": self.memory_mb,
                    "Environment": {
                        "Variables": {
                            "ENV": stage.as_str(),
                            "DB_SECRET_ARN": import(database::EXPORT_SECRET_ARN),
                            "DB_CLUSTER_ENDPOINT": import(database::EXPORT_CLUSTER_ENDPOINT),
                            "DB_NAME": import(database::EXPORT_DB_NAME),
                        },
                    },
                    "VpcConfig": {
                        "SubnetIds": network::private_subnet_imports(stage, self.zones),
                        "SecurityGroupIds": [import(network::EXPORT_LAMBDA_SG_ID)],
                    },
                }),
            )
            .depends_on("LambdaExecutionRole")
            .depends_on("LambdaExecutionRoleSecretPolicy"),
        );

        // -- REST API --

        stack.add_resource(Resource::new(
            "JanApi",
            "AWS::ApiGateway::RestApi",
            json!({ "Name": naming::resource_name("jan-api", stage) }),
        ));
        stack.add_resource(Resource::new(
            "JanApiProxyResource",
            "AWS::ApiGateway::Resource",
            json!({
                "RestApiId": Value::reference("JanApi"),
                "ParentId": Value::get_att("JanApi", "RootResourceId"),
                "PathPart": "{proxy+}",
            }),
        ));

        let root = Value::get_att("JanApi", "RootResourceId");
        let proxy = Value::reference("JanApiProxyResource");
        let mut methods = Vec::new();
        for (prefix, resource_id) in [("JanApiRoot", root), ("JanApiProxy", proxy)] {
            let any = format!("{prefix}AnyMethod");
            stack.add_resource(Resource::new(
                any.clone(),
                "AWS::ApiGateway::Method",
                json!({
                    "RestApiId": Value::reference("JanApi"),
                    "ResourceId": resource_id,
                    "HttpMethod": "ANY",
                    "AuthorizationType": "NONE",
                    "Integration": {
                        "Type": "AWS_PROXY",
                        "IntegrationHttpMethod": "POST",
                        "Uri": lambda_invocation_uri("JanApiFunction"),
                    },
                }),
            ));

            let options = format!("{prefix}OptionsMethod");
            stack.add_resource(Resource::new(
                options.clone(),
                "AWS::ApiGateway::Method",
                cors_preflight_method(resource_id),
            ));
            methods.push(any);
            methods.push(options);
        }

        stack.add_resource(Resource::new(
            "JanApiInvokePermission",
            "AWS::Lambda::Permission",
            json!({
                "Action": "lambda:InvokeFunction",
                "FunctionName": Value::get_att("JanApiFunction", "Arn"),
                "Principal": "apigateway.amazonaws.com",
                "SourceArn": Value::join([
                    "arn:".into(),
                    Value::reference(pseudo::PARTITION),
                    ":execute-api:".into(),
                    Value::reference(pseudo::REGION),
                    ":".into(),
                    Value::reference(pseudo::ACCOUNT_ID),
                    ":".into(),
                    Value::reference("JanApi"),
                    "/*/*".into(),
                ]),
            }),
        ));

        let mut deployment = Resource::new(
            "JanApiDeployment",
            "AWS::ApiGateway::Deployment",
            json!({
                "RestApiId": Value::reference("JanApi"),
                "Description": "JAN lookup API deployment",
            }),
        );
        for method in methods {
            deployment = deployment.depends_on(method);
        }
        stack.add_resource(deployment);

        stack.add_resource(
            Resource::new(
                "JanApiStage",
                "AWS::ApiGateway::Stage",
                json!({
                    "RestApiId": Value::reference("JanApi"),
                    "DeploymentId": Value::reference("JanApiDeployment"),
                    "StageName": stage.as_str(),
                    "MethodSettings": [{
                        "ResourcePath": "/*",
                        "HttpMethod": "*",
                        "LoggingLevel": "INFO",
                        "DataTraceEnabled": true,
                        "MetricsEnabled": true,
                        "ThrottlingRateLimit": self.throttle_rate_limit,
                        "ThrottlingBurstLimit": self.throttle_burst_limit,
                    }],
                }),
            )
            .depends_on("ApiGatewayAccount"),
        );

        stack.add_output(Output::exported(
            "ApiUrl",
            Value::join([
                "https://".into(),
                Value::reference("JanApi"),
                ".execute-api.".into(),
                Value::reference(pseudo::REGION),
                ".".into(),
                Value::reference(pseudo::URL_SUFFIX),
                format!("/{stage}/").into(),
            ]),
            "API Gateway endpoint URL",
            naming::export_name(EXPORT_API_URL, stage),
        ));
        stack.add_output(Output::exported(
            "LambdaFunctionArn",
            Value::get_att("JanApiFunction", "Arn"),
            "Lambda Function ARN",
            naming::export_name(EXPORT_FUNCTION_ARN, stage),
        ));
        stack.add_output(Output::exported(
            "LambdaFunctionName",
            Value::reference("JanApiFunction"),
            "Lambda Function Name",
            naming::export_name(EXPORT_FUNCTION_NAME, stage),
        ));

        stack.tag("Env", stage.as_str());
        stack.tag("Project", naming::PROJECT);
        Ok(stack)
    }
}

fn assume_role_policy(service: &str) -> serde_json::Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Action": "sts:AssumeRole",
            "Effect": "Allow",
            "Principal": { "Service": service },
        }],
    })
}

fn managed_policy_arn(name: &str) -> Value {
    Value::join([
        "arn:".into(),
        Value::reference(pseudo::PARTITION),
        format!(":iam::aws:policy/{name}").into(),
    ])
}

fn lambda_invocation_uri(function: &str) -> Value {
    Value::join([
        "arn:".into(),
        Value::reference(pseudo::PARTITION),
        ":apigateway:".into(),
        Value::reference(pseudo::REGION),
        ":lambda:path/2015-03-31/functions/".into(),
        Value::get_att(function, "Arn"),
        "/invocations".into(),
    ])
}

/// Mock-integrated OPTIONS method answering preflight for any origin.
fn cors_preflight_method(resource_id: Value) -> serde_json::Value {
    json!({
        "RestApiId": Value::reference("JanApi"),
        "ResourceId": resource_id,
        "HttpMethod": "OPTIONS",
        "AuthorizationType": "NONE",
        "Integration": {
            "Type": "MOCK",
            "RequestTemplates": { "application/json": "{ statusCode: 200 }" },
            "IntegrationResponses": [{
                "StatusCode": "204",
                "ResponseParameters": {
                    "method.response.header.Access-Control-Allow-Headers": "'*'",
                    "method.response.header.Access-Control-Allow-Origin": "'*'",
                    "method.response.header.Access-Control-Allow-Methods": CORS_ALLOW_METHODS,
                },
            }],
        },
        "MethodResponses": [{
            "StatusCode": "204",
            "ResponseParameters": {
                "method.response.header.Access-Control-Allow-Headers": true,
                "method.response.header.Access-Control-Allow-Origin": true,
                "method.response.header.Access-Control-Allow-Methods": true,
            },
        }],
    })
}
