//! Static frontend hosting: a private bucket served through a CDN
//! distribution, plus the runtime `config.json` pointing at the API.

use bronzedraw_core::stage::Stage;
use serde_json::json;

use crate::api;
use crate::error::InfraError;
use crate::naming;
use crate::template::{pseudo, Output, Parameter, RemovalPolicy, Resource, Stack, Value};

pub const KIND: &str = "Frontend";

/// Managed `CachingOptimized` cache policy.
pub const CACHING_OPTIMIZED_POLICY_ID: &str = "658327ea-f89d-4fab-a63d-7e88639e58f6";

pub const PRICE_CLASS: &str = "PriceClass_200";

/// Name of the stack parameter carrying the custom resource handler ARN.
pub const PROVIDER_PARAMETER: &str = "CustomResourceProviderArn";

pub const CONFIG_OBJECT_KEY: &str = "config.json";

const SPA_ERROR_TTL_SECS: u32 = 300;

#[derive(Debug, Clone)]
pub struct FrontendStack {
    pub stage: Stage,
    /// Account id baked into the bucket name. Resolved at deploy time when
    /// absent.
    pub account: Option<String>,
}

impl FrontendStack {
    pub fn new(stage: Stage, account: Option<String>) -> Self {
        Self { stage, account }
    }

    pub fn name(&self) -> String {
        naming::stack_name(KIND, self.stage)
    }

    pub fn removal_policy(&self) -> RemovalPolicy {
        if self.stage.is_production() {
            RemovalPolicy::Retain
        } else {
            RemovalPolicy::Destroy
        }
    }

    /// `bronzedraw-frontend-<stage>-<account>`.
    pub fn bucket_name(&self) -> Value {
        let prefix = format!("{}-", naming::resource_name("frontend", self.stage));
        match &self.account {
            Some(account) => Value::lit(format!("{prefix}{account}")),
            None => Value::join([prefix.into(), Value::reference(pseudo::ACCOUNT_ID)]),
        }
    }

    pub fn build(&self) -> Result<Stack, InfraError> {
        if let Some(account) = &self.account {
            if account.is_empty() || !account.chars().all(|c| c.is_ascii_digit()) {
                return Err(InfraError::InvalidConfig {
                    stack: KIND,
                    reason: format!("account '{account}' is not a numeric account id"),
                });
            }
        }

        let stage = self.stage;
        let production = stage.is_production();

        let mut stack = Stack::new(self.name(), naming::stack_description(KIND, stage));
        stack.add_dependency(naming::stack_name(api::KIND, stage));
        stack.add_parameter(Parameter {
            name: PROVIDER_PARAMETER.into(),
            description: "ARN of the Lambda handling this stack's custom resources".into(),
        });

        stack.add_resource(
            Resource::new(
                "FrontendBucket",
                "AWS::S3::Bucket",
                json!({
                    "BucketName": self.bucket_name(),
                    "BucketEncryption": {
                        "ServerSideEncryptionConfiguration": [{
                            "ServerSideEncryptionByDefault": { "SSEAlgorithm": "AES256" },
                        }],
                    },
                    "VersioningConfiguration": { "Status": "Enabled" },
                    "PublicAccessBlockConfiguration": {
                        "BlockPublicAcls": true,
                        "BlockPublicPolicy": true,
                        "IgnorePublicAcls": true,
                        "RestrictPublicBuckets": true,
                    },
                }),
            )
            .removal_policy(self.removal_policy()),
        );

        stack.add_resource(Resource::new(
            "FrontendOac",
            "AWS::CloudFront::OriginAccessControl",
            json!({
                "OriginAccessControlConfig": {
                    "Name": naming::resource_name("frontend-oac", stage),
                    "OriginAccessControlOriginType": "s3",
                    "SigningBehavior": "always",
                    "SigningProtocol": "sigv4",
                },
            }),
        ));

        let spa_fallback = |code: u16| {
            json!({
                "ErrorCode": code,
                "ResponseCode": 200,
                "ResponsePagePath": "/index.html",
                "ErrorCachingMinTTL": SPA_ERROR_TTL_SECS,
            })
        };
        stack.add_resource(Resource::new(
            "FrontendDistribution",
            "AWS::CloudFront::Distribution",
            json!({
                "DistributionConfig": {
                    "Enabled": true,
                    "Comment": format!("Bronzedraw Frontend Distribution - {stage}"),
                    "DefaultRootObject": "index.html",
                    "HttpVersion": "http2",
                    "IPV6Enabled": true,
                    "PriceClass": PRICE_CLASS,
                    "Origins": [{
                        "Id": "FrontendOrigin",
                        "DomainName": Value::get_att("FrontendBucket", "RegionalDomainName"),
                        "S3OriginConfig": { "OriginAccessIdentity": "" },
                        "OriginAccessControlId": Value::get_att("FrontendOac", "Id"),
                    }],
                    "DefaultCacheBehavior": {
                        "TargetOriginId": "FrontendOrigin",
                        "ViewerProtocolPolicy": "redirect-to-https",
                        "AllowedMethods": ["GET", "HEAD", "OPTIONS"],
                        "CachedMethods": ["GET", "HEAD", "OPTIONS"],
                        "CachePolicyId": CACHING_OPTIMIZED_POLICY_ID,
                        "Compress": true,
                    },
                    "CustomErrorResponses": [spa_fallback(404), spa_fallback(403)],
                },
            }),
        ));

        // Only the distribution may read objects.
        stack.add_resource(Resource::new(
            "FrontendBucketPolicy",
            "AWS::S3::BucketPolicy",
            json!({
                "Bucket": Value::reference("FrontendBucket"),
                "PolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Action": "s3:GetObject",
                        "Principal": { "Service": "cloudfront.amazonaws.com" },
                        "Resource": Value::join([
                            Value::get_att("FrontendBucket", "Arn"),
                            "/*".into(),
                        ]),
                        "Condition": {
                            "StringEquals": {
                                "AWS:SourceArn": Value::join([
                                    "arn:".into(),
                                    Value::reference(pseudo::PARTITION),
                                    ":cloudfront::".into(),
                                    Value::reference(pseudo::ACCOUNT_ID),
                                    ":distribution/".into(),
                                    Value::reference("FrontendDistribution"),
                                ]),
                            },
                        },
                    }],
                },
            }),
        ));

        if !production {
            stack.add_resource(
                Resource::new(
                    "FrontendBucketAutoDeleteObjects",
                    "Custom::S3AutoDeleteObjects",
                    json!({
                        "ServiceToken": Value::reference(PROVIDER_PARAMETER),
                        "BucketName": Value::reference("FrontendBucket"),
                    }),
                )
                .depends_on("FrontendBucketPolicy"),
            );
        }

        stack.add_resource(Resource::new(
            "FrontendConfigObject",
            "Custom::S3ConfigObject",
            json!({
                "ServiceToken": Value::reference(PROVIDER_PARAMETER),
                "Bucket": Value::reference("FrontendBucket"),
                "Key": CONFIG_OBJECT_KEY,
                "ContentType": "application/json",
                "Body": config_body(stage),
            }),
        ));

        stack.add_output(Output::exported(
            "FrontendBucketName",
            Value::reference("FrontendBucket"),
            "Frontend S3 bucket name",
            naming::export_name("FrontendBucketName", stage),
        ));
        stack.add_output(Output::exported(
            "DistributionId",
            Value::reference("FrontendDistribution"),
            "CloudFront distribution ID",
            naming::export_name("DistributionId", stage),
        ));
        stack.add_output(Output::exported(
            "DistributionUrl",
            Value::join([
                "https://".into(),
                Value::get_att("FrontendDistribution", "DomainName"),
            ]),
            "CloudFront distribution URL",
            naming::export_name("DistributionUrl", stage),
        ));

        stack.tag("Env", stage.as_str());
        stack.tag("Project", naming::PROJECT);
        Ok(stack)
    }
}

/// `{"apiUrl": "<api url>"}` with the URL imported from the api stack.
fn config_body(stage: Stage) -> Value {
    Value::join([
        "{\"apiUrl\": \"".into(),
        Value::import(naming::export_name(api::EXPORT_API_URL, stage)),
        "\"}".into(),
    ])
}
