//! Aurora PostgreSQL Serverless v2 cluster with its credentials secret.

use bronzedraw_core::stage::Stage;
use serde_json::json;

use crate::error::InfraError;
use crate::naming;
use crate::network::{self, POSTGRES_PORT};
use crate::template::{Output, RemovalPolicy, Resource, Stack, Value};

pub const KIND: &str = "Database";

pub const DATABASE_NAME: &str = "bronzedraw";
pub const MASTER_USERNAME: &str = "bronzedraw";
pub const ENGINE: &str = "aurora-postgresql";
pub const ENGINE_VERSION: &str = "16.6";

// Export keys consumed by the api stack.
pub const EXPORT_CLUSTER_ENDPOINT: &str = "DBClusterEndpoint";
pub const EXPORT_CLUSTER_IDENTIFIER: &str = "DBClusterIdentifier";
pub const EXPORT_SECRET_ARN: &str = "DBSecretArn";
pub const EXPORT_DB_NAME: &str = "DBName";

#[derive(Debug, Clone)]
pub struct DatabaseStack {
    pub stage: Stage,
    pub min_capacity: f64,
    pub max_capacity: f64,
    /// Number of private subnets exported by the network stack.
    pub zones: usize,
}

impl DatabaseStack {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            min_capacity: 0.5,
            max_capacity: 1.0,
            zones: 2,
        }
    }

    pub fn name(&self) -> String {
        naming::stack_name(KIND, self.stage)
    }

    /// Days of automated backups kept for the stage.
    pub fn backup_retention_days(&self) -> u32 {
        if self.stage.is_production() {
            7
        } else {
            1
        }
    }

    pub fn removal_policy(&self) -> RemovalPolicy {
        if self.stage.is_production() {
            RemovalPolicy::Snapshot
        } else {
            RemovalPolicy::Destroy
        }
    }

    pub fn build(&self) -> Result<Stack, InfraError> {
        if !(self.min_capacity > 0.0 && self.min_capacity <= self.max_capacity) {
            return Err(InfraError::InvalidConfig {
                stack: KIND,
                reason: format!(
                    "capacity range {}..{} is empty or non-positive",
                    self.min_capacity, self.max_capacity
                ),
            });
        }

        let stage = self.stage;
        let production = stage.is_production();
        let cluster_identifier = naming::resource_name("aurora", stage);

        let mut stack = Stack::new(self.name(), naming::stack_description(KIND, stage));
        stack.add_dependency(naming::stack_name(network::KIND, stage));

        stack.add_resource(Resource::new(
            "AuroraSecret",
            "AWS::SecretsManager::Secret",
            json!({
                "Name": naming::resource_name("aurora", stage),
                "Description": format!("Aurora PostgreSQL credentials for {stage}"),
                "GenerateSecretString": {
                    "SecretStringTemplate": json!({ "username": MASTER_USERNAME }).to_string(),
                    "GenerateStringKey": "password",
                    "ExcludePunctuation": true,
                    "PasswordLength": 32,
                },
            }),
        ));

        stack.add_resource(
            Resource::new(
                "AuroraSubnetGroup",
                "AWS::RDS::DBSubnetGroup",
                json!({
                    "DBSubnetGroupDescription": format!("Subnets for {cluster_identifier}"),
                    "SubnetIds": network::private_subnet_imports(stage, self.zones),
                }),
            )
            .removal_policy(RemovalPolicy::Destroy),
        );

        stack.add_resource(
            Resource::new(
                "AuroraCluster",
                "AWS::RDS::DBCluster",
                json!({
                    "DBClusterIdentifier": cluster_identifier,
                    "Engine": ENGINE,
                    "EngineVersion": ENGINE_VERSION,
                    "DatabaseName": DATABASE_NAME,
                    "Port": POSTGRES_PORT,
                    "MasterUsername": secret_field("username"),
                    "MasterUserPassword": secret_field("password"),
                    "DBSubnetGroupName": Value::reference("AuroraSubnetGroup"),
                    "VpcSecurityGroupIds": [Value::import(naming::export_name(
                        network::EXPORT_AURORA_SG_ID,
                        stage,
                    ))],
                    "ServerlessV2ScalingConfiguration": {
                        "MinCapacity": self.min_capacity,
                        "MaxCapacity": self.max_capacity,
                    },
                    "BackupRetentionPeriod": self.backup_retention_days(),
                    "PreferredBackupWindow": "17:00-18:00",
                    "PreferredMaintenanceWindow": "Sun:18:00-Sun:19:00",
                    "EnableCloudwatchLogsExports": ["postgresql"],
                    "EnableHttpEndpoint": true,
                    "DeletionProtection": production,
                    "StorageEncrypted": true,
                    "CopyTagsToSnapshot": true,
                }),
            )
            .removal_policy(self.removal_policy()),
        );

        stack.add_resource(
            Resource::new(
                "AuroraWriter",
                "AWS::RDS::DBInstance",
                json!({
                    "DBClusterIdentifier": Value::reference("AuroraCluster"),
                    "DBInstanceClass": "db.serverless",
                    "Engine": ENGINE,
                    "PubliclyAccessible": false,
                    "EnablePerformanceInsights": true,
                    "PerformanceInsightsRetentionPeriod": 7,
                }),
            )
            .removal_policy(RemovalPolicy::Destroy),
        );

        // Adds host, port and engine to the secret once the cluster exists.
        stack.add_resource(Resource::new(
            "AuroraSecretAttachment",
            "AWS::SecretsManager::SecretTargetAttachment",
            json!({
                "SecretId": Value::reference("AuroraSecret"),
                "TargetId": Value::reference("AuroraCluster"),
                "TargetType": "AWS::RDS::DBCluster",
            }),
        ));

        stack.add_output(Output::exported(
            "DBClusterEndpoint",
            Value::get_att("AuroraCluster", "Endpoint.Address"),
            "Aurora Cluster Endpoint",
            naming::export_name(EXPORT_CLUSTER_ENDPOINT, stage),
        ));
        stack.add_output(Output::exported(
            "DBClusterIdentifier",
            Value::reference("AuroraCluster"),
            "Aurora Cluster Identifier",
            naming::export_name(EXPORT_CLUSTER_IDENTIFIER, stage),
        ));
        stack.add_output(Output::exported(
            "DBSecretArn",
            Value::reference("AuroraSecret"),
            "Database Secret ARN",
            naming::export_name(EXPORT_SECRET_ARN, stage),
        ));
        stack.add_output(Output::exported(
            "DBName",
            Value::lit(DATABASE_NAME),
            "Database Name",
            naming::export_name(EXPORT_DB_NAME, stage),
        ));

        stack.tag("Env", stage.as_str());
        stack.tag("Project", naming::PROJECT);
        Ok(stack)
    }
}

/// Dynamic reference to one field of the generated secret.
fn secret_field(field: &str) -> Value {
    Value::join([
        "{{resolve:secretsmanager:".into(),
        Value::reference("AuroraSecret"),
        format!(":SecretString:{field}::}}}}").into(),
    ])
}
