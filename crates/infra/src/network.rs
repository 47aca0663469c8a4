//! Network boundary: VPC, subnets across two zones, NAT egress and the
//! security groups that gate database access.

use std::net::Ipv4Addr;

use bronzedraw_core::stage::Stage;
use serde_json::json;

use crate::error::InfraError;
use crate::naming;
use crate::template::{Output, Resource, Stack, Value};

pub const KIND: &str = "Network";

pub const POSTGRES_PORT: u16 = 5432;

// Export keys consumed by the database and api stacks.
pub const EXPORT_VPC_ID: &str = "VpcId";
pub const EXPORT_LAMBDA_SG_ID: &str = "LambdaSgId";
pub const EXPORT_AURORA_SG_ID: &str = "AuroraSgId";

/// Export key of the n-th (zero based) private subnet id.
pub fn private_subnet_export(index: usize) -> String {
    format!("PrivateSubnet{}Id", index + 1)
}

/// Import values for every private subnet, in zone order.
pub fn private_subnet_imports(stage: Stage, zones: usize) -> Vec<Value> {
    (0..zones)
        .map(|i| Value::import(naming::export_name(&private_subnet_export(i), stage)))
        .collect()
}

#[derive(Debug, Clone)]
pub struct NetworkStack {
    pub stage: Stage,
    pub cidr: String,
    pub max_azs: usize,
    pub nat_gateways: usize,
    /// Prefix length of every subnet.
    pub subnet_prefix: u8,
}

impl NetworkStack {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            cidr: "10.0.0.0/16".into(),
            max_azs: 2,
            nat_gateways: 2,
            subnet_prefix: 24,
        }
    }

    pub fn name(&self) -> String {
        naming::stack_name(KIND, self.stage)
    }

    pub fn build(&self) -> Result<Stack, InfraError> {
        if self.max_azs == 0 {
            return Err(InfraError::InvalidConfig {
                stack: KIND,
                reason: "at least one availability zone is required".into(),
            });
        }
        if self.nat_gateways == 0 || self.nat_gateways > self.max_azs {
            return Err(InfraError::InvalidConfig {
                stack: KIND,
                reason: format!(
                    "nat_gateways must be between 1 and {} (got {})",
                    self.max_azs, self.nat_gateways
                ),
            });
        }

        let stage = self.stage;
        // Public subnets take the first blocks, private ones the next.
        let blocks = carve_subnets(&self.cidr, self.subnet_prefix, self.max_azs * 2)?;
        let (public_blocks, private_blocks) = blocks.split_at(self.max_azs);

        let mut stack = Stack::new(self.name(), naming::stack_description(KIND, stage));

        stack.add_resource(Resource::new(
            "Vpc",
            "AWS::EC2::VPC",
            json!({
                "CidrBlock": self.cidr,
                "EnableDnsHostnames": true,
                "EnableDnsSupport": true,
                "InstanceTenancy": "default",
                "Tags": [{ "Key": "Name", "Value": naming::resource_name("vpc", stage) }],
            }),
        ));
        stack.add_resource(Resource::new(
            "InternetGateway",
            "AWS::EC2::InternetGateway",
            json!({}),
        ));
        stack.add_resource(Resource::new(
            "VpcGatewayAttachment",
            "AWS::EC2::VPCGatewayAttachment",
            json!({
                "VpcId": Value::reference("Vpc"),
                "InternetGatewayId": Value::reference("InternetGateway"),
            }),
        ));

        for (i, cidr) in public_blocks.iter().enumerate() {
            let n = i + 1;
            let subnet = format!("PublicSubnet{n}");
            add_subnet(&mut stack, &subnet, cidr, i, true);
            stack.add_resource(
                Resource::new(
                    format!("{subnet}DefaultRoute"),
                    "AWS::EC2::Route",
                    json!({
                        "RouteTableId": Value::reference(format!("{subnet}RouteTable")),
                        "DestinationCidrBlock": "0.0.0.0/0",
                        "GatewayId": Value::reference("InternetGateway"),
                    }),
                )
                .depends_on("VpcGatewayAttachment"),
            );

            if i < self.nat_gateways {
                stack.add_resource(Resource::new(
                    format!("{subnet}Eip"),
                    "AWS::EC2::EIP",
                    json!({ "Domain": "vpc" }),
                ));
                stack.add_resource(
                    Resource::new(
                        format!("{subnet}NatGateway"),
                        "AWS::EC2::NatGateway",
                        json!({
                            "SubnetId": Value::reference(subnet.clone()),
                            "AllocationId": Value::get_att(format!("{subnet}Eip"), "AllocationId"),
                        }),
                    )
                    .depends_on(format!("{subnet}DefaultRoute")),
                );
            }
        }

        for (i, cidr) in private_blocks.iter().enumerate() {
            let subnet = format!("PrivateSubnet{}", i + 1);
            add_subnet(&mut stack, &subnet, cidr, i, false);

            // Zones without their own gateway share the last one.
            let nat = format!("PublicSubnet{}NatGateway", i.min(self.nat_gateways - 1) + 1);
            stack.add_resource(Resource::new(
                format!("{subnet}DefaultRoute"),
                "AWS::EC2::Route",
                json!({
                    "RouteTableId": Value::reference(format!("{subnet}RouteTable")),
                    "DestinationCidrBlock": "0.0.0.0/0",
                    "NatGatewayId": Value::reference(nat),
                }),
            ));
        }

        stack.add_resource(Resource::new(
            "LambdaSg",
            "AWS::EC2::SecurityGroup",
            json!({
                "GroupName": naming::resource_name("lambda-sg", stage),
                "GroupDescription": "Security group for Lambda functions",
                "VpcId": Value::reference("Vpc"),
                "SecurityGroupEgress": [{
                    "CidrIp": "0.0.0.0/0",
                    "IpProtocol": "-1",
                    "Description": "Allow all outbound traffic by default",
                }],
            }),
        ));
        // An empty egress list would mean "allow all", so outbound is
        // blocked with a rule that matches nothing.
        stack.add_resource(Resource::new(
            "AuroraSg",
            "AWS::EC2::SecurityGroup",
            json!({
                "GroupName": naming::resource_name("aurora-sg", stage),
                "GroupDescription": "Security group for Aurora database",
                "VpcId": Value::reference("Vpc"),
                "SecurityGroupEgress": [{
                    "CidrIp": "255.255.255.255/32",
                    "IpProtocol": "icmp",
                    "FromPort": 252,
                    "ToPort": 86,
                    "Description": "Disallow all traffic",
                }],
            }),
        ));
        stack.add_resource(Resource::new(
            "AuroraSgIngressFromLambda",
            "AWS::EC2::SecurityGroupIngress",
            json!({
                "GroupId": Value::get_att("AuroraSg", "GroupId"),
                "SourceSecurityGroupId": Value::get_att("LambdaSg", "GroupId"),
                "IpProtocol": "tcp",
                "FromPort": POSTGRES_PORT,
                "ToPort": POSTGRES_PORT,
                "Description": "Allow Lambda to access Aurora PostgreSQL",
            }),
        ));

        stack.add_output(Output::exported(
            "VpcId",
            Value::reference("Vpc"),
            "VPC ID",
            naming::export_name(EXPORT_VPC_ID, stage),
        ));
        stack.add_output(Output::exported(
            "LambdaSecurityGroupId",
            Value::get_att("LambdaSg", "GroupId"),
            "Lambda Security Group ID",
            naming::export_name(EXPORT_LAMBDA_SG_ID, stage),
        ));
        stack.add_output(Output::exported(
            "AuroraSecurityGroupId",
            Value::get_att("AuroraSg", "GroupId"),
            "Aurora Security Group ID",
            naming::export_name(EXPORT_AURORA_SG_ID, stage),
        ));
        for i in 0..self.max_azs {
            let key = private_subnet_export(i);
            stack.add_output(Output::exported(
                key.clone(),
                Value::reference(format!("PrivateSubnet{}", i + 1)),
                format!("Private subnet {} ID", i + 1),
                naming::export_name(&key, stage),
            ));
        }

        stack.tag("Env", stage.as_str());
        stack.tag("Project", naming::PROJECT);
        Ok(stack)
    }
}

fn add_subnet(stack: &mut Stack, subnet: &str, cidr: &str, zone: usize, public: bool) {
    stack.add_resource(Resource::new(
        subnet,
        "AWS::EC2::Subnet",
        json!({
            "VpcId": Value::reference("Vpc"),
            "CidrBlock": cidr,
            "AvailabilityZone": Value::AvailabilityZone(zone),
            "MapPublicIpOnLaunch": public,
        }),
    ));
    stack.add_resource(Resource::new(
        format!("{subnet}RouteTable"),
        "AWS::EC2::RouteTable",
        json!({ "VpcId": Value::reference("Vpc") }),
    ));
    stack.add_resource(Resource::new(
        format!("{subnet}RouteTableAssociation"),
        "AWS::EC2::SubnetRouteTableAssociation",
        json!({
            "RouteTableId": Value::reference(format!("{subnet}RouteTable")),
            "SubnetId": Value::reference(subnet),
        }),
    ));
}

// ---------------------------------------------------------------------------
// CIDR carving
// ---------------------------------------------------------------------------

/// Split `parent` into `count` consecutive blocks of length `prefix`,
/// starting at the parent's network address.
pub fn carve_subnets(parent: &str, prefix: u8, count: usize) -> Result<Vec<String>, InfraError> {
    let invalid = |reason: String| InfraError::InvalidCidr {
        cidr: parent.to_string(),
        reason,
    };

    let (addr, parent_prefix) = parent
        .split_once('/')
        .ok_or_else(|| invalid("expected <address>/<prefix>".into()))?;
    let addr: Ipv4Addr = addr.parse().map_err(|e| invalid(format!("{e}")))?;
    let parent_prefix: u8 = parent_prefix
        .parse()
        .map_err(|_| invalid(format!("prefix '{parent_prefix}' is not a number")))?;

    if parent_prefix > 32 || prefix > 32 {
        return Err(invalid("prefix length must be at most 32".into()));
    }
    if prefix < parent_prefix {
        return Err(invalid(format!(
            "/{prefix} blocks do not fit inside a /{parent_prefix}"
        )));
    }

    let base = u32::from(addr);
    let parent_mask = mask(parent_prefix);
    if base & !parent_mask != 0 {
        return Err(invalid("address has host bits set".into()));
    }

    let available = 1u64 << (prefix - parent_prefix);
    if count as u64 > available {
        return Err(invalid(format!(
            "only {available} /{prefix} blocks available, {count} requested"
        )));
    }

    let block_size = 1u64 << (32 - prefix);
    Ok((0..count as u64)
        .map(|i| {
            // Bounded by the parent block, so the sum fits in a u32.
            let start = (u64::from(base) + i * block_size) as u32;
            format!("{}/{prefix}", Ipv4Addr::from(start))
        })
        .collect())
}

fn mask(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - prefix)
    }
}
