//! Typed building blocks of a stack and their CloudFormation rendering.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Serialize, Serializer};
use serde_json::{json, Map};

use crate::error::InfraError;

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// Pseudo parameters resolved by the control plane at deploy time.
pub mod pseudo {
    pub const ACCOUNT_ID: &str = "AWS::AccountId";
    pub const PARTITION: &str = "AWS::Partition";
    pub const REGION: &str = "AWS::Region";
    pub const URL_SUFFIX: &str = "AWS::URLSuffix";
}

/// Resource types that accept a `Tags` property.
const TAGGABLE_TYPES: &[&str] = &[
    "AWS::EC2::VPC",
    "AWS::EC2::Subnet",
    "AWS::EC2::InternetGateway",
    "AWS::EC2::RouteTable",
    "AWS::EC2::EIP",
    "AWS::EC2::NatGateway",
    "AWS::EC2::SecurityGroup",
    "AWS::SecretsManager::Secret",
    "AWS::RDS::DBSubnetGroup",
    "AWS::RDS::DBCluster",
    "AWS::RDS::DBInstance",
    "AWS::IAM::Role",
    "AWS::Lambda::Function",
    "AWS::ApiGateway::RestApi",
    "AWS::ApiGateway::Stage",
    "AWS::S3::Bucket",
    "AWS::CloudFront::Distribution",
];

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// A property value: either a literal or a reference resolved by the
/// control plane.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Literal(serde_json::Value),
    /// `Ref` to a resource, parameter, or pseudo parameter in the same stack.
    Ref(String),
    /// Attribute of a resource in the same stack.
    GetAtt(String, String),
    /// Value exported by another stack.
    Import(String),
    /// String concatenation.
    Join(Vec<Value>),
    /// The n-th availability zone of the stack's region.
    AvailabilityZone(usize),
}

impl Value {
    pub fn lit(value: impl Into<serde_json::Value>) -> Self {
        Value::Literal(value.into())
    }

    pub fn reference(logical_id: impl Into<String>) -> Self {
        Value::Ref(logical_id.into())
    }

    pub fn get_att(logical_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        Value::GetAtt(logical_id.into(), attribute.into())
    }

    pub fn import(export_name: impl Into<String>) -> Self {
        Value::Import(export_name.into())
    }

    pub fn join(parts: impl IntoIterator<Item = Value>) -> Self {
        Value::Join(parts.into_iter().collect())
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Literal(v) => v.clone(),
            Value::Ref(id) => json!({ "Ref": id }),
            Value::GetAtt(id, attr) => json!({ "Fn::GetAtt": [id, attr] }),
            Value::Import(name) => json!({ "Fn::ImportValue": name }),
            Value::Join(parts) => {
                let parts: Vec<serde_json::Value> = parts.iter().map(Value::to_json).collect();
                json!({ "Fn::Join": ["", parts] })
            }
            Value::AvailabilityZone(index) => {
                json!({ "Fn::Select": [index, { "Fn::GetAZs": "" }] })
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Literal(serde_json::Value::String(s.to_string()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Literal(serde_json::Value::String(s))
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// What happens to the physical resource when it leaves the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RemovalPolicy {
    Destroy,
    Retain,
    /// Take a final snapshot, then delete. Databases only.
    Snapshot,
}

impl RemovalPolicy {
    /// The `DeletionPolicy` / `UpdateReplacePolicy` attribute value.
    pub fn as_cfn(self) -> &'static str {
        match self {
            RemovalPolicy::Destroy => "Delete",
            RemovalPolicy::Retain => "Retain",
            RemovalPolicy::Snapshot => "Snapshot",
        }
    }
}

// ---------------------------------------------------------------------------
// Resources, parameters and outputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Resource {
    pub logical_id: String,
    pub kind: &'static str,
    pub properties: serde_json::Value,
    pub depends_on: Vec<String>,
    pub removal_policy: Option<RemovalPolicy>,
}

impl Resource {
    pub fn new(
        logical_id: impl Into<String>,
        kind: &'static str,
        properties: serde_json::Value,
    ) -> Self {
        Self {
            logical_id: logical_id.into(),
            kind,
            properties,
            depends_on: Vec::new(),
            removal_policy: None,
        }
    }

    pub fn depends_on(mut self, logical_id: impl Into<String>) -> Self {
        self.depends_on.push(logical_id.into());
        self
    }

    pub fn removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.removal_policy = Some(policy);
        self
    }

    pub fn is_taggable(&self) -> bool {
        TAGGABLE_TYPES.contains(&self.kind)
    }

    /// Property lookup by key, `None` when absent.
    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(key)
    }

    fn to_json(&self, tags: &BTreeMap<String, String>) -> serde_json::Value {
        let mut properties = self.properties.clone();
        if self.is_taggable() && !tags.is_empty() {
            apply_tags(&mut properties, tags);
        }

        let mut entry = Map::new();
        entry.insert("Type".into(), json!(self.kind));
        entry.insert("Properties".into(), properties);
        if !self.depends_on.is_empty() {
            entry.insert("DependsOn".into(), json!(self.depends_on));
        }
        if let Some(policy) = self.removal_policy {
            entry.insert("DeletionPolicy".into(), json!(policy.as_cfn()));
            entry.insert("UpdateReplacePolicy".into(), json!(policy.as_cfn()));
        }
        serde_json::Value::Object(entry)
    }
}

/// Stack tags are appended to the resource's own tags; a key already set
/// on the resource wins. The result is sorted by key.
fn apply_tags(properties: &mut serde_json::Value, tags: &BTreeMap<String, String>) {
    let Some(props) = properties.as_object_mut() else {
        return;
    };

    let mut merged: BTreeMap<String, serde_json::Value> = tags
        .iter()
        .map(|(k, v)| (k.clone(), json!(v)))
        .collect();
    if let Some(existing) = props.get("Tags").and_then(|t| t.as_array()) {
        for tag in existing {
            if let (Some(key), Some(value)) = (tag.get("Key").and_then(|k| k.as_str()), tag.get("Value")) {
                merged.insert(key.to_string(), value.clone());
            }
        }
    }

    let tags: Vec<serde_json::Value> = merged
        .into_iter()
        .map(|(key, value)| json!({ "Key": key, "Value": value }))
        .collect();
    props.insert("Tags".into(), serde_json::Value::Array(tags));
}

/// A string input supplied by whoever deploys the stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Parameter {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct Output {
    pub key: String,
    pub value: Value,
    pub description: String,
    pub export_name: Option<String>,
}

impl Output {
    pub fn exported(
        key: impl Into<String>,
        value: Value,
        description: impl Into<String>,
        export_name: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            value,
            description: description.into(),
            export_name: Some(export_name.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Stack
// ---------------------------------------------------------------------------

/// One independently deployable resource graph.
#[derive(Debug, Clone)]
pub struct Stack {
    pub name: String,
    pub description: String,
    /// Names of stacks that must be deployed before this one.
    pub dependencies: Vec<String>,
    pub tags: BTreeMap<String, String>,
    pub parameters: Vec<Parameter>,
    resources: Vec<Resource>,
    outputs: Vec<Output>,
}

impl Stack {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            dependencies: Vec::new(),
            tags: BTreeMap::new(),
            parameters: Vec::new(),
            resources: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn add_dependency(&mut self, stack_name: impl Into<String>) {
        let name = stack_name.into();
        if !self.dependencies.contains(&name) {
            self.dependencies.push(name);
        }
    }

    pub fn tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.tags.insert(key.into(), value.into());
    }

    pub fn add_parameter(&mut self, parameter: Parameter) {
        self.parameters.push(parameter);
    }

    pub fn add_resource(&mut self, resource: Resource) {
        self.resources.push(resource);
    }

    pub fn add_output(&mut self, output: Output) {
        self.outputs.push(output);
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.logical_id == logical_id)
    }

    pub fn resources_of_type<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Resource> + 'a {
        self.resources.iter().filter(move |r| r.kind == kind)
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn output(&self, key: &str) -> Option<&Output> {
        self.outputs.iter().find(|o| o.key == key)
    }

    pub fn exports(&self) -> impl Iterator<Item = &str> {
        self.outputs.iter().filter_map(|o| o.export_name.as_deref())
    }

    /// Export names this stack consumes from other stacks.
    pub fn imports(&self) -> BTreeSet<String> {
        let mut refs = References::default();
        refs.collect(&self.template());
        refs.imports
    }

    /// Check that logical ids are unique and that every in-stack reference
    /// resolves to a resource, a parameter, or a pseudo parameter.
    pub fn validate(&self) -> Result<(), InfraError> {
        let mut known: HashSet<&str> = HashSet::new();
        for resource in &self.resources {
            if !known.insert(resource.logical_id.as_str()) {
                return Err(InfraError::DuplicateLogicalId {
                    stack: self.name.clone(),
                    logical_id: resource.logical_id.clone(),
                });
            }
        }
        known.extend(self.parameters.iter().map(|p| p.name.as_str()));

        let mut refs = References::default();
        refs.collect(&self.template());
        for resource in &self.resources {
            refs.targets.extend(resource.depends_on.iter().cloned());
        }

        match refs
            .targets
            .iter()
            .find(|t| !t.starts_with("AWS::") && !known.contains(t.as_str()))
        {
            Some(target) => Err(InfraError::DanglingReference {
                stack: self.name.clone(),
                target: target.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Render the stack as a CloudFormation template document.
    pub fn template(&self) -> serde_json::Value {
        let resources: Map<String, serde_json::Value> = self
            .resources
            .iter()
            .map(|r| (r.logical_id.clone(), r.to_json(&self.tags)))
            .collect();

        let mut template = Map::new();
        template.insert("AWSTemplateFormatVersion".into(), json!(TEMPLATE_FORMAT_VERSION));
        template.insert("Description".into(), json!(self.description));

        if !self.parameters.is_empty() {
            let parameters: Map<String, serde_json::Value> = self
                .parameters
                .iter()
                .map(|p| {
                    (
                        p.name.clone(),
                        json!({ "Type": "String", "Description": p.description }),
                    )
                })
                .collect();
            template.insert("Parameters".into(), serde_json::Value::Object(parameters));
        }

        template.insert("Resources".into(), serde_json::Value::Object(resources));

        if !self.outputs.is_empty() {
            let outputs: Map<String, serde_json::Value> = self
                .outputs
                .iter()
                .map(|o| {
                    let mut entry = Map::new();
                    entry.insert("Description".into(), json!(o.description));
                    entry.insert("Value".into(), o.value.to_json());
                    if let Some(name) = &o.export_name {
                        entry.insert("Export".into(), json!({ "Name": name }));
                    }
                    (o.key.clone(), serde_json::Value::Object(entry))
                })
                .collect();
            template.insert("Outputs".into(), serde_json::Value::Object(outputs));
        }

        serde_json::Value::Object(template)
    }
}

/// Intrinsic references found by walking a rendered template.
#[derive(Default)]
struct References {
    targets: BTreeSet<String>,
    imports: BTreeSet<String>,
}

impl References {
    fn collect(&mut self, value: &serde_json::Value) {
        match value {
            serde_json::Value::Object(map) => {
                if let Some(target) = map.get("Ref").and_then(|v| v.as_str()) {
                    self.targets.insert(target.to_string());
                }
                if let Some(target) = map
                    .get("Fn::GetAtt")
                    .and_then(|v| v.get(0))
                    .and_then(|v| v.as_str())
                {
                    self.targets.insert(target.to_string());
                }
                if let Some(export) = map.get("Fn::ImportValue").and_then(|v| v.as_str()) {
                    self.imports.insert(export.to_string());
                }
                map.values().for_each(|v| self.collect(v));
            }
            serde_json::Value::Array(items) => items.iter().for_each(|v| self.collect(v)),
            _ => {}
        }
    }
}
