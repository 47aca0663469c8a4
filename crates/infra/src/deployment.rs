//! A full stage deployment: every stack in dependency order, plus the
//! synthesis step that writes their templates to disk.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use bronzedraw_core::stage::Stage;
use serde_json::json;

use crate::api::{ApiStack, LambdaArtifact};
use crate::database::DatabaseStack;
use crate::error::InfraError;
use crate::frontend::FrontendStack;
use crate::naming;
use crate::network::NetworkStack;
use crate::template::Stack;

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone)]
pub struct Deployment {
    pub stage: Stage,
    pub account: Option<String>,
    pub region: &'static str,
    stacks: Vec<Stack>,
}

impl Deployment {
    /// Network, database, api and frontend stacks for `stage`, with the
    /// default Lambda artifact location.
    pub fn new(stage: Stage, account: Option<String>) -> Result<Self, InfraError> {
        Self::with_artifact(stage, account, LambdaArtifact::default_for(stage))
    }

    pub fn with_artifact(
        stage: Stage,
        account: Option<String>,
        artifact: LambdaArtifact,
    ) -> Result<Self, InfraError> {
        let stacks = vec![
            NetworkStack::new(stage).build()?,
            DatabaseStack::new(stage).build()?,
            ApiStack::new(stage, artifact).build()?,
            FrontendStack::new(stage, account.clone()).build()?,
        ];
        Self::from_stacks(stage, account, stacks)
    }

    /// Validate an arbitrary set of stacks and order them so every stack
    /// comes after the stacks it depends on.
    pub fn from_stacks(
        stage: Stage,
        account: Option<String>,
        stacks: Vec<Stack>,
    ) -> Result<Self, InfraError> {
        for stack in &stacks {
            stack.validate()?;
        }
        let stacks = dependency_order(stacks)?;
        check_imports(&stacks)?;

        Ok(Self {
            stage,
            account,
            region: naming::REGION,
            stacks,
        })
    }

    /// Stacks in deployment order.
    pub fn stacks(&self) -> &[Stack] {
        &self.stacks
    }

    pub fn stack(&self, name: &str) -> Option<&Stack> {
        self.stacks.iter().find(|s| s.name == name)
    }

    pub fn manifest(&self) -> serde_json::Value {
        let stacks: Vec<serde_json::Value> = self
            .stacks
            .iter()
            .map(|s| {
                json!({
                    "name": s.name,
                    "template": template_file_name(&s.name),
                    "dependencies": s.dependencies,
                    "parameters": s.parameters.iter().map(|p| &p.name).collect::<Vec<_>>(),
                    "tags": s.tags,
                })
            })
            .collect();

        json!({
            "stage": self.stage,
            "region": self.region,
            "account": self.account,
            "stacks": stacks,
        })
    }

    /// Write `<StackName>.template.json` for every stack and a
    /// `manifest.json` listing them in deployment order. Returns the paths
    /// written.
    pub fn synthesize(&self, dir: &Path) -> Result<Vec<PathBuf>, InfraError> {
        fs::create_dir_all(dir).map_err(|source| InfraError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut written = Vec::with_capacity(self.stacks.len() + 1);
        for stack in &self.stacks {
            let path = dir.join(template_file_name(&stack.name));
            write_json(&path, &stack.template())?;
            tracing::debug!(stack = %stack.name, path = %path.display(), "Template written");
            written.push(path);
        }

        let manifest = dir.join(MANIFEST_FILE);
        write_json(&manifest, &self.manifest())?;
        written.push(manifest);

        tracing::info!(
            stage = %self.stage,
            stacks = self.stacks.len(),
            dir = %dir.display(),
            "Synthesis complete"
        );
        Ok(written)
    }
}

pub fn template_file_name(stack_name: &str) -> String {
    format!("{stack_name}.template.json")
}

fn write_json(path: &Path, value: &serde_json::Value) -> Result<(), InfraError> {
    let mut body = serde_json::to_string_pretty(value)?;
    body.push('\n');
    fs::write(path, body).map_err(|source| InfraError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Kahn's algorithm. Ties keep the input order so output is deterministic.
fn dependency_order(stacks: Vec<Stack>) -> Result<Vec<Stack>, InfraError> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(stacks.len());
    for (i, stack) in stacks.iter().enumerate() {
        if index.insert(stack.name.clone(), i).is_some() {
            return Err(InfraError::DuplicateStack(stack.name.clone()));
        }
    }

    let mut in_degree = vec![0usize; stacks.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); stacks.len()];
    for (i, stack) in stacks.iter().enumerate() {
        for dependency in &stack.dependencies {
            let &d = index
                .get(dependency)
                .ok_or_else(|| InfraError::UnknownDependency {
                    stack: stack.name.clone(),
                    dependency: dependency.clone(),
                })?;
            dependents[d].push(i);
            in_degree[i] += 1;
        }
    }

    let mut ready: VecDeque<usize> = (0..stacks.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(stacks.len());
    while let Some(i) = ready.pop_front() {
        order.push(i);
        for &next in &dependents[i] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push_back(next);
            }
        }
    }

    if order.len() < stacks.len() {
        let mut stuck: Vec<String> = (0..stacks.len())
            .filter(|&i| in_degree[i] > 0)
            .map(|i| stacks[i].name.clone())
            .collect();
        stuck.sort();
        return Err(InfraError::DependencyCycle(stuck));
    }

    let mut slots: Vec<Option<Stack>> = stacks.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
}

/// Every imported export must come from a stack the importer (transitively)
/// depends on, otherwise the control plane could deploy them out of order.
/// Expects `stacks` in dependency order.
fn check_imports(stacks: &[Stack]) -> Result<(), InfraError> {
    let mut exporters: BTreeMap<&str, &str> = BTreeMap::new();
    for stack in stacks {
        for export in stack.exports() {
            if exporters.insert(export, stack.name.as_str()).is_some() {
                return Err(InfraError::DuplicateExport(export.to_string()));
            }
        }
    }

    let mut upstream: HashMap<&str, HashSet<&str>> = HashMap::new();
    for stack in stacks {
        let mut reachable: HashSet<&str> = HashSet::new();
        for dependency in &stack.dependencies {
            reachable.insert(dependency.as_str());
            if let Some(transitive) = upstream.get(dependency.as_str()) {
                reachable.extend(transitive.iter().copied());
            }
        }

        for export in stack.imports() {
            let resolved = exporters
                .get(export.as_str())
                .is_some_and(|exporter| reachable.contains(exporter));
            if !resolved {
                return Err(InfraError::UnresolvedImport {
                    stack: stack.name.clone(),
                    export,
                });
            }
        }

        upstream.insert(stack.name.as_str(), reachable);
    }
    Ok(())
}
