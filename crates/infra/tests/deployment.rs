//! Whole-deployment ordering, cross-stack wiring and synthesis output.

use assert_matches::assert_matches;
use bronzedraw_core::stage::Stage;
use bronzedraw_infra::network::NetworkStack;
use bronzedraw_infra::template::{Output, Stack, Value};
use bronzedraw_infra::{Deployment, InfraError};

fn names(deployment: &Deployment) -> Vec<&str> {
    deployment.stacks().iter().map(|s| s.name.as_str()).collect()
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

#[test]
fn stacks_are_ordered_network_database_api_frontend() {
    let deployment = Deployment::new(Stage::Dev, None).unwrap();
    assert_eq!(
        names(&deployment),
        [
            "BronzedrawNetworkStack-dev",
            "BronzedrawDatabaseStack-dev",
            "BronzedrawApiStack-dev",
            "BronzedrawFrontendStack-dev",
        ]
    );
}

#[test]
fn declared_dependencies_match_the_wiring() {
    let deployment = Deployment::new(Stage::Prod, Some("123456789012".into())).unwrap();
    let deps = |name: &str| deployment.stack(name).unwrap().dependencies.clone();

    assert!(deps("BronzedrawNetworkStack-prod").is_empty());
    assert_eq!(deps("BronzedrawDatabaseStack-prod"), ["BronzedrawNetworkStack-prod"]);
    assert_eq!(
        deps("BronzedrawApiStack-prod"),
        ["BronzedrawNetworkStack-prod", "BronzedrawDatabaseStack-prod"]
    );
    assert_eq!(deps("BronzedrawFrontendStack-prod"), ["BronzedrawApiStack-prod"]);
}

#[test]
fn reversed_input_is_still_ordered() {
    let deployment = Deployment::new(Stage::Stg, None).unwrap();
    let mut stacks = deployment.stacks().to_vec();
    stacks.reverse();

    let reordered = Deployment::from_stacks(Stage::Stg, None, stacks).unwrap();
    assert_eq!(names(&reordered), names(&deployment));
}

#[test]
fn stages_never_share_exports() {
    let dev = Deployment::new(Stage::Dev, None).unwrap();
    let prod = Deployment::new(Stage::Prod, None).unwrap();
    for stack in dev.stacks() {
        for export in stack.exports() {
            assert!(export.ends_with("-dev"), "{export}");
            assert!(prod.stacks().iter().all(|s| s.exports().all(|e| e != export)));
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[test]
fn missing_dependency_is_rejected() {
    let database = Deployment::new(Stage::Dev, None)
        .unwrap()
        .stack("BronzedrawDatabaseStack-dev")
        .unwrap()
        .clone();

    let result = Deployment::from_stacks(Stage::Dev, None, vec![database]);
    assert_matches!(
        result,
        Err(InfraError::UnknownDependency { dependency, .. })
            if dependency == "BronzedrawNetworkStack-dev"
    );
}

#[test]
fn cycle_is_rejected() {
    let mut a = Stack::new("A", "a");
    a.add_dependency("B");
    let mut b = Stack::new("B", "b");
    b.add_dependency("A");

    assert_matches!(
        Deployment::from_stacks(Stage::Dev, None, vec![a, b]),
        Err(InfraError::DependencyCycle(members)) if members == ["A", "B"]
    );
}

#[test]
fn import_without_dependency_is_rejected() {
    let network = NetworkStack::new(Stage::Dev).build().unwrap();
    let mut consumer = Stack::new("Consumer", "c");
    consumer.add_output(Output {
        key: "Vpc".into(),
        value: Value::import("BronzedrawVpcId-dev"),
        description: "re-export".into(),
        export_name: None,
    });

    assert_matches!(
        Deployment::from_stacks(Stage::Dev, None, vec![network, consumer]),
        Err(InfraError::UnresolvedImport { stack, export })
            if stack == "Consumer" && export == "BronzedrawVpcId-dev"
    );
}

#[test]
fn duplicate_export_is_rejected() {
    let first = NetworkStack::new(Stage::Dev).build().unwrap();
    let mut second = NetworkStack::new(Stage::Dev).build().unwrap();
    second.name = "Copy".into();

    assert_matches!(
        Deployment::from_stacks(Stage::Dev, None, vec![first, second]),
        Err(InfraError::DuplicateExport(_))
    );
}

// ---------------------------------------------------------------------------
// Synthesis
// ---------------------------------------------------------------------------

#[test]
fn synthesize_writes_templates_and_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("infra.out");
    let deployment = Deployment::new(Stage::Dev, Some("123456789012".into())).unwrap();

    let written = deployment.synthesize(&out).unwrap();
    assert_eq!(written.len(), 5);
    for path in &written {
        assert!(path.is_file(), "{} missing", path.display());
    }

    let network: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(out.join("BronzedrawNetworkStack-dev.template.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(network["AWSTemplateFormatVersion"], "2010-09-09");
    assert_eq!(network["Resources"]["Vpc"]["Type"], "AWS::EC2::VPC");

    let manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.join("manifest.json")).unwrap()).unwrap();
    assert_eq!(manifest["stage"], "dev");
    assert_eq!(manifest["region"], "ap-northeast-1");
    assert_eq!(manifest["account"], "123456789012");
    let stacks = manifest["stacks"].as_array().unwrap();
    assert_eq!(stacks.len(), 4);
    assert_eq!(stacks[0]["name"], "BronzedrawNetworkStack-dev");
    assert_eq!(stacks[3]["template"], "BronzedrawFrontendStack-dev.template.json");
    assert_eq!(stacks[3]["parameters"], serde_json::json!(["CustomResourceProviderArn"]));
}

#[test]
fn synthesize_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let deployment = Deployment::new(Stage::Prod, None).unwrap();

    deployment.synthesize(&dir.path().join("a")).unwrap();
    deployment.synthesize(&dir.path().join("b")).unwrap();

    for stack in deployment.stacks() {
        let file = format!("{}.template.json", stack.name);
        assert_eq!(
            std::fs::read(dir.path().join("a").join(&file)).unwrap(),
            std::fs::read(dir.path().join("b").join(&file)).unwrap()
        );
    }
}

#[test]
fn synthesize_reports_unwritable_directory() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("file");
    std::fs::write(&blocker, "not a directory").unwrap();

    let deployment = Deployment::new(Stage::Dev, None).unwrap();
    assert_matches!(
        deployment.synthesize(&blocker.join("out")),
        Err(InfraError::Io { .. })
    );
}
