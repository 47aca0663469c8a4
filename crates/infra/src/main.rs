use std::path::PathBuf;

use anyhow::Context;
use bronzedraw_core::stage::Stage;
use bronzedraw_infra::{Deployment, LambdaArtifact};
use tracing_subscriber::EnvFilter;

const DEFAULT_OUT_DIR: &str = "infra.out";

/// Write every stack template for one stage.
///
/// Usage: `bronzedraw-synth [OUT_DIR]`
///
/// | Env Var                 | Default                            |
/// |-------------------------|------------------------------------|
/// | `ENV_NAME`              | `dev`                              |
/// | `CDK_DEFAULT_ACCOUNT`   | resolved at deploy time            |
/// | `LAMBDA_ARTIFACT_BUCKET`| `bronzedraw-artifacts-<stage>`     |
/// | `LAMBDA_ARTIFACT_KEY`   | `jan-api/bootstrap.zip`            |
fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "bronzedraw_infra=info".into()),
        )
        .init();

    let stage: Stage = std::env::var("ENV_NAME")
        .unwrap_or_else(|_| Stage::Dev.to_string())
        .parse()
        .context("ENV_NAME must be one of dev, stg, prod")?;
    let account = std::env::var("CDK_DEFAULT_ACCOUNT")
        .ok()
        .filter(|a| !a.trim().is_empty());

    let defaults = LambdaArtifact::default_for(stage);
    let artifact = LambdaArtifact {
        bucket: std::env::var("LAMBDA_ARTIFACT_BUCKET").unwrap_or(defaults.bucket),
        key: std::env::var("LAMBDA_ARTIFACT_KEY").unwrap_or(defaults.key),
    };

    let out_dir = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUT_DIR));

    let deployment = Deployment::with_artifact(stage, account, artifact)
        .with_context(|| format!("Failed to assemble {stage} deployment"))?;
    for stack in deployment.stacks() {
        tracing::info!(
            stack = %stack.name,
            resources = stack.resources().len(),
            depends_on = ?stack.dependencies,
            "Stack ready"
        );
    }

    let written = deployment
        .synthesize(&out_dir)
        .with_context(|| format!("Failed to write templates to {}", out_dir.display()))?;
    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}
