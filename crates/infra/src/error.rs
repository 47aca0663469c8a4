use std::path::PathBuf;

/// Errors raised while assembling or writing provisioning definitions.
#[derive(Debug, thiserror::Error)]
pub enum InfraError {
    #[error("Invalid CIDR block '{cidr}': {reason}")]
    InvalidCidr { cidr: String, reason: String },

    #[error("Invalid {stack} configuration: {reason}")]
    InvalidConfig { stack: &'static str, reason: String },

    #[error("Stack '{0}' is defined more than once")]
    DuplicateStack(String),

    #[error("Stack '{stack}' defines logical id '{logical_id}' more than once")]
    DuplicateLogicalId { stack: String, logical_id: String },

    #[error("Stack '{stack}' references undefined logical id '{target}'")]
    DanglingReference { stack: String, target: String },

    #[error("Export '{0}' is declared by more than one stack")]
    DuplicateExport(String),

    #[error("Stack '{stack}' depends on unknown stack '{dependency}'")]
    UnknownDependency { stack: String, dependency: String },

    #[error("Dependency cycle between stacks: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    #[error("Stack '{stack}' imports '{export}', which none of its dependencies export")]
    UnresolvedImport { stack: String, export: String },

    #[error("Failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialise template: {0}")]
    Serialize(#[from] serde_json::Error),
}
