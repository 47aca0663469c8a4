//! Provisioning definitions for the JAN lookup service.
//!
//! Every stack is plain data: a set of typed resources with explicit
//! cross-stack dependencies, rendered to CloudFormation template JSON.
//! Converging those templates is left to the provider's control plane.

pub mod api;
pub mod database;
pub mod deployment;
pub mod error;
pub mod frontend;
pub mod naming;
pub mod network;
pub mod template;

pub use api::LambdaArtifact;
pub use deployment::Deployment;
pub use error::InfraError;
