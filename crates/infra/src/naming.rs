//! Stage-scoped naming shared by every stack.
//!
//! Parallel deployments never collide because every physical name, stack
//! name, and export name carries the stage suffix.

use bronzedraw_core::stage::Stage;

pub const PROJECT: &str = "bronzedraw";

/// Region every stack is deployed to.
pub const REGION: &str = "ap-northeast-1";

/// Physical resource name, e.g. `bronzedraw-vpc-dev`.
pub fn resource_name(thing: &str, stage: Stage) -> String {
    format!("{PROJECT}-{thing}-{stage}")
}

/// Stack name, e.g. `BronzedrawNetworkStack-dev`.
pub fn stack_name(kind: &str, stage: Stage) -> String {
    format!("Bronzedraw{kind}Stack-{stage}")
}

/// Cross-stack export name, e.g. `BronzedrawVpcId-dev`.
pub fn export_name(output: &str, stage: Stage) -> String {
    format!("Bronzedraw{output}-{stage}")
}

pub fn stack_description(kind: &str, stage: Stage) -> String {
    format!("Bronzedraw {kind} Stack for {stage} environment")
}
