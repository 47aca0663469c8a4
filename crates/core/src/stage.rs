//! Deployment stage used for resource naming and environment-conditional
//! policy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A named deployment environment. Parallel deployments are kept apart
/// by suffixing every resource name with the stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Dev,
    Stg,
    Prod,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Dev, Stage::Stg, Stage::Prod];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Dev => "dev",
            Stage::Stg => "stg",
            Stage::Prod => "prod",
        }
    }

    /// Production keeps backups and blocks deletion; every other stage is
    /// disposable.
    pub fn is_production(self) -> bool {
        matches!(self, Stage::Prod)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "dev" => Ok(Stage::Dev),
            "stg" => Ok(Stage::Stg),
            "prod" => Ok(Stage::Prod),
            other => Err(CoreError::Validation(format!(
                "Unknown stage '{other}', expected one of: dev, stg, prod"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_display() {
        for stage in Stage::ALL {
            assert_eq!(stage.to_string().parse::<Stage>().unwrap(), stage);
        }
    }

    #[test]
    fn only_prod_is_production() {
        assert!(Stage::Prod.is_production());
        assert!(!Stage::Dev.is_production());
        assert!(!Stage::Stg.is_production());
    }

    #[test]
    fn unknown_stage_rejected() {
        assert!("staging".parse::<Stage>().is_err());
        assert!("".parse::<Stage>().is_err());
        assert!("PROD".parse::<Stage>().is_err());
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Stage::Stg).unwrap(), "\"stg\"");
    }
}
