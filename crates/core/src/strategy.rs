//! Duration estimation strategies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the next step's duration is predicted from completed steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimateStrategy {
    /// Use the most recently completed step's duration
    #[default]
    Recent,
    /// Use the mean of every completed step's duration
    Average,
}

impl fmt::Display for EstimateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EstimateStrategy::Recent => write!(f, "recent"),
            EstimateStrategy::Average => write!(f, "average"),
        }
    }
}

impl FromStr for EstimateStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "recent" => Ok(EstimateStrategy::Recent),
            "average" | "avg" => Ok(EstimateStrategy::Average),
            other => Err(format!("unknown estimate strategy '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_recent() {
        assert_eq!(EstimateStrategy::default(), EstimateStrategy::Recent);
    }

    #[test]
    fn test_parse() {
        assert_eq!("Recent".parse::<EstimateStrategy>(), Ok(EstimateStrategy::Recent));
        assert_eq!("avg".parse::<EstimateStrategy>(), Ok(EstimateStrategy::Average));
        assert!("median".parse::<EstimateStrategy>().is_err());
        assert_eq!(EstimateStrategy::Average.to_string(), "average");
    }
}
