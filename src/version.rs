//! Driver version classification
//!
//! Maps the `--driverVersion` value onto the controller topology that has to
//! be retired before the new controller may start.

use crate::error::Error;

/// Only release that retires the Deployment flavour
const VPC_BLOCK_51: f64 = 5.1;

/// First release of the other controller topology
const VPC_BLOCK_52: f64 = 5.2;

/// Result of classifying a driver version
#[derive(Debug, Clone, PartialEq)]
pub enum VersionSelector {
    /// Version 5.1 is starting: remove any leftover Deployment
    LegacyDeployment,
    /// Version 5.2 or later is starting: remove any leftover StatefulSet
    LegacyStatefulSet,
    /// The version does not map to a known topology
    Invalid(InvalidVersion),
}

/// Why a version was rejected
#[derive(Debug, Clone, PartialEq)]
pub enum InvalidVersion {
    /// Not a finite number
    Unparsable { value: String, reason: String },
    /// A number outside the supported releases
    Unsupported(String),
}

impl VersionSelector {
    /// Classify a raw version string
    pub fn classify(raw: &str) -> Self {
        let value = raw.trim();
        let version = match value.parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            Ok(_) => {
                return VersionSelector::Invalid(InvalidVersion::Unparsable {
                    value: value.to_string(),
                    reason: "not a finite number".to_string(),
                })
            }
            Err(e) => {
                return VersionSelector::Invalid(InvalidVersion::Unparsable {
                    value: value.to_string(),
                    reason: e.to_string(),
                })
            }
        };

        if version == VPC_BLOCK_51 {
            VersionSelector::LegacyDeployment
        } else if version >= VPC_BLOCK_52 {
            VersionSelector::LegacyStatefulSet
        } else {
            VersionSelector::Invalid(InvalidVersion::Unsupported(value.to_string()))
        }
    }
}

impl From<InvalidVersion> for Error {
    fn from(invalid: InvalidVersion) -> Self {
        match invalid {
            InvalidVersion::Unparsable { value, reason } => Error::VersionParse { value, reason },
            InvalidVersion::Unsupported(value) => Error::InvalidVersion(value),
        }
    }
}
