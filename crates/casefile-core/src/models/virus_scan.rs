use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Antivirus verdict read from the scan tag of a staged object.
///
/// The scanner's value set is open-ended; unknown values are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VirusScanVerdict {
    Clean,
    Infected,
    InfectedAllowed,
    Unscannable,
    Error,
    Other(String),
}

impl VirusScanVerdict {
    pub fn is_clean(&self) -> bool {
        matches!(self, VirusScanVerdict::Clean)
    }

    /// Malicious content was found, whether or not the scanner policy allowed it.
    pub fn is_infected(&self) -> bool {
        matches!(
            self,
            VirusScanVerdict::Infected | VirusScanVerdict::InfectedAllowed
        )
    }
}

impl FromStr for VirusScanVerdict {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "Clean" => VirusScanVerdict::Clean,
            "Infected" => VirusScanVerdict::Infected,
            "InfectedAllowed" => VirusScanVerdict::InfectedAllowed,
            "Unscannable" => VirusScanVerdict::Unscannable,
            "Error" => VirusScanVerdict::Error,
            other => VirusScanVerdict::Other(other.to_string()),
        })
    }
}

impl Display for VirusScanVerdict {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            VirusScanVerdict::Clean => write!(f, "Clean"),
            VirusScanVerdict::Infected => write!(f, "Infected"),
            VirusScanVerdict::InfectedAllowed => write!(f, "InfectedAllowed"),
            VirusScanVerdict::Unscannable => write!(f, "Unscannable"),
            VirusScanVerdict::Error => write!(f, "Error"),
            VirusScanVerdict::Other(value) => write!(f, "{}", value),
        }
    }
}
