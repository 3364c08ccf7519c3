//! Data quality codes and observing modes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Value of `mwa_setting.dataquality`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataQuality {
    /// No known problems.
    Good,
    /// Usable with caveats.
    SomeIssues,
    /// Not usable.
    Unusable,
    /// Deleted from the archive.
    Deleted,
    /// Queued for deletion.
    MarkedForDelete,
    /// Processed into a derived product.
    Processed,
}

impl DataQuality {
    /// Catalog code.
    pub fn id(&self) -> i32 {
        match self {
            Self::Good => 1,
            Self::SomeIssues => 2,
            Self::Unusable => 3,
            Self::Deleted => 4,
            Self::MarkedForDelete => 5,
            Self::Processed => 6,
        }
    }
}

impl TryFrom<i32> for DataQuality {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Good),
            2 => Ok(Self::SomeIssues),
            3 => Ok(Self::Unusable),
            4 => Ok(Self::Deleted),
            5 => Ok(Self::MarkedForDelete),
            6 => Ok(Self::Processed),
            other => Err(other),
        }
    }
}

/// Value of `mwa_setting.mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObservationMode {
    /// Correlator observation.
    #[serde(rename = "HW_LFILES")]
    HwLfiles,
    /// Voltage capture.
    #[serde(rename = "VOLTAGE_START")]
    VoltageStart,
    /// Voltage buffer dump.
    #[serde(rename = "VOLTAGE_BUFFER")]
    VoltageBuffer,
}

impl ObservationMode {
    /// Return the mode as stored in the catalog.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HwLfiles => "HW_LFILES",
            Self::VoltageStart => "VOLTAGE_START",
            Self::VoltageBuffer => "VOLTAGE_BUFFER",
        }
    }
}

impl FromStr for ObservationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HW_LFILES" => Ok(Self::HwLfiles),
            "VOLTAGE_START" => Ok(Self::VoltageStart),
            "VOLTAGE_BUFFER" => Ok(Self::VoltageBuffer),
            other => Err(format!("Unknown observation mode: {other}")),
        }
    }
}

impl fmt::Display for ObservationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
