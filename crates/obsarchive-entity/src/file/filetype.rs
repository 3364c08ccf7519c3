//! Catalog file type codes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Value of `data_files.filetype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileType {
    /// Legacy correlator visibilities.
    Gpubox,
    /// RFI flag archive.
    Flag,
    /// Raw legacy VCS voltages.
    VoltageRaw,
    /// Per-observation metadata (PPD) file. Never bulk deleted.
    Ppd,
    /// Incoherent-sum voltages.
    VoltageIcs,
    /// Recombined voltage archive.
    VoltageRecombinedArchive,
    /// MWAX voltages.
    MwaxVoltages,
    /// MWAX visibilities.
    MwaxVisibilities,
}

impl FileType {
    /// Every known file type.
    pub const ALL: [FileType; 8] = [
        Self::Gpubox,
        Self::Flag,
        Self::VoltageRaw,
        Self::Ppd,
        Self::VoltageIcs,
        Self::VoltageRecombinedArchive,
        Self::MwaxVoltages,
        Self::MwaxVisibilities,
    ];

    /// Catalog code.
    pub fn id(&self) -> i32 {
        match self {
            Self::Gpubox => 8,
            Self::Flag => 10,
            Self::VoltageRaw => 11,
            Self::Ppd => 14,
            Self::VoltageIcs => 15,
            Self::VoltageRecombinedArchive => 16,
            Self::MwaxVoltages => 17,
            Self::MwaxVisibilities => 18,
        }
    }

    /// Whether bulk deletion may remove files of this type.
    pub fn is_bulk_deletable(&self) -> bool {
        !matches!(self, Self::Ppd)
    }

    /// Return the type as an uppercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gpubox => "GPUBOX",
            Self::Flag => "FLAG",
            Self::VoltageRaw => "VOLTAGE_RAW",
            Self::Ppd => "PPD",
            Self::VoltageIcs => "VOLTAGE_ICS",
            Self::VoltageRecombinedArchive => "VOLTAGE_RECOMBINED_ARCHIVE",
            Self::MwaxVoltages => "MWAX_VOLTAGES",
            Self::MwaxVisibilities => "MWAX_VISIBILITIES",
        }
    }
}

impl TryFrom<i32> for FileType {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|t| t.id() == value)
            .ok_or(value)
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for t in FileType::ALL {
            assert_eq!(FileType::try_from(t.id()), Ok(t));
        }
        assert_eq!(FileType::try_from(99), Err(99));
    }

    #[test]
    fn only_ppd_is_protected() {
        assert!(!FileType::Ppd.is_bulk_deletable());
        assert_eq!(
            FileType::ALL.iter().filter(|t| !t.is_bulk_deletable()).count(),
            1
        );
    }
}
