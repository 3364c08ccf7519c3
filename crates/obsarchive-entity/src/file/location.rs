//! Storage locations referenced by `data_files.location`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An object storage location known to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageLocation {
    /// Acacia, ingest project.
    AcaciaMwaingest,
    /// Banksia.
    Banksia,
    /// Acacia, main project.
    AcaciaMwa,
}

impl StorageLocation {
    /// Catalog location number.
    pub fn id(&self) -> i32 {
        match self {
            Self::AcaciaMwaingest => 2,
            Self::Banksia => 3,
            Self::AcaciaMwa => 4,
        }
    }

    /// Look up a location by catalog number.
    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            2 => Some(Self::AcaciaMwaingest),
            3 => Some(Self::Banksia),
            4 => Some(Self::AcaciaMwa),
            _ => None,
        }
    }

    /// Configuration section name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AcaciaMwaingest => "acacia_mwaingest",
            Self::Banksia => "banksia",
            Self::AcaciaMwa => "acacia_mwa",
        }
    }

    /// Acacia shares its backend with live ingest, so bulk deletes there
    /// are paced.
    pub fn is_ingest_sensitive(&self) -> bool {
        matches!(self, Self::AcaciaMwaingest | Self::AcaciaMwa)
    }
}

impl FromStr for StorageLocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "acacia_mwaingest" => Ok(Self::AcaciaMwaingest),
            "banksia" => Ok(Self::Banksia),
            "acacia_mwa" => Ok(Self::AcaciaMwa),
            other => Err(format!("Unknown storage location: {other}")),
        }
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_and_names_agree() {
        for loc in [
            StorageLocation::AcaciaMwaingest,
            StorageLocation::Banksia,
            StorageLocation::AcaciaMwa,
        ] {
            assert_eq!(StorageLocation::from_id(loc.id()), Some(loc));
            assert_eq!(loc.name().parse::<StorageLocation>(), Ok(loc));
        }
        assert_eq!(StorageLocation::from_id(1), None);
    }

    #[test]
    fn banksia_is_not_paced() {
        assert!(!StorageLocation::Banksia.is_ingest_sensitive());
        assert!(StorageLocation::AcaciaMwa.is_ingest_sensitive());
    }
}
