//! Delete request row model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use obsarchive_core::types::DeleteRequestId;

use crate::file::FileType;

/// A user-approved request to purge observations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct DeleteRequest {
    /// Request id.
    pub id: DeleteRequestId,
    /// When set, only files of this type are removed and the observations
    /// themselves stay.
    pub filetype_id: Option<i32>,
    /// When the request was created. Requests are processed in this order.
    pub created_datetime: DateTime<Utc>,
    /// When the request was approved.
    pub approved_datetime: Option<DateTime<Utc>>,
    /// When the request was cancelled.
    pub cancelled_datetime: Option<DateTime<Utc>>,
    /// When the request was fully carried out.
    pub actioned_datetime: Option<DateTime<Utc>>,
}

impl DeleteRequest {
    /// Approved, not cancelled, not yet actioned.
    pub fn is_eligible(&self) -> bool {
        self.approved_datetime.is_some()
            && self.cancelled_datetime.is_none()
            && self.actioned_datetime.is_none()
    }

    /// Which files of each observation this request covers.
    pub fn scope(&self) -> FileScope {
        FileScope::from_filetype_id(self.filetype_id)
    }
}

/// The file selection a delete request applies to each observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileScope {
    /// Every file except PPD metadata; the observation is marked deleted
    /// once none remain.
    WholeObservation,
    /// Only files with this type code; the observation is left in place.
    FileType(i32),
}

impl FileScope {
    /// Scope for a request's optional `filetype_id`.
    pub fn from_filetype_id(filetype_id: Option<i32>) -> Self {
        match filetype_id {
            Some(id) => Self::FileType(id),
            None => Self::WholeObservation,
        }
    }

    /// Whether a file of type `filetype` falls inside this scope.
    pub fn includes(&self, filetype: i32) -> bool {
        match self {
            Self::WholeObservation => filetype != FileType::Ppd.id(),
            Self::FileType(id) => filetype == *id,
        }
    }

    /// Whether an emptied observation should itself be marked deleted.
    pub fn deletes_observation(&self) -> bool {
        matches!(self, Self::WholeObservation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_observation_excludes_ppd() {
        let scope = FileScope::from_filetype_id(None);
        assert!(scope.includes(FileType::MwaxVisibilities.id()));
        assert!(!scope.includes(FileType::Ppd.id()));
        assert!(scope.deletes_observation());
    }

    #[test]
    fn filetype_scope_selects_one_type() {
        let scope = FileScope::from_filetype_id(Some(FileType::MwaxVoltages.id()));
        assert!(scope.includes(17));
        assert!(!scope.includes(18));
        assert!(!scope.deletes_observation());
    }

    #[test]
    fn eligibility() {
        let mut req = DeleteRequest {
            id: DeleteRequestId(1),
            filetype_id: None,
            created_datetime: Utc::now(),
            approved_datetime: Some(Utc::now()),
            cancelled_datetime: None,
            actioned_datetime: None,
        };
        assert!(req.is_eligible());
        req.cancelled_datetime = Some(Utc::now());
        assert!(!req.is_eligible());
    }
}
