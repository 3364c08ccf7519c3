//! What a delete run will touch.

use std::collections::{BTreeMap, BTreeSet};

use obsarchive_core::types::{DeleteRequestId, ObsId};
use obsarchive_entity::file::DataFile;

/// Keys awaiting physical deletion and the observations each request
/// touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletePlan {
    /// location → bucket → deduplicated keys.
    pub files: BTreeMap<i32, BTreeMap<String, BTreeSet<String>>>,
    /// request → every observation it touched, including ones with no
    /// remaining files.
    pub delete_requests: BTreeMap<DeleteRequestId, Vec<ObsId>>,
}

impl DeletePlan {
    /// Record that `request` touched `obs`.
    pub fn add_observation(&mut self, request: DeleteRequestId, obs: ObsId) {
        let observations = self.delete_requests.entry(request).or_default();
        if !observations.contains(&obs) {
            observations.push(obs);
        }
    }

    /// Queue a file's key for deletion.
    pub fn add_file(&mut self, file: &DataFile) {
        self.files
            .entry(file.location)
            .or_default()
            .entry(file.bucket.clone())
            .or_default()
            .insert(file.key.clone());
    }

    /// Number of distinct keys across all locations and buckets.
    pub fn key_count(&self) -> usize {
        self.files
            .values()
            .flat_map(|buckets| buckets.values())
            .map(BTreeSet::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.delete_requests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_deduplicated_per_bucket() {
        let mut plan = DeletePlan::default();
        let a = DataFile::new(ObsId(1_000_000_000), "1000000000_a.fits", 3, "b1", None);
        let b = DataFile::new(ObsId(1_000_000_000), "1000000000_b.fits", 3, "b2", None);
        plan.add_file(&a);
        plan.add_file(&a);
        plan.add_file(&b);
        plan.add_observation(DeleteRequestId(1), ObsId(1_000_000_000));
        plan.add_observation(DeleteRequestId(1), ObsId(1_000_000_000));

        assert_eq!(plan.key_count(), 2);
        assert_eq!(plan.files[&3].len(), 2);
        assert_eq!(plan.delete_requests[&DeleteRequestId(1)].len(), 1);
    }
}
