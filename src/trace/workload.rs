//! Batsim workload format: jobs plus the delay profiles they reference.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ExperimentError, Result};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct Job {
    pub id: String,
    #[serde(rename = "profile")]
    pub profile_id: String,
    /// Number of hosts requested.
    #[serde(rename = "res")]
    pub resource_request: u32,
    pub walltime: u64,
    #[serde(rename = "subtime")]
    pub submission_time: u64,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Copy)]
pub enum ProfileKind {
    #[serde(rename = "delay")]
    Delay,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct Profile {
    /// Execution time of the job in seconds.
    #[serde(rename = "delay")]
    pub duration: u64,
    #[serde(rename = "type")]
    pub kind: ProfileKind,
}

impl Profile {
    pub fn delay(duration: u64) -> Self {
        Self {
            duration,
            kind: ProfileKind::Delay,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct WorkloadSet {
    pub description: String,
    /// Platform size the simulator should expose to the scheduler.
    #[serde(rename = "nb_res")]
    pub total_resource_capacity: u32,
    pub jobs: Vec<Job>,
    pub profiles: BTreeMap<String, Profile>,
}

impl WorkloadSet {
    pub fn max_resource_request(&self) -> u32 {
        self.jobs
            .iter()
            .map(|job| job.resource_request)
            .max()
            .unwrap_or(0)
    }

    /// Checks that job ids are unique, every profile resolves and the capacity fits every job.
    pub fn validate(&self) -> Result<()> {
        let mut ids: HashSet<&str> = Default::default();
        for job in self.jobs.iter() {
            if !ids.insert(&job.id) {
                return Err(ExperimentError::InvalidArgument(format!(
                    "duplicated job id: {}",
                    job.id
                )));
            }
            if !self.profiles.contains_key(&job.profile_id) {
                return Err(ExperimentError::InvalidArgument(format!(
                    "job {} references unknown profile {}",
                    job.id, job.profile_id
                )));
            }
        }
        if self.total_resource_capacity < self.max_resource_request() {
            return Err(ExperimentError::InvalidArgument(format!(
                "platform capacity {} is below the largest request {}",
                self.total_resource_capacity,
                self.max_resource_request()
            )));
        }
        Ok(())
    }

    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        std::fs::write(path, serialized)?;
        Ok(())
    }

    pub fn read_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ExperimentError::MissingInput(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let workload: WorkloadSet = serde_json::from_str(&content)?;
        workload.validate()?;
        Ok(workload)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{Job, Profile, ProfileKind, WorkloadSet};

    fn make_workload() -> WorkloadSet {
        WorkloadSet {
            description: "two jobs".to_string(),
            total_resource_capacity: 4,
            jobs: vec![
                Job {
                    id: "job1".to_string(),
                    profile_id: "delay1".to_string(),
                    resource_request: 2,
                    walltime: 10,
                    submission_time: 0,
                },
                Job {
                    id: "job2".to_string(),
                    profile_id: "delay2".to_string(),
                    resource_request: 1,
                    walltime: 7,
                    submission_time: 3,
                },
            ],
            profiles: BTreeMap::from([
                ("delay1".to_string(), Profile::delay(10)),
                ("delay2".to_string(), Profile::delay(7)),
            ]),
        }
    }

    #[test]
    fn test_serialized_field_names() {
        let value = serde_json::to_value(make_workload()).unwrap();

        assert_eq!(value["nb_res"], 4);
        assert_eq!(value["jobs"][1]["id"], "job2");
        assert_eq!(value["jobs"][1]["profile"], "delay2");
        assert_eq!(value["jobs"][1]["res"], 1);
        assert_eq!(value["jobs"][1]["walltime"], 7);
        assert_eq!(value["jobs"][1]["subtime"], 3);
        assert_eq!(value["profiles"]["delay1"]["delay"], 10);
        assert_eq!(value["profiles"]["delay1"]["type"], "delay");
    }

    #[test]
    fn test_parse_batsim_workload() {
        let workload: WorkloadSet = serde_json::from_str(
            r#"{
              "description": "handwritten",
              "nb_res": 6,
              "jobs": [{"id": "job1", "profile": "delay1", "res": 3, "walltime": 12, "subtime": 0}],
              "profiles": {"delay1": {"delay": 12, "type": "delay"}}
            }"#,
        )
        .unwrap();

        assert_eq!(workload.jobs[0].resource_request, 3);
        assert_eq!(workload.profiles["delay1"].kind, ProfileKind::Delay);
        workload.validate().unwrap();
    }

    #[test]
    fn test_validate_detects_dangling_profile() {
        let mut workload = make_workload();
        workload.jobs[1].profile_id = "delay42".to_string();
        assert!(workload.validate().is_err());
    }

    #[test]
    fn test_validate_detects_duplicated_ids() {
        let mut workload = make_workload();
        workload.jobs[1].id = "job1".to_string();
        assert!(workload.validate().is_err());
    }

    #[test]
    fn test_validate_detects_small_capacity() {
        let mut workload = make_workload();
        workload.total_resource_capacity = 1;
        assert!(workload.validate().is_err());
    }
}
