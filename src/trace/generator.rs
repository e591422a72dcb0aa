//! Synthetic workloads and platforms for scheduling experiments.

use std::collections::BTreeMap;

use rand::Rng;

use crate::config::{PlatformConfig, ResourceBias, WorkloadGeneratorConfig};
use crate::error::{ExperimentError, Result};
use crate::trace::platform::{Host, Topology, MASTER_HOST_ID};
use crate::trace::workload::{Job, Profile, WorkloadSet};

/// Largest resource request drawn under the small-jobs bias.
const SMALL_JOB_MAX_RESOURCE: u32 = 3;

pub struct WorkloadGenerator {
    config: WorkloadGeneratorConfig,
}

impl WorkloadGenerator {
    pub fn new(config: WorkloadGeneratorConfig) -> Self {
        Self { config }
    }

    /// Draws `num_jobs` jobs requesting up to `max_resource` hosts each.
    ///
    /// All randomness comes from `rng`, so a seeded generator gives the same workload every time.
    /// The platform is sized at twice `max_resource`.
    pub fn generate<R: Rng>(
        &self,
        rng: &mut R,
        num_jobs: u32,
        max_resource: u32,
    ) -> Result<WorkloadSet> {
        if num_jobs < 1 {
            return Err(ExperimentError::InvalidArgument(
                "num_jobs must be >= 1".to_string(),
            ));
        }
        if max_resource < 1 {
            return Err(ExperimentError::InvalidArgument(
                "max_resource must be >= 1".to_string(),
            ));
        }
        let walltime_min = self.config.walltime_min;
        let walltime_max = self.config.walltime_max;
        if walltime_min < 1 || walltime_min > walltime_max {
            return Err(ExperimentError::InvalidArgument(format!(
                "bad walltime range [{}, {}]",
                walltime_min, walltime_max
            )));
        }

        let resource_upper = match self.config.resource_bias {
            ResourceBias::Uniform => max_resource,
            ResourceBias::SmallJobs => max_resource.min(SMALL_JOB_MAX_RESOURCE),
        };
        let submission_max = self.config.submission_max();

        let mut workload = WorkloadSet {
            description: format!(
                "{} jobs with varied resource requirements (max {} hosts) and execution times",
                num_jobs, max_resource
            ),
            total_resource_capacity: max_resource * 2,
            jobs: vec![],
            profiles: BTreeMap::new(),
        };
        workload.jobs.reserve(num_jobs as usize);

        for i in 1..=num_jobs {
            let job_id = format!("job{}", i);
            let profile_id = format!("delay{}", i);
            let resource_request = rng.gen_range(1..=resource_upper);
            let walltime = rng.gen_range(walltime_min..=walltime_max);
            // first job at zero so the schedule never starts empty
            let submission_time = if i == 1 {
                0
            } else {
                rng.gen_range(0..=submission_max)
            };

            workload.jobs.push(Job {
                id: job_id,
                profile_id: profile_id.clone(),
                resource_request,
                walltime,
                submission_time,
            });
            workload.profiles.insert(profile_id, Profile::delay(walltime));
        }

        Ok(workload)
    }
}

pub struct TopologyGenerator {
    config: PlatformConfig,
}

impl TopologyGenerator {
    pub fn new(config: PlatformConfig) -> Self {
        Self { config }
    }

    /// Homogeneous compute nodes `node_0..node_{n-1}` plus a slower controller host.
    pub fn generate(&self, machine_count: u32) -> Result<Topology> {
        if machine_count < 1 {
            return Err(ExperimentError::InvalidArgument(
                "machine_count must be >= 1".to_string(),
            ));
        }

        let hosts = (0..machine_count)
            .map(|i| Host {
                id: format!("node_{}", i),
                speed: self.config.node_speed.clone(),
            })
            .collect();

        Ok(Topology {
            machine_count,
            hosts,
            master: Host {
                id: MASTER_HOST_ID.to_string(),
                speed: self.config.master_speed.clone(),
            },
        })
    }
}
