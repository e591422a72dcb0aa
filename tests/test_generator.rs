use std::collections::BTreeSet;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use batsim_experiments::config::{PlatformConfig, ResourceBias, WorkloadGeneratorConfig};
use batsim_experiments::error::ExperimentError;
use batsim_experiments::trace::generator::{TopologyGenerator, WorkloadGenerator};
use batsim_experiments::trace::platform::MASTER_HOST_ID;
use batsim_experiments::trace::workload::WorkloadSet;

fn generate(seed: u64, num_jobs: u32, max_resource: u32) -> WorkloadSet {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    WorkloadGenerator::new(WorkloadGeneratorConfig::default())
        .generate(&mut rng, num_jobs, max_resource)
        .unwrap()
}

#[test]
fn test_generated_workload_properties() {
    for (seed, num_jobs, max_resource) in [(1, 1, 1), (2, 5, 3), (3, 64, 7), (4, 300, 1)] {
        let workload = generate(seed, num_jobs, max_resource);

        assert_eq!(workload.jobs.len(), num_jobs as usize);
        assert_eq!(workload.total_resource_capacity, 2 * max_resource);
        assert_eq!(workload.jobs[0].submission_time, 0);

        let ids: BTreeSet<&str> = workload.jobs.iter().map(|job| job.id.as_str()).collect();
        let profile_ids: BTreeSet<&str> = workload
            .jobs
            .iter()
            .map(|job| job.profile_id.as_str())
            .collect();
        assert_eq!(ids.len(), workload.jobs.len());
        assert_eq!(profile_ids.len(), workload.jobs.len());

        for job in workload.jobs.iter() {
            assert!(job.resource_request >= 1 && job.resource_request <= max_resource);
            assert!(job.walltime >= 5 && job.walltime <= 30);
            assert!(job.submission_time <= 100);
            let profile = &workload.profiles[&job.profile_id];
            assert_eq!(profile.duration, job.walltime);
        }
        assert!(workload.validate().is_ok());
    }
}

#[test]
fn test_same_seed_gives_same_workload() {
    let first = generate(42, 5, 3);
    let second = generate(42, 5, 3);
    assert_eq!(first, second);

    let other_seed = generate(43, 5, 3);
    assert_ne!(first.jobs, other_seed.jobs);
}

#[test]
fn test_small_jobs_bias() {
    let generator = WorkloadGenerator::new(WorkloadGeneratorConfig {
        resource_bias: ResourceBias::SmallJobs,
        ..Default::default()
    });
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let workload = generator.generate(&mut rng, 200, 16).unwrap();

    assert_eq!(workload.total_resource_capacity, 32);
    assert!(workload.jobs.iter().all(|job| job.resource_request <= 3));
    assert!(workload.jobs.iter().all(|job| job.submission_time <= 10));
}

#[test]
fn test_zero_counts_rejected() {
    let generator = WorkloadGenerator::new(WorkloadGeneratorConfig::default());
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    assert!(matches!(
        generator.generate(&mut rng, 0, 3),
        Err(ExperimentError::InvalidArgument(_))
    ));
    assert!(matches!(
        generator.generate(&mut rng, 3, 0),
        Err(ExperimentError::InvalidArgument(_))
    ));
    assert!(matches!(
        TopologyGenerator::new(PlatformConfig::default()).generate(0),
        Err(ExperimentError::InvalidArgument(_))
    ));
}

#[test]
fn test_topology_ids_are_unique() {
    let generator = TopologyGenerator::new(PlatformConfig::default());
    for machine_count in [1, 2, 5, 100] {
        let topology = generator.generate(machine_count).unwrap();
        assert_eq!(topology.machine_count, machine_count);
        assert_eq!(topology.hosts.len(), machine_count as usize);
        assert_eq!(topology.master.id, MASTER_HOST_ID);

        let ids: BTreeSet<&str> = topology.host_ids().collect();
        assert_eq!(ids.len(), machine_count as usize + 1);
        assert_eq!(topology, generator.generate(machine_count).unwrap());
    }
}

#[test]
fn test_workload_file_format() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("workload.json");

    let workload = generate(11, 4, 2);
    workload.write_to_file(&path).unwrap();

    let document: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(document["nb_res"], 4);
    assert_eq!(document["jobs"][0]["id"], "job1");
    assert_eq!(document["jobs"][0]["profile"], "delay1");
    assert_eq!(document["jobs"][0]["subtime"], 0);
    assert_eq!(document["profiles"]["delay1"]["type"], "delay");
    assert_eq!(
        document["profiles"]["delay1"]["delay"],
        document["jobs"][0]["walltime"]
    );

    assert_eq!(WorkloadSet::read_from_file(&path).unwrap(), workload);
}
