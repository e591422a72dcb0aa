#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use batsim_experiments::batsim::backfill::BackfillRecord;
use batsim_experiments::batsim::runner::{BatsimRunner, SimulationRunner};
use batsim_experiments::config::{PlatformConfig, SimulatorConfig, WorkloadGeneratorConfig};
use batsim_experiments::error::ExperimentError;
use batsim_experiments::trace::generator::{TopologyGenerator, WorkloadGenerator};
use batsim_experiments::trace::platform::Topology;
use batsim_experiments::trace::workload::WorkloadSet;

const SUCCEEDING_SIMULATOR: &str = r#"#!/bin/sh
printf '%s\n' "$*" > args.txt
mkdir -p out
printf 'batsim_version,makespan,mean_waiting_time\n4.2.0,423.5,1.0\n' > out/schedule.csv
printf 'scheduling\n7 2 5\nbye\n' > conservative_backfill_log.txt
echo "simulation done"
"#;

const CRASHING_SIMULATOR: &str = r#"#!/bin/sh
echo "loading platform"
echo "cannot load scheduler library" >&2
exit 3
"#;

const SILENT_SIMULATOR: &str = "#!/bin/sh\nexit 0\n";

fn write_script(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn scenario() -> (WorkloadSet, Topology) {
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let workload = WorkloadGenerator::new(WorkloadGeneratorConfig::default())
        .generate(&mut rng, 5, 3)
        .unwrap();
    let topology = TopologyGenerator::new(PlatformConfig::default())
        .generate(3)
        .unwrap();
    (workload, topology)
}

fn runner(binary: PathBuf, work_dir: &Path) -> BatsimRunner {
    BatsimRunner::new(SimulatorConfig {
        binary,
        library_dir: PathBuf::from("/opt/schedulers"),
        work_dir: work_dir.to_path_buf(),
        ..Default::default()
    })
}

// Single test: a script must not be executed while another one is open for writing.
#[test]
fn test_runner_with_fake_simulator() {
    let dir = tempfile::tempdir().unwrap();
    let scripts = dir.path().join("bin");
    std::fs::create_dir_all(&scripts).unwrap();
    let succeeding = write_script(&scripts, "succeeding.sh", SUCCEEDING_SIMULATOR);
    let crashing = write_script(&scripts, "crashing.sh", CRASHING_SIMULATOR);
    let silent = write_script(&scripts, "silent.sh", SILENT_SIMULATOR);
    let (workload, topology) = scenario();

    // success
    let work_dir = dir.path().join("succeeding");
    let mut batsim = runner(succeeding, &work_dir);
    let output = batsim.run(2, "best_cont", &workload, &topology).unwrap();
    assert_eq!(output.makespan, 423.5);
    assert_eq!(
        output.backfill,
        Some(BackfillRecord {
            total_backfills: 7,
            contiguous_backfills: 2,
            basic_backfills: 5,
        })
    );

    let trial_dir = work_dir.join("trial_2").join("best_cont");
    assert_eq!(
        WorkloadSet::read_from_file(&trial_dir.join("workload.json")).unwrap(),
        workload
    );
    assert!(std::fs::read_to_string(trial_dir.join("platform.xml"))
        .unwrap()
        .contains("master_host"));
    assert_eq!(
        std::fs::read_to_string(trial_dir.join("simulator.log")).unwrap(),
        "simulation done\n"
    );
    let args = std::fs::read_to_string(trial_dir.join("args.txt")).unwrap();
    assert!(args.starts_with("-l /opt/schedulers/libbest_cont.so 0  -p "));
    assert!(args.contains(&format!("-w {}", trial_dir.join("workload.json").display())));

    // a rerun of the same trial that writes nothing does not see the earlier results
    let mut batsim = runner(silent.clone(), &work_dir);
    assert!(matches!(
        batsim.run(2, "best_cont", &workload, &topology),
        Err(ExperimentError::MissingInput(_))
    ));
    assert!(!trial_dir.join("out").join("schedule.csv").exists());
    assert!(!trial_dir.join("conservative_backfill_log.txt").exists());
    assert!(trial_dir.join("workload.json").exists());

    // algorithm names cannot leave the work directory
    assert!(matches!(
        batsim.run(1, "../escape", &workload, &topology),
        Err(ExperimentError::InvalidArgument(_))
    ));
    assert!(!dir.path().join("escape").exists());

    // non-zero exit
    let mut batsim = runner(crashing, &dir.path().join("crashing"));
    match batsim.run(1, "basic", &workload, &topology) {
        Err(ExperimentError::ExternalProcessFailure {
            algorithm,
            status,
            diagnostics,
        }) => {
            assert_eq!(algorithm, "basic");
            assert_eq!(status, Some(3));
            assert_eq!(diagnostics, "cannot load scheduler library");
        }
        other => panic!("unexpected result {:?}", other),
    }

    // exits cleanly without writing results
    let mut batsim = runner(silent, &dir.path().join("silent"));
    assert!(matches!(
        batsim.run(1, "basic", &workload, &topology),
        Err(ExperimentError::MissingInput(_))
    ));

    // binary cannot be launched
    let mut batsim = runner(dir.path().join("no_such_simulator"), &dir.path().join("missing"));
    assert!(matches!(
        batsim.run(1, "basic", &workload, &topology),
        Err(ExperimentError::ExternalProcessFailure { status: None, .. })
    ));
}
