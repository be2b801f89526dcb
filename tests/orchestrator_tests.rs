//! Process orchestrator: bounded parallelism, failure isolation, timeouts,
//! cancellation and console capture, against shell-script samplers.

#![cfg(unix)]

mod common;

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use common::{sampler_body, write_script, SharedBuf};
use drawbridge::exec::ExecError;
use drawbridge::{ChainInvocation, ChainStatus, Orchestrator, RunId, SamplerArgs, SessionConfig};

const HEADER: &str = "lp__,accept_stat__,mu";
const ROW: &str = "-$i,0.9,$id.$i";

fn config(dir: &Path) -> SessionConfig {
    SessionConfig {
        output_dir: dir.join("out"),
        max_parallel_chains: 4,
        ..SessionConfig::default()
    }
}

fn invocations(script: &Path, cfg: &SessionConfig, chains: usize) -> Vec<ChainInvocation> {
    SamplerArgs {
        seed: Some(7),
        ..SamplerArgs::default()
    }
    .invocations(script, "mock", None, chains, &cfg.output_dir, RunId::new())
    .unwrap()
}

#[test]
fn test_all_chains_succeed_and_capture_output() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "ok.sh", &sampler_body(HEADER, 5, ROW, ""));
    let cfg = config(dir.path());

    let invs = invocations(&script, &cfg, 4);
    let seeds: Vec<u32> = invs.iter().map(|i| i.seed).collect();
    assert_eq!(seeds, vec![7, 8, 9, 10]);

    let results = Orchestrator::new(&cfg).run(invs).unwrap();
    assert_eq!(results.len(), 4);
    for (i, r) in results.iter().enumerate() {
        assert_eq!(r.chain_id.get(), i as u64 + 1);
        assert_eq!(r.status, ChainStatus::Succeeded);
        assert_eq!(r.exit_code, Some(0));
        assert!(r.stdout.contains(&format!("chain {} done", i + 1)), "{}", r.stdout);
        assert!(r.output_file.is_file());
        let text = fs::read_to_string(&r.output_file).unwrap();
        assert!(text.contains(&format!("# id = {}", i + 1)));
    }
}

#[test]
fn test_parallelism_is_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let running = dir.path().join("running");
    fs::create_dir(&running).unwrap();
    let peaks = dir.path().join("peaks");
    let before = format!(
        r#"touch "{r}/$id"
n=$(ls "{r}" | wc -l)
echo $n >> "{p}"
sleep 0.3
rm "{r}/$id""#,
        r = running.display(),
        p = peaks.display(),
    );
    let script = write_script(dir.path(), "slow.sh", &sampler_body(HEADER, 2, ROW, &before));
    let cfg = SessionConfig {
        max_parallel_chains: 2,
        ..config(dir.path())
    };

    let started = Instant::now();
    let results = Orchestrator::new(&cfg).run(invocations(&script, &cfg, 6)).unwrap();
    assert_eq!(results.len(), 6);
    // three waves of 0.3s each
    assert!(started.elapsed() >= Duration::from_millis(850));

    let observed: Vec<usize> = fs::read_to_string(&peaks)
        .unwrap()
        .lines()
        .map(|l| l.trim().parse().unwrap())
        .collect();
    assert_eq!(observed.len(), 6);
    assert!(observed.iter().all(|&n| n <= 2), "{observed:?}");
}

#[test]
fn test_one_failure_does_not_stop_siblings() {
    let dir = tempfile::tempdir().unwrap();
    let before = r#"if [ "$id" = "2" ]; then
  echo "Rejecting initial value" >&2
  echo "Initialization failed for chain 2" >&2
  exit 3
fi"#;
    let script = write_script(dir.path(), "flaky.sh", &sampler_body(HEADER, 5, ROW, before));
    let cfg = config(dir.path());

    let err = Orchestrator::new(&cfg).run(invocations(&script, &cfg, 4)).unwrap_err();
    let ExecError::ChainFailure(report) = err else {
        panic!("expected a chain failure, got {err}");
    };
    assert_eq!(report.failed_ids(), vec![2]);
    assert_eq!(report.succeeded.len(), 3);
    let failed = &report.failed[0];
    assert_eq!(failed.status, ChainStatus::Failed { exit_code: Some(3) });
    assert!(failed.stderr.contains("Rejecting initial value"));
    assert_eq!(failed.last_message(), Some("Initialization failed for chain 2"));
    assert!(report.to_string().contains("chain 2"));
    for ok in &report.succeeded {
        assert!(ok.output_file.is_file());
    }
}

#[test]
fn test_timeout_kills_chain() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "hang.sh", "exec sleep 30\n");
    let cfg = SessionConfig {
        chain_timeout_ms: Some(300),
        ..config(dir.path())
    };

    let started = Instant::now();
    let err = Orchestrator::new(&cfg).run(invocations(&script, &cfg, 2)).unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(10));
    let ExecError::ChainFailure(report) = err else {
        panic!("expected a chain failure, got {err}");
    };
    assert_eq!(report.failed.len(), 2);
    for r in &report.failed {
        assert!(matches!(r.status, ChainStatus::TimedOut { after } if after == Duration::from_millis(300)));
    }
}

#[test]
fn test_cancel_kills_running_and_queued_chains() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "hang.sh", "exec sleep 30\n");
    let cfg = SessionConfig {
        max_parallel_chains: 2,
        ..config(dir.path())
    };
    let orchestrator = Orchestrator::new(&cfg);
    let handle = orchestrator.cancel_handle();
    let canceller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(300));
        handle.cancel();
    });

    let started = Instant::now();
    let err = orchestrator.run(invocations(&script, &cfg, 4)).unwrap_err();
    canceller.join().unwrap();
    assert!(started.elapsed() < Duration::from_secs(10));

    let ExecError::Cancelled { results } = err else {
        panic!("expected cancellation, got {err}");
    };
    assert_eq!(results.len(), 4);
    assert!(results.iter().all(|r| r.status == ChainStatus::Cancelled));

    // the handle does not stay tripped for the next run
    let ok = write_script(dir.path(), "ok.sh", &sampler_body(HEADER, 3, ROW, ""));
    let results = orchestrator.run(invocations(&ok, &cfg, 2)).unwrap();
    assert!(results.iter().all(|r| r.status == ChainStatus::Succeeded));
    assert!(!orchestrator.cancel_handle().is_cancelled());
}

#[test]
fn test_clean_exit_without_output_is_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "silent.sh", "echo nothing to see\nexit 0\n");
    let cfg = config(dir.path());

    let err = Orchestrator::new(&cfg).run(invocations(&script, &cfg, 1)).unwrap_err();
    let ExecError::ChainFailure(report) = err else {
        panic!("expected a chain failure, got {err}");
    };
    assert_eq!(report.failed[0].status, ChainStatus::MissingOutput);
}

#[test]
fn test_missing_executable_fails_to_spawn() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let err = Orchestrator::new(&cfg)
        .run(invocations(&dir.path().join("absent"), &cfg, 1))
        .unwrap_err();
    let ExecError::ChainFailure(report) = err else {
        panic!("expected a chain failure, got {err}");
    };
    assert!(matches!(report.failed[0].status, ChainStatus::SpawnFailed { .. }));
}

#[test]
fn test_verbose_output_is_prefixed_per_chain() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "ok.sh", &sampler_body(HEADER, 3, ROW, ""));
    let cfg = config(dir.path());
    let console = SharedBuf::default();

    Orchestrator::new(&cfg)
        .with_verbose(true)
        .with_console(Box::new(console.clone()))
        .run(invocations(&script, &cfg, 2))
        .unwrap();

    let text = console.text();
    for chain in 1..=2 {
        assert!(text.contains(&format!("chain {chain}: chain {chain} starting")), "{text}");
        assert!(text.contains(&format!("chain {chain}: chain {chain} done")), "{text}");
    }
    // every line is whole
    assert!(text.lines().all(|l| l.starts_with("chain ")), "{text}");
}

#[test]
fn test_duplicate_outputs_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let out = dir.path().join("same.csv");
    let invs = vec![
        ChainInvocation::new(drawbridge::ChainId::new(1), "/bin/true", vec![], &out, 1),
        ChainInvocation::new(drawbridge::ChainId::new(2), "/bin/true", vec![], &out, 2),
    ];
    let err = Orchestrator::new(&cfg).run(invs).unwrap_err();
    assert!(matches!(err, ExecError::Invalid(_)));
}
