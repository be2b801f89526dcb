//! Lazy result cache: each group is parsed at most once per reload.

mod common;

use std::path::PathBuf;
use std::sync::Arc;

use common::write_chain_csv;
use drawbridge::fit::Error as FitError;
use drawbridge::{parse_draws, Fit, LazyDraws, Selection};

const HEADER: &[&str] = &["lp__", "accept_stat__", "mu", "theta.1", "theta.2"];

fn chains(dir: &std::path::Path, n: u64, rows: usize) -> Vec<PathBuf> {
    (1..=n)
        .map(|c| {
            write_chain_csv(&dir.join(format!("c{c}.csv")), c, HEADER, rows, |r, col| {
                c as f64 + r as f64 * 0.5 + col as f64 * 100.0
            })
        })
        .collect()
}

#[test]
fn test_each_group_parses_once() {
    let dir = tempfile::tempdir().unwrap();
    let lazy = LazyDraws::new(chains(dir.path(), 2, 30), Some(30));

    // schema reads headers only
    assert_eq!(lazy.schema().unwrap().variable("theta").unwrap().dims, vec![2]);
    assert_eq!(lazy.parse_count(), 0);

    let mu = lazy.get(&["mu"]).unwrap();
    assert_eq!(mu.shape(), (30, 2, 1));
    assert_eq!(lazy.parse_count(), 1);

    lazy.get(&["mu"]).unwrap();
    lazy.variable("mu").unwrap();
    assert_eq!(lazy.parse_count(), 1);

    // only theta is missing, so one more parse
    let both = lazy.get(&["mu", "theta"]).unwrap();
    assert_eq!(both.shape(), (30, 2, 3));
    assert_eq!(lazy.parse_count(), 2);

    lazy.diagnostics().unwrap();
    assert_eq!(lazy.parse_count(), 3);

    // everything is cached now
    let all = lazy.get_all().unwrap();
    assert_eq!(all.num_variables(), 2);
    assert_eq!(all.diagnostics().len(), 2);
    assert_eq!(lazy.parse_count(), 3);
    assert_eq!(lazy.cached().unwrap().len(), 4);
}

#[test]
fn test_cached_values_match_a_full_parse() {
    let dir = tempfile::tempdir().unwrap();
    let paths = chains(dir.path(), 3, 12);
    let lazy = LazyDraws::new(paths.clone(), None);
    let full = parse_draws(&paths, &Selection::All, None).unwrap();

    lazy.get(&["theta"]).unwrap();
    lazy.get(&["lp__"]).unwrap();
    let assembled = lazy.get(&["mu", "theta", "lp__"]).unwrap();
    assert_eq!(assembled.variable("theta"), full.variable("theta"));
    assert_eq!(assembled.variable("mu"), full.variable("mu"));
    assert_eq!(assembled.diagnostics().get("lp__"), full.diagnostics().get("lp__"));
}

#[test]
fn test_unknown_name_fails_without_parsing() {
    let dir = tempfile::tempdir().unwrap();
    let lazy = LazyDraws::new(chains(dir.path(), 1, 5), None);
    let err = lazy.get(&["mu", "nope"]).unwrap_err();
    assert!(matches!(err, FitError::Core(drawbridge::Error::UnknownVariable(ref n)) if n == "nope"), "{err}");
    assert_eq!(lazy.parse_count(), 0);
    assert!(lazy.cached().unwrap().is_empty());
}

#[test]
fn test_concurrent_readers_share_one_parse() {
    let dir = tempfile::tempdir().unwrap();
    let lazy = Arc::new(LazyDraws::new(chains(dir.path(), 4, 200), Some(200)));

    std::thread::scope(|s| {
        for _ in 0..8 {
            let lazy = Arc::clone(&lazy);
            s.spawn(move || {
                let theta = lazy.variable("theta").unwrap();
                assert_eq!(theta.values.len(), 200 * 4 * 2);
            });
        }
    });
    assert_eq!(lazy.parse_count(), 1);
}

#[test]
fn test_fit_from_files_is_lazy() {
    let dir = tempfile::tempdir().unwrap();
    let fit = Fit::from_output_files(chains(dir.path(), 2, 8));
    assert_eq!(fit.num_chains(), 2);

    let meta = fit.metadata().unwrap();
    assert_eq!(meta[0].get("model"), Some("mock_model"));
    assert_eq!(fit.parse_count(), 0);

    assert_eq!(fit.variable("mu").unwrap().values.len(), 16);
    assert_eq!(fit.parse_count(), 1);

    fit.reload().unwrap();
    fit.variable("mu").unwrap();
    assert_eq!(fit.parse_count(), 2);
}
