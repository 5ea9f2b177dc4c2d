use std::path::{Path, PathBuf};

use density_histogram::{
    ComputeContext, ComputeContextConfig, HistogramConfig, HistogramOutput, grid, histogram,
    reference,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Expected {
    counts: Vec<u32>,
    finalized: Vec<f32>,
}

fn cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("cases")
}

fn list_cases(dir: &Path) -> Vec<PathBuf> {
    let Ok(rd) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut cases: Vec<PathBuf> = rd
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir() && p.join("grid.json").is_file())
        .collect();
    cases.sort();
    cases
}

fn load_case(case: &Path) -> (grid::Grid, HistogramConfig, Expected) {
    let name = case.display();
    let grid = grid::load_grid_from_path(case.join("grid.json"))
        .unwrap_or_else(|e| panic!("case {name}: load grid failed: {e:#}"));
    let config = HistogramConfig::load(case.join("config.json"))
        .unwrap_or_else(|e| panic!("case {name}: load config failed: {e:#}"));
    let text = std::fs::read_to_string(case.join("expected.json"))
        .unwrap_or_else(|e| panic!("case {name}: read expected failed: {e}"));
    let expected: Expected = serde_json::from_str(&text)
        .unwrap_or_else(|e| panic!("case {name}: parse expected failed: {e}"));
    (grid, config, expected)
}

fn check(case: &Path, backend: &str, out: &HistogramOutput, expected: &Expected) {
    let name = case.display();
    assert_eq!(out.counts, expected.counts, "case {name} ({backend}): counts");
    assert_eq!(out.finalized.len(), expected.finalized.len());
    for (b, (a, e)) in out.finalized.iter().zip(&expected.finalized).enumerate() {
        assert!(
            (a - e).abs() <= e.abs() * 1e-5 + 1e-6,
            "case {name} ({backend}): bin {b} got {a}, expected {e}"
        );
    }
}

#[test]
fn grid_cases_match_expected_on_cpu() {
    let cases = list_cases(&cases_dir());
    assert!(!cases.is_empty(), "expected grid cases under tests/cases");

    for case in cases {
        let (grid, config, expected) = load_case(&case);
        let out = reference::histogram(&grid, &config)
            .unwrap_or_else(|e| panic!("case {}: {e}", case.display()));
        check(&case, "cpu", &out, &expected);
    }
}

#[test]
fn grid_cases_match_expected_on_gpu() {
    let ctx = match ComputeContext::new(ComputeContextConfig::default()) {
        Ok(ctx) => ctx,
        Err(err) => {
            eprintln!("No adapter available for grid cases: {err}");
            return;
        }
    };

    for case in list_cases(&cases_dir()) {
        let (grid, config, expected) = load_case(&case);
        let out = histogram(&ctx, &grid, &config)
            .unwrap_or_else(|e| panic!("case {}: {e}", case.display()));
        check(&case, "gpu", &out, &expected);
    }
}
