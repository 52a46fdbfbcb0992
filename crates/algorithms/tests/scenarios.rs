//! End-to-end behaviour of `run` across every method.
//!
//! Pick sets are generated deterministically so failures reproduce.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use velgrid_algorithms::prelude::*;
use velgrid_algorithms::regression::LogarithmicRegression;
use velgrid_algorithms::smoothing::kernel_size;

fn picks(rows: &[(f64, f64, f64)]) -> PickSet {
    PickSet::new(rows.iter().map(|&(x, t, v)| Pick::new(x, t, v)).collect()).unwrap()
}

/// Velocity picks on a handful of traces following a noisy compaction trend
fn synthetic_picks(seed: u64, traces: &[f64]) -> PickSet {
    let mut state = seed;
    let mut next = move || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (state >> 11) as f64 / (1u64 << 53) as f64
    };
    let mut rows = Vec::new();
    for &trace in traces {
        for i in 0..5 {
            let t = 150.0 + 400.0 * i as f64 + 50.0 * next();
            let v = 1500.0 + 0.6 * t + 5.0 * trace + 40.0 * (next() - 0.5);
            rows.push((trace, t, v));
        }
    }
    picks(&rows)
}

fn all_methods() -> Vec<Method> {
    vec![
        Method::Rbf,
        Method::CustomLinear { v0: 1500.0, k: 0.5 },
        Method::BestLinear,
        Method::CustomLog { v0: 1500.0, k: 120.0 },
        Method::BestLog,
        Method::TwoStage(TwoStageParams::default()),
        Method::TwoStage(TwoStageParams {
            fill: FillStrategy::NearestBlur,
            smoothing: None,
        }),
    ]
}

fn run_quiet(method: &Method, picks: &PickSet, dims: Option<&SeismicDimensions>) -> RunOutcome {
    run(
        method,
        picks,
        dims,
        &InterpolationConfig::default(),
        &mut NoProgress,
        &NeverCancel,
    )
}

#[test]
fn grid_shape_follows_seismic_dimensions() {
    let p = synthetic_picks(7, &[10.0, 25.0, 40.0, 55.0]);
    for (samples, traces) in [(40, 60), (101, 23), (7, 3)] {
        let dims = SeismicDimensions::from_header(samples, traces, 4000.0, 0.0).with_first_trace(10.0);
        for method in all_methods() {
            let out = run_quiet(&method, &p, Some(&dims))
                .into_output()
                .unwrap_or_else(|| panic!("{} failed", method.name()));
            assert_eq!(out.grid.shape(), (samples, traces), "{}", method.name());
            assert_eq!(out.geometry().shape(), (samples, traces));
        }
    }
}

#[test]
fn r_squared_stays_in_unit_interval() {
    for seed in 0..20 {
        let p = synthetic_picks(seed, &[1.0, 4.0, 9.0]);
        for method in [Method::BestLinear, Method::BestLog, Method::CustomLinear { v0: 0.0, k: 10.0 }] {
            let out = run_quiet(&method, &p, None).into_output().unwrap();
            match out.params {
                ModelParams::Linear { r2, .. } | ModelParams::Logarithmic { r2, .. } => {
                    assert!((0.0..=1.0).contains(&r2), "seed {seed}: r2 = {r2}")
                }
                ref other => panic!("unexpected params {other:?}"),
            }
        }
    }

    // Constant velocity: no variance to explain
    let flat = picks(&[(1.0, 100.0, 2000.0), (2.0, 300.0, 2000.0), (3.0, 500.0, 2000.0)]);
    let out = run_quiet(&Method::BestLinear, &flat, None).into_output().unwrap();
    assert!(matches!(out.params, ModelParams::Linear { r2, .. } if r2 == 0.0));
}

#[test]
fn rbf_and_log_grids_respect_floor() {
    // Velocities fall steeply with time, so extrapolation dives below 1000
    let p = picks(&[
        (0.0, 100.0, 2600.0),
        (0.0, 300.0, 1500.0),
        (5.0, 100.0, 2500.0),
        (5.0, 300.0, 1450.0),
        (10.0, 200.0, 2000.0),
    ]);
    let dims = SeismicDimensions::new(60, 11, 20.0, 0.0);
    for method in [
        Method::Rbf,
        Method::CustomLog { v0: 1500.0, k: -400.0 },
        Method::BestLog,
    ] {
        let out = run_quiet(&method, &p, Some(&dims)).into_output().unwrap();
        let min = out.grid.statistics().min.unwrap();
        assert!(min >= 1000.0, "{}: min {}", method.name(), min);
        assert!(out.grid.data().iter().all(|&v| v >= 1000.0));
    }
}

#[test]
fn progress_is_monotonic_and_ends_at_100() {
    let p = synthetic_picks(3, &[0.0, 3.0, 8.0, 12.0]);
    let dims = SeismicDimensions::new(30, 13, 50.0, 100.0);
    for method in all_methods() {
        let mut seen: Vec<u8> = Vec::new();
        let mut sink = |pct: u8, _: &str| seen.push(pct);
        let outcome = run(
            &method,
            &p,
            Some(&dims),
            &InterpolationConfig::default(),
            &mut sink,
            &NeverCancel,
        );
        assert!(outcome.is_success(), "{}", method.name());
        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{}: {seen:?}", method.name());
        assert_eq!(seen.last(), Some(&100), "{}", method.name());
    }
}

#[test]
fn cancellation_before_start_reports_nothing() {
    let p = synthetic_picks(1, &[0.0, 5.0]);
    for method in all_methods() {
        let calls = AtomicUsize::new(0);
        let mut sink = |_: u8, _: &str| {
            calls.fetch_add(1, Ordering::SeqCst);
        };
        let outcome = run(
            &method,
            &p,
            None,
            &InterpolationConfig::default(),
            &mut sink,
            &|| true,
        );
        assert!(outcome.is_cancelled(), "{}", method.name());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}

#[test]
fn cancellation_mid_run_stops_reporting() {
    let p = synthetic_picks(11, &[0.0, 4.0, 9.0]);
    let stop = AtomicBool::new(false);
    let mut seen: Vec<u8> = Vec::new();
    let mut sink = |pct: u8, _: &str| {
        seen.push(pct);
        if pct >= 30 {
            stop.store(true, Ordering::SeqCst);
        }
    };
    let cancel = || stop.load(Ordering::SeqCst);
    let outcome = run(
        &Method::TwoStage(TwoStageParams::default()),
        &p,
        None,
        &InterpolationConfig::default(),
        &mut sink,
        &cancel,
    );
    assert!(outcome.is_cancelled());
    assert!(outcome.output().is_none());
    assert_eq!(seen.last(), Some(&30));
}

#[test]
fn blur_kernel_is_odd_and_at_least_three() {
    for b in 0..=100 {
        let k = kernel_size(b as f64).unwrap();
        assert!(k >= 3 && k % 2 == 1);
    }
    for tenths in 0..50 {
        let k = kernel_size(tenths as f64 * 0.1).unwrap();
        assert!(k >= 3 && k % 2 == 1);
    }
}

#[test]
fn regression_rows_are_uniform_across_traces() {
    let p = synthetic_picks(5, &[2.0, 6.0, 20.0]);
    let dims = SeismicDimensions::new(25, 19, 80.0, 0.0).with_first_trace(2.0);
    for method in [
        Method::CustomLinear { v0: 1500.0, k: 0.5 },
        Method::BestLinear,
        Method::CustomLog { v0: 1500.0, k: 100.0 },
        Method::BestLog,
    ] {
        let out = run_quiet(&method, &p, Some(&dims)).into_output().unwrap();
        for row in out.grid.data().rows() {
            assert!(row.iter().all(|&v| v == row[0]), "{}", method.name());
        }
    }
}

#[test]
fn scenario_rbf_reproduces_picks_within_smoothing() {
    let p = picks(&[
        (1.0, 100.0, 1500.0),
        (1.0, 200.0, 1600.0),
        (2.0, 100.0, 1520.0),
        (2.0, 200.0, 1610.0),
    ]);
    let dims = SeismicDimensions::from_header(2, 2, 100_000.0, 100.0).with_first_trace(1.0);
    let out = run_quiet(&Method::Rbf, &p, Some(&dims)).into_output().unwrap();
    assert_eq!(out.geometry().trace_axis(), &[1.0, 2.0]);
    assert_eq!(out.geometry().time_axis(), &[100.0, 200.0]);
    let expected = [[1500.0, 1520.0], [1600.0, 1610.0]];
    for (r, row) in expected.iter().enumerate() {
        for (c, &v) in row.iter().enumerate() {
            let got = out.grid.get(r, c).unwrap();
            assert!((got - v).abs() < 5.0, "({r}, {c}): {got} vs {v}");
        }
    }
}

#[test]
fn scenario_custom_linear_profile() {
    let p = picks(&[(0.0, 0.0, 1500.0), (2.0, 200.0, 1600.0)]);
    let dims = SeismicDimensions::new(3, 3, 100.0, 0.0);
    let out = run_quiet(&Method::CustomLinear { v0: 1500.0, k: 0.5 }, &p, Some(&dims))
        .into_output()
        .unwrap();
    assert_eq!(out.geometry().time_axis(), &[0.0, 100.0, 200.0]);
    for c in 0..3 {
        assert_eq!(out.grid.column(c).unwrap().to_vec(), vec![1500.0, 1550.0, 1600.0]);
    }
}

#[test]
fn scenario_logarithmic_floor_at_tiny_time() {
    let p = picks(&[(0.0, 10.0, 3800.0), (1.0, 500.0, 7700.0)]);
    let geometry = GridGeometry::from_axes(vec![0.0, 1.0], vec![0.0005, 1.0, 1000.0]).unwrap();
    let mut sink = NoProgress;
    let mut checkpoint = Checkpoint::new(&mut sink, &NeverCancel);
    let out = LogarithmicRegression::custom(1500.0, 1000.0)
        .build(&p, &geometry, &InterpolationConfig::default(), &mut checkpoint)
        .unwrap();
    assert_eq!(out.grid.get(0, 0).unwrap(), 1000.0);
    assert!((out.grid.get(1, 0).unwrap() - 1500.0).abs() < 1e-9);
    assert!((out.grid.get(2, 1).unwrap() - (1500.0 + 1000.0 * 1000f64.ln())).abs() < 1e-6);
}

#[test]
fn scenario_two_stage_single_column() {
    let p = picks(&[
        (3.0, 100.0, 1550.0),
        (3.0, 400.0, 1800.0),
        (3.0, 900.0, 2250.0),
        (7.0, 300.0, 1700.0),
        (11.0, 600.0, 2000.0),
    ]);
    let dims = SeismicDimensions::new(20, 9, 50.0, 0.0).with_first_trace(3.0);
    let out = run_quiet(&Method::TwoStage(TwoStageParams::default()), &p, Some(&dims))
        .into_output()
        .unwrap();
    assert!(out.warnings.iter().any(|w| w.contains("cross-trace fill skipped")));
    assert!(matches!(
        out.params,
        ModelParams::TwoStage {
            filled_columns: 1,
            skipped_traces: 2,
            ..
        }
    ));
    // Only trace 3 (column 0) carries values
    assert!(out.grid.column(0).unwrap().iter().all(|v| v.is_finite()));
    assert_eq!(out.grid.nan_count(), 20 * 8);
}

#[test]
fn scenario_immediate_cancel_returns_cancelled() {
    let p = synthetic_picks(2, &[0.0, 1.0]);
    let outcome = run(
        &Method::Rbf,
        &p,
        None,
        &InterpolationConfig::default(),
        &mut NoProgress,
        &|| true,
    );
    assert!(matches!(outcome, RunOutcome::Cancelled));
}

#[test]
fn best_fit_failure_is_surfaced() {
    // Every pick at one time: slope undetermined
    let p = picks(&[(0.0, 500.0, 1500.0), (1.0, 500.0, 1700.0), (2.0, 500.0, 1900.0)]);
    let dims = SeismicDimensions::new(10, 3, 100.0, 0.0);
    match run_quiet(&Method::BestLinear, &p, Some(&dims)) {
        RunOutcome::Failure { kind, message } => {
            assert_eq!(kind, ErrorKind::Fit);
            assert!(!message.is_empty());
        }
        other => panic!("expected failure, got {other:?}"),
    }
}
