mod common;

use common::{
    pair_config, pair_run, synthetic_config, synthetic_run, zero_background_config,
    zero_background_run,
};
use musr_asym::background::estimate_background;
use musr_asym::{
    aggregate, build_time_axis, compute_asymmetry, estimate_rate, AccumulatorPhase, AlwaysConfirm,
    AlwaysDecline, GeometryMismatch, MultiRunAccumulator,
};
use musr_core::constants::TAU_MU_US;
use musr_core::{HistogramRun, RunSource};

#[test]
fn zero_background_identical_groups_give_zero_asymmetry() {
    let config = zero_background_config();
    let run = zero_background_run(1, 1.0, &[100, 90, 80, 70]);
    let time = build_time_axis(&run, &config.calibration, &config.group).unwrap();
    assert_eq!(time.len(), 4);
    assert_eq!(time.as_slice()[0], 0.0);
    for detector in 0..2 {
        let histogram = run.histogram(detector).unwrap();
        assert_eq!(estimate_background(&config.calibration, detector, histogram).unwrap(), 0.0);
    }

    let forward = aggregate(&[0], &run, &config.calibration, time.len()).unwrap();
    let backward = aggregate(&[1], &run, &config.calibration, time.len()).unwrap();
    assert_eq!(forward.raw, vec![100.0, 90.0, 80.0, 70.0]);
    assert_eq!(forward.corrected, forward.raw);
    let combined: Vec<f64> = forward
        .corrected
        .iter()
        .zip(&backward.corrected)
        .map(|(f, b)| f + b)
        .collect();
    let rate = estimate_rate(time.as_slice(), &combined).unwrap();

    let x: Vec<f64> = time
        .as_slice()
        .iter()
        .map(|t| (-t / TAU_MU_US).exp())
        .collect();
    let x_mean = x.iter().sum::<f64>() / 4.0;
    let y_mean = combined.iter().sum::<f64>() / 4.0;
    let sxy: f64 = x
        .iter()
        .zip(&combined)
        .map(|(xi, yi)| (xi - x_mean) * (yi - y_mean))
        .sum();
    let sxx: f64 = x.iter().map(|xi| (xi - x_mean).powi(2)).sum();
    assert!((rate - sxy / sxx).abs() <= 1e-9 * rate.abs());

    let series = compute_asymmetry(&forward, &backward, time.as_slice(), 1.0, rate);
    assert!(series.asymmetry.iter().all(|a| a.abs() < 1e-12));
    assert!(series.error.iter().all(|&e| e != 0.0));
}

#[test]
fn four_bin_scenario_through_accumulator() {
    let mut acc = MultiRunAccumulator::new(pair_config()).unwrap();
    let report = acc.ingest(&pair_run(7, 1.0, &[100, 90, 80, 70])).unwrap();
    assert!(report.calibrated);
    assert_eq!(report.row, 0);
    let row = &acc.result().rows()[0];
    assert_eq!(row.len(), 4);
    assert!(row.asymmetry.iter().all(|a| a.abs() < 1e-12));
    assert_eq!(acc.phase(), AccumulatorPhase::Calibrated);
}

#[test]
fn different_bin_width_is_rejected_without_change() {
    let mut acc = MultiRunAccumulator::with_policy(pair_config(), Box::new(AlwaysConfirm)).unwrap();
    acc.ingest(&pair_run(1, 0.8, &[100, 90, 80, 70])).unwrap();
    let before = acc.snapshot();

    let err = acc.ingest(&pair_run(2, 1.0, &[100, 90, 80, 70])).unwrap_err();
    assert!(err.is_resolution_mismatch());
    assert_eq!(err.info().code, "resolution-mismatch");
    assert_eq!(acc.result().len(), 1);
    assert_eq!(acc.snapshot(), before);
}

#[test]
fn declined_geometry_mismatch_keeps_one_row() {
    let mut acc = MultiRunAccumulator::new(pair_config()).unwrap();
    acc.ingest(&pair_run(1, 0.8, &[100, 90, 80, 70])).unwrap();

    let err = acc
        .ingest(&pair_run(2, 0.8, &[100, 90, 80, 70, 60]))
        .unwrap_err();
    assert!(err.is_geometry_mismatch());
    assert_eq!(err.info().code, "geometry-declined");
    assert_eq!(acc.result().len(), 1);
    assert_eq!(acc.result().run_ids(), &[1]);
}

#[test]
fn confirmed_geometry_mismatch_is_accumulated() {
    let mut asked = Vec::new();
    let policy = move |mismatch: &GeometryMismatch| {
        asked.push(mismatch.run_number);
        true
    };
    let mut acc = MultiRunAccumulator::with_policy(pair_config(), Box::new(policy)).unwrap();
    acc.ingest(&pair_run(1, 0.8, &[100, 90, 80, 70])).unwrap();
    let report = acc
        .ingest(&pair_run(2, 0.8, &[100, 90, 80, 70, 60, 50]))
        .unwrap();
    assert!(report.negotiated);
    assert_eq!(acc.result().len(), 2);
    assert_eq!(acc.result().rows()[1].len(), acc.time().len());
    assert_eq!(acc.reference().unwrap().histogram_length, 4);
}

#[test]
fn confirmed_but_uncovered_run_is_rejected() {
    let mut acc = MultiRunAccumulator::with_policy(pair_config(), Box::new(AlwaysConfirm)).unwrap();
    acc.ingest(&pair_run(1, 0.8, &[100, 90, 80, 70])).unwrap();
    let err = acc.ingest(&pair_run(2, 0.8, &[100, 90, 80])).unwrap_err();
    assert!(err.is_geometry_mismatch());
    assert_eq!(err.info().code, "geometry-uncovered");
    assert_eq!(acc.result().len(), 1);

    let single = HistogramRun::new(3, 0.8, vec![vec![100, 90, 80, 70]]).unwrap();
    let err = acc.ingest(&single).unwrap_err();
    assert_eq!(err.info().code, "geometry-uncovered");
    assert_eq!(err.info().context["detector"], "1");
}

#[test]
fn first_run_too_short_for_baseline_is_configuration_error() {
    let mut config = pair_config();
    config.calibration.lastbin = vec![1, 6];
    let mut acc = MultiRunAccumulator::new(config).unwrap();
    let err = acc.ingest(&pair_run(1, 1.0, &[100, 90, 80, 70])).unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(err.info().code, "run-coverage");
    assert_eq!(acc.phase(), AccumulatorPhase::Empty);
    assert!(acc.time().is_empty());
    assert!(acc.reference().is_none());
}

#[test]
fn overflowing_prompt_bin_fails_without_panic() {
    let mut config = pair_config();
    config.calibration.nt0 = vec![usize::MAX, 0];
    config.calibration.offset = 1;
    let mut acc = MultiRunAccumulator::new(config).unwrap();
    let err = acc.ingest(&pair_run(1, 1.0, &[100, 90, 80, 70])).unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(err.info().code, "no-usable-bins");
    assert_eq!(acc.phase(), AccumulatorPhase::Empty);
    assert!(acc.reference().is_none());
}

#[test]
fn replaced_policy_decides_later_mismatches() {
    let mut acc = MultiRunAccumulator::new(pair_config()).unwrap();
    acc.ingest(&pair_run(1, 0.8, &[100, 90, 80, 70])).unwrap();
    let longer = pair_run(2, 0.8, &[100, 90, 80, 70, 60]);
    assert!(acc.ingest(&longer).unwrap_err().is_geometry_mismatch());

    acc.set_policy(Box::new(AlwaysConfirm));
    assert!(acc.ingest(&longer).unwrap().negotiated);
    acc.set_policy(Box::new(AlwaysDecline));
    assert!(acc.ingest(&longer).unwrap_err().is_geometry_mismatch());
    assert_eq!(acc.result().run_ids(), &[1, 2]);
}

#[test]
fn failed_normalization_leaves_accumulator_empty() {
    let mut acc = MultiRunAccumulator::new(pair_config()).unwrap();
    let err = acc.ingest(&pair_run(1, 1.0, &[5, 5, 5, 5])).unwrap_err();
    assert_eq!(err.info().code, "zero-rate");
    assert!(acc.time().is_empty());
    assert!(acc.reference().is_none());
    acc.ingest(&pair_run(2, 1.0, &[100, 90, 80, 70])).unwrap();
    assert_eq!(acc.result().run_ids(), &[2]);
}

#[test]
fn n_runs_stack_in_ingestion_order() {
    let mut acc = MultiRunAccumulator::new(synthetic_config()).unwrap();
    let numbers = [2213_u64, 2211, 2215, 2212];
    for &number in &numbers {
        acc.ingest(&synthetic_run(number, 0.9765625, 1024)).unwrap();
    }
    assert_eq!(acc.result().len(), numbers.len());
    assert_eq!(acc.result().run_ids(), &numbers);
    assert_eq!(acc.phase(), AccumulatorPhase::Accumulating);
    assert_eq!(acc.time().len(), 1024 - 42 - 2);
    for row in acc.result().rows() {
        assert_eq!(row.len(), acc.time().len());
    }
}

#[test]
fn synthetic_asymmetry_is_recovered_near_time_zero() {
    let mut acc = MultiRunAccumulator::new(synthetic_config()).unwrap();
    acc.ingest(&synthetic_run(1, 0.9765625, 2048)).unwrap();
    let row = &acc.result().rows()[0];
    let early = &row.asymmetry[..200];
    let mean = early.iter().sum::<f64>() / early.len() as f64;
    assert!((mean - 0.2).abs() < 0.05, "mean asymmetry {mean}");
}

#[test]
fn reset_and_reingest_is_bit_identical() {
    let runs: Vec<_> = (1..=3)
        .map(|n| synthetic_run(n, 0.9765625, 512))
        .collect();
    let mut acc = MultiRunAccumulator::new(synthetic_config()).unwrap();
    for run in &runs {
        acc.ingest(run).unwrap();
    }
    let first = acc.result().clone();
    let first_time = acc.time().clone();
    let first_hash = acc.provenance().unwrap().result_hash;

    acc.reset();
    assert_eq!(acc.phase(), AccumulatorPhase::Empty);
    assert!(acc.time().is_empty());
    assert!(acc.reference().is_none());

    for run in &runs {
        acc.ingest(run).unwrap();
    }
    assert_eq!(acc.result(), &first);
    assert_eq!(acc.time(), &first_time);
    assert_eq!(acc.provenance().unwrap().result_hash, first_hash);
}

#[test]
fn reset_allows_new_resolution() {
    let mut acc = MultiRunAccumulator::new(pair_config()).unwrap();
    acc.ingest(&pair_run(1, 0.8, &[100, 90, 80, 70])).unwrap();
    acc.reset();
    acc.ingest(&pair_run(2, 1.0, &[100, 90, 80, 70])).unwrap();
    assert_eq!(acc.reference().unwrap().bin_width_ns, 1.0);
    assert!((acc.time().as_slice()[1] - 0.001).abs() < 1e-15);
}

#[test]
fn append_checks_row_length() {
    let mut acc = MultiRunAccumulator::new(pair_config()).unwrap();
    let row = musr_asym::AsymmetrySeries {
        asymmetry: vec![0.0; 4],
        error: vec![1.0; 4],
    };
    assert_eq!(
        acc.append(row.clone(), 9).unwrap_err().info().code,
        "uncalibrated"
    );
    acc.ingest(&pair_run(1, 1.0, &[100, 90, 80, 70])).unwrap();
    acc.append(row, 9).unwrap();
    let short = musr_asym::AsymmetrySeries {
        asymmetry: vec![0.0; 3],
        error: vec![1.0; 3],
    };
    assert_eq!(acc.append(short, 10).unwrap_err().info().code, "row-length");
    assert_eq!(acc.result().run_ids(), &[1, 9]);
}

#[test]
fn invalid_configuration_is_refused_at_setup() {
    let mut config = pair_config();
    config.calibration.lastbin = vec![0, 1];
    let err = MultiRunAccumulator::new(config).unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(err.info().code, "baseline-window");
}
