//! Integration tests for the gramgrow library
//!
//! These tests verify end-to-end growth across the data, hessian and api
//! modules and the invariants a training loop relies on.

use approx::assert_relative_eq;
use gramgrow::hessian::acquire_columns;
use gramgrow::utils::diagnostics;
use gramgrow::{
    ActiveSetSession, ColumnAccess, GramError, HessianUpdater, KernelFamily, LibSVMDataset,
    Matrix, Residency, TrainingData, UpdateConfig, UpdateStrategy,
};
use std::io::Write;
use tempfile::NamedTempFile;

fn spiral(n: usize) -> TrainingData {
    let rows: Vec<Vec<f64>> = (0..n)
        .map(|i| {
            let t = 0.4 * i as f64;
            vec![t.cos() * (1.0 + 0.1 * t), t.sin() * (1.0 + 0.1 * t), 0.05 * t]
        })
        .collect();
    let labels = (0..n)
        .map(|i| if (i / 2) % 2 == 0 { 1.0 } else { -1.0 })
        .collect();
    TrainingData::new(Matrix::from_rows(&rows).unwrap(), labels).unwrap()
}

fn rbf_config() -> UpdateConfig {
    UpdateConfig::default()
        .with_kernel(KernelFamily::Rbf { gamma: 0.8 })
        .with_c(1.5)
        .with_set_size(4)
}

/// Hessian for `active` from scratch, one row at a time
fn grown_from_scratch(data: &TrainingData, config: UpdateConfig, active: &[usize]) -> Matrix {
    let erv: Vec<usize> = (0..data.len()).collect();
    let mut session = ActiveSetSession::new(data, config).unwrap();
    for &row in active {
        session.admit(&[row], &erv).unwrap();
    }
    session.hessian().clone()
}

/// Bordered Hessian entry over `active` computed from its definition
fn bordered_entry(
    data: &TrainingData,
    active: &[usize],
    erv: &[usize],
    i: usize,
    j: usize,
) -> f64 {
    let x = data.features().as_array();
    let k = |a: usize, b: usize| {
        let d2: f64 = x
            .row(a)
            .iter()
            .zip(x.row(b).iter())
            .map(|(p, q)| (p - q) * (p - q))
            .sum();
        (-0.8 * d2).exp()
    };
    let border = |r: usize, c: usize| if r == 0 { 1.0 } else { k(active[r - 1], c) };
    let kernel = if i > 0 && j > 0 {
        k(active[i - 1], active[j - 1])
    } else {
        0.0
    };
    kernel + 1.5 * erv.iter().map(|&c| border(i, c) * border(j, c)).sum::<f64>()
}

/// Growing from three to five active vectors
#[test]
fn test_growth_from_three_to_five() {
    let data = spiral(16);
    let erv: Vec<usize> = (0..16).collect();
    let mut updater = HessianUpdater::new(rbf_config()).unwrap();

    let mut hessian = grown_from_scratch(&data, rbf_config(), &[3, 8]);
    assert_eq!(hessian.shape(), (3, 3));
    let before = hessian.clone();

    let active = [3, 8, 11, 14];
    let outcome = updater
        .update(&mut hessian, None, &data.inputs(&active, &erv))
        .unwrap();

    assert_eq!(hessian.shape(), (5, 5));
    assert_eq!((outcome.previous_dim, outcome.new_dim), (3, 5));
    assert!(diagnostics::leading_block_identical(&before, &hessian));
    assert_eq!(diagnostics::max_asymmetry(&hessian), 0.0);
    assert!(outcome.regularization > 0.0);

    for i in 0..5 {
        for j in 3..5 {
            let raw = bordered_entry(&data, &active, &erv, i, j);
            let expected = if i >= 3 {
                raw + outcome.regularization
            } else {
                raw
            };
            assert_relative_eq!(hessian.get(i, j), expected, max_relative = 1e-10);
        }
    }
    for i in 3..5 {
        assert!(hessian.get(i, i) > bordered_entry(&data, &active, &erv, i, i));
    }

    let raw_mean = (3..5)
        .map(|i| bordered_entry(&data, &active, &erv, i, i))
        .sum::<f64>()
        / 2.0;
    assert_relative_eq!(outcome.regularization, raw_mean * 1e-10, max_relative = 1e-8);
}

#[test]
fn test_dimension_inconsistency_leaves_hessian_untouched() {
    let data = spiral(8);
    let erv: Vec<usize> = (0..8).collect();
    let mut updater = HessianUpdater::new(rbf_config()).unwrap();
    let mut hessian = grown_from_scratch(&data, rbf_config(), &[0, 1, 2]);
    let before = hessian.clone();

    let result = updater.update(&mut hessian, None, &data.inputs(&[0, 1, 2], &erv));
    assert!(matches!(
        result,
        Err(GramError::DimensionInconsistency {
            current: 3,
            requested: 3
        })
    ));
    let result = updater.update(&mut hessian, None, &data.inputs(&[0, 1], &erv));
    assert!(matches!(
        result,
        Err(GramError::DimensionInconsistency { .. })
    ));
    assert_eq!(hessian, before);
}

#[test]
fn test_strategies_agree_across_growth() {
    let data = spiral(20);
    let erv: Vec<usize> = (0..20).rev().collect();
    let batches: [&[usize]; 4] = [&[5], &[0, 19, 7], &[12], &[2, 3]];

    let mut chunked = ActiveSetSession::new(&data, rbf_config()).unwrap();
    let mut direct = ActiveSetSession::new(
        &data,
        rbf_config().with_strategy(UpdateStrategy::Direct),
    )
    .unwrap();
    for batch in batches {
        chunked.admit(batch, &erv).unwrap();
        let outcome = direct.admit(batch, &erv).unwrap();
        assert_eq!(outcome.access, Some(ColumnAccess::Gathered));
    }

    let difference = diagnostics::max_relative_difference(
        chunked.hessian().as_array().view(),
        direct.hessian().as_array().view(),
    );
    assert!(difference < 1e-9, "strategies differ by {difference}");
}

#[test]
fn test_set_size_does_not_change_result() {
    let data = spiral(15);
    let active = [1, 6, 9, 13];
    let reference = grown_from_scratch(&data, rbf_config().with_set_size(1000), &active);

    for set_size in [1, 2, 7, 15] {
        let grown = grown_from_scratch(&data, rbf_config().with_set_size(set_size), &active);
        let difference = diagnostics::max_relative_difference(
            reference.as_array().view(),
            grown.as_array().view(),
        );
        assert!(difference < 1e-12, "set size {set_size} differs by {difference}");
    }
}

#[test]
fn test_budget_fallback_restores_kernel_matrix() {
    let data = spiral(12);
    let erv: Vec<usize> = vec![11, 0, 6, 3, 9];
    let config = rbf_config()
        .with_strategy(UpdateStrategy::Direct)
        .with_gather_budget(Some(1));
    let mut updater = HessianUpdater::new(config).unwrap();
    let mut hessian = Matrix::filled(1, 1, 1.5 * erv.len() as f64, Residency::Host);
    let mut kernel = Matrix::zeros(0, 0, Residency::Host);

    let outcome = updater
        .update(&mut hessian, Some(&mut kernel), &data.inputs(&[4, 7], &erv))
        .unwrap();
    assert_eq!(outcome.access, Some(ColumnAccess::Contigified));
    assert!(updater.contigify_latched());

    // Kernel rows computed directly match the restored matrix
    let mut fresh = Matrix::zeros(0, 0, Residency::Host);
    updater
        .extend_kernel_rows(&mut fresh, &data.inputs(&[4, 7], &erv))
        .unwrap();
    assert_eq!(kernel, fresh);

    let mut reference = Matrix::filled(1, 1, 1.5 * erv.len() as f64, Residency::Host);
    HessianUpdater::new(rbf_config())
        .unwrap()
        .update(&mut reference, None, &data.inputs(&[4, 7], &erv))
        .unwrap();
    let difference = diagnostics::max_relative_difference(
        reference.as_array().view(),
        hessian.as_array().view(),
    );
    assert!(difference < 1e-9);
}

#[test]
fn test_contigify_round_trip_on_kernel_matrix() {
    let data = spiral(9);
    let updater = HessianUpdater::new(rbf_config()).unwrap();
    let mut kernel = Matrix::zeros(0, 0, Residency::Host);
    updater
        .extend_kernel_rows(&mut kernel, &data.inputs(&[2, 5, 8], &[]))
        .unwrap();
    let snapshot = kernel.clone();

    {
        let columns = acquire_columns(&mut kernel, 4, &[8, 1, 4, 0], true, None).unwrap();
        let block = columns.block();
        assert_eq!(block.dim(), (4, 4));
        assert_eq!(block.column(0), snapshot.as_array().column(8));
        assert_eq!(block.column(3), snapshot.as_array().column(0));
    }
    assert_eq!(kernel, snapshot);
}

#[test]
fn test_session_over_libsvm_file() {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    writeln!(temp_file, "+1 1:2.0 2:1.0").expect("Failed to write");
    writeln!(temp_file, "-1 1:-2.0 2:-1.0").expect("Failed to write");
    writeln!(temp_file, "+1 1:1.5 3:0.8").expect("Failed to write");
    writeln!(temp_file, "-1 1:-1.5 2:-0.8").expect("Failed to write");
    writeln!(temp_file, "+1 2:0.9 3:1.8").expect("Failed to write");
    writeln!(temp_file, "-1 1:-1.8 3:-0.9").expect("Failed to write");
    temp_file.flush().expect("Failed to flush");

    let dataset = LibSVMDataset::from_file(temp_file.path()).unwrap();
    let data = TrainingData::from_dataset(&dataset).unwrap();
    assert_eq!((data.len(), data.dim()), (6, 3));

    let config = UpdateConfig::default()
        .with_kernel(KernelFamily::Linear)
        .with_set_size(2);
    let erv: Vec<usize> = (0..6).collect();
    let mut session = ActiveSetSession::new(&data, config).unwrap();
    for batch in [&[0usize, 1][..], &[2][..], &[3, 4, 5][..]] {
        let before = session.hessian().clone();
        let outcome = session.admit(batch, &erv).unwrap();
        assert_eq!(outcome.chunks, 3);
        assert!(diagnostics::leading_block_identical(&before, session.hessian()));
        assert_eq!(diagnostics::max_asymmetry(session.hessian()), 0.0);
    }

    // Linear kernel with C = 1; the regularization stays far below the tolerance
    let x = data.features().as_array();
    let gram = x.dot(&x.t());
    let h = session.hessian();
    assert_eq!(h.get(0, 0), 6.0);
    for j in 0..6 {
        let border: f64 = (0..6).map(|c| gram[[c, j]]).sum();
        assert_relative_eq!(h.get(0, 1 + j), border, epsilon = 1e-9);
        for i in 0..6 {
            let cross: f64 = (0..6).map(|c| gram[[i, c]] * gram[[c, j]]).sum();
            assert_relative_eq!(h.get(1 + i, 1 + j), gram[[i, j]] + cross, epsilon = 1e-6);
        }
    }
}
