//! Dataset compatibility and format validation tests
//!
//! Tests for ensuring LibSVM variations load, densify and feed Hessian growth

use gramgrow::utils::{diagnostics, memory, validation};
use gramgrow::{
    ActiveSetSession, Dataset, GramError, KernelFamily, LibSVMDataset, TrainingData,
    UpdateConfig,
};
use std::io::Write;
use tempfile::NamedTempFile;

fn write_temp(data: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    write!(temp_file, "{}", data).expect("Failed to write");
    temp_file.flush().expect("Failed to flush");
    temp_file
}

/// Test LibSVM format variations
#[test]
fn test_libsvm_format_variations() {
    let test_cases = vec![
        // Basic format
        ("+1 1:0.5 3:1.2 7:0.8\n-1 2:0.3 5:2.1\n", "basic format"),
        // With comments and empty lines
        (
            "# This is a comment\n+1 1:0.5 3:1.2\n\n# Another comment\n-1 2:0.3\n",
            "with comments",
        ),
        // Different label formats
        ("1 1:0.5 2:1.0\n-1 1:-0.5 2:-1.0\n", "explicit +/-1 labels"),
        ("2 1:0.5 2:1.0\n0 1:-0.5 2:-1.0\n", "labels coerced to +/-1"),
        // Sparse indices (non-consecutive)
        (
            "+1 1:1.0 10:2.0 100:3.0\n-1 5:1.5 50:2.5 500:3.5\n",
            "sparse indices",
        ),
        // Single feature
        (
            "+1 1:2.0\n-1 1:-2.0\n+1 1:1.8\n-1 1:-1.8\n",
            "single feature",
        ),
        // Sample with no features
        ("+1\n-1 1:1.0\n", "empty feature list"),
    ];

    for (data, description) in test_cases {
        let temp_file = write_temp(data);

        let dataset = LibSVMDataset::from_file(temp_file.path())
            .unwrap_or_else(|e| panic!("Failed to load LibSVM dataset ({description}): {e}"));
        let training = TrainingData::from_dataset(&dataset)
            .unwrap_or_else(|e| panic!("Failed to densify ({description}): {e}"));

        assert_eq!(training.len(), dataset.len(), "{description}");
        assert_eq!(training.dim(), dataset.dim(), "{description}");
        assert!(
            training.labels().iter().all(|&y| y == 1.0 || y == -1.0),
            "Labels should be +/-1: {description}"
        );

        // One admission over every row
        let erv: Vec<usize> = (0..training.len()).collect();
        let config = UpdateConfig::default().with_kernel(KernelFamily::Linear);
        let mut session = ActiveSetSession::new(&training, config).unwrap();
        let outcome = session
            .admit(&[0], &erv)
            .unwrap_or_else(|e| panic!("Growth should succeed for {description}: {e}"));
        assert_eq!(outcome.new_dim, 2, "{description}");
        assert_eq!(diagnostics::max_asymmetry(session.hessian()), 0.0);
    }
}

/// Test large dimension handling
#[test]
fn test_large_dimensions() {
    let mut libsvm_data = String::new();
    libsvm_data.push_str("+1 100:1.0 1000:2.0 10000:1.5\n");
    libsvm_data.push_str("+1 150:1.2 1500:1.8 15000:1.3\n");
    libsvm_data.push_str("-1 200:1.0 2000:2.0 20000:1.5\n");
    libsvm_data.push_str("-1 250:1.2 2500:1.8 25000:1.3\n");
    let temp_file = write_temp(&libsvm_data);

    let dataset = LibSVMDataset::from_file(temp_file.path())
        .expect("Failed to load high-dimensional dataset");
    assert_eq!(dataset.len(), 4);
    assert_eq!(dataset.dim(), 25000);

    let training = TrainingData::from_dataset(&dataset).unwrap();
    assert_eq!(training.features().shape(), (4, 25000));
    assert_eq!(training.norms()[0], 1.0 + 4.0 + 2.25);

    // Disjoint supports: the linear Gram matrix is diagonal
    let config = UpdateConfig::default()
        .with_kernel(KernelFamily::Linear)
        .with_c(1.0);
    let erv: Vec<usize> = (0..4).collect();
    let mut session = ActiveSetSession::new(&training, config).unwrap();
    for row in 0..4 {
        session.admit(&[row], &erv).unwrap();
    }
    let h = session.hessian();
    assert_eq!(h.get(1, 2), 0.0);
    assert_eq!(h.get(3, 4), 0.0);
}

/// Test malformed data handling
#[test]
fn test_malformed_data_handling() {
    let malformed_cases = vec![
        ("invalid_label 1:1.0\n", "invalid label"),
        ("+1 invalid_feature\n", "invalid feature format"),
        ("+1 0:1.0\n", "zero-based index"),
        ("+1 1:invalid_value\n", "invalid feature value"),
        ("", "empty file"),
        ("# comments only\n", "no samples"),
    ];

    for (data, description) in malformed_cases {
        let temp_file = write_temp(data);
        let result = LibSVMDataset::from_file(temp_file.path());
        assert!(
            result.is_err(),
            "LibSVM should reject malformed data: {}",
            description
        );
    }

    let temp_file = write_temp("");
    assert!(matches!(
        LibSVMDataset::from_file(temp_file.path()),
        Err(GramError::EmptyDataset)
    ));
}

/// Test dataset statistics and validation
#[test]
fn test_dataset_validation() {
    let data = "+1 1:3.0 2:4.0\n+1 1:2.8 2:4.2\n+1 1:3.2 2:3.8\n-1 1:-3.0 2:-4.0\n-1 1:-2.8 2:-4.2\n-1 1:-3.2 2:-3.8\n";
    let temp_file = write_temp(data);

    let dataset = LibSVMDataset::from_file(temp_file.path()).expect("Failed to load dataset");
    let training = TrainingData::from_dataset(&dataset).unwrap();

    let (pos_count, neg_count, balance_ratio) = validation::check_label_balance(training.labels());
    assert_eq!(pos_count, 3, "Should have 3 positive samples");
    assert_eq!(neg_count, 3, "Should have 3 negative samples");
    assert!(
        (balance_ratio - 1.0).abs() < 0.1,
        "Dataset should be balanced"
    );
    assert_eq!(training.norms()[0], 25.0);
}

/// Test chunk memory estimates
#[test]
fn test_memory_efficiency() {
    let mem_100 = memory::estimate_chunk_memory(101, 10, 100);
    let mem_1000 = memory::estimate_chunk_memory(101, 10, 1000);
    assert_eq!(mem_1000, mem_100 * 10, "Memory should scale with set size");

    // 100 MB available
    let recommended = memory::recommend_set_size(101, 10, 100);
    assert!(recommended > 0, "Should recommend a positive set size");
    assert!(
        memory::estimate_chunk_memory(101, 10, recommended) <= 50 * 1024 * 1024,
        "Should not exceed 50% of available memory"
    );

    let recommended_large = memory::recommend_set_size(101, 10, 1000);
    assert!(
        recommended_large > recommended,
        "More memory should allow larger chunks"
    );
}
