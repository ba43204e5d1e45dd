//! Configuration files and growth reports
//!
//! Update configurations are stored as JSON so the CLI can reuse them across
//! runs. A [`GrowthReport`] records what each admission did to the Hessian.

use crate::core::{GramError, Result, UpdateConfig, UpdateOutcome};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Load an update configuration; missing fields take their defaults
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<UpdateConfig> {
    let file = File::open(path).map_err(GramError::IoError)?;
    let reader = BufReader::new(file);
    let config: UpdateConfig = serde_json::from_reader(reader)
        .map_err(|e| GramError::SerializationError(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Save an update configuration as pretty-printed JSON
pub fn save_config<P: AsRef<Path>>(config: &UpdateConfig, path: P) -> Result<()> {
    let file = File::create(path).map_err(GramError::IoError)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, config)
        .map_err(|e| GramError::SerializationError(e.to_string()))?;
    Ok(())
}

/// One admission and the diagnostics taken after it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// Number of vectors admitted in this step
    pub admitted: usize,
    pub outcome: UpdateOutcome,
    /// Largest |H[i][j] - H[j][i]| after the step
    pub symmetry_error: f64,
    /// Whether the previous Hessian survived as the leading block bit for bit
    pub leading_block_preserved: bool,
}

/// Record of one growth run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrowthReport {
    /// Library version used to produce the report
    pub library_version: String,
    /// Creation timestamp
    pub created_at: String,
    pub config: UpdateConfig,
    /// Training rows
    pub n_samples: usize,
    /// Features per row
    pub n_features: usize,
    pub steps: Vec<StepRecord>,
    /// Hessian dimension after the last step
    pub final_dim: usize,
}

impl GrowthReport {
    pub fn new(config: UpdateConfig, n_samples: usize, n_features: usize) -> Self {
        Self {
            library_version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            config,
            n_samples,
            n_features,
            steps: Vec::new(),
            final_dim: 1,
        }
    }

    pub fn record(&mut self, step: StepRecord) {
        self.final_dim = step.outcome.new_dim;
        self.steps.push(step);
    }

    /// Largest symmetry error over all steps
    pub fn max_symmetry_error(&self) -> f64 {
        self.steps
            .iter()
            .map(|s| s.symmetry_error)
            .fold(0.0, f64::max)
    }

    /// Save report to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path).map_err(GramError::IoError)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| GramError::SerializationError(e.to_string()))?;
        Ok(())
    }

    /// Load report from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(GramError::IoError)?;
        let reader = BufReader::new(file);
        let report = serde_json::from_reader(reader)
            .map_err(|e| GramError::SerializationError(e.to_string()))?;
        Ok(report)
    }

    /// Print report summary
    pub fn print_summary(&self) {
        println!("=== Hessian Growth Summary ===");
        println!("Kernel: {}", self.config.kernel.name());
        println!("Strategy: {:?}", self.config.strategy);
        println!("C: {}", self.config.c);
        println!("Samples: {} ({} features)", self.n_samples, self.n_features);
        println!("Steps: {}", self.steps.len());
        println!("Final Dimension: {}", self.final_dim);
        println!("Max Symmetry Error: {:.3e}", self.max_symmetry_error());
        if let Some(last) = self.steps.last() {
            println!("Last Regularization: {:.6e}", last.outcome.regularization);
        }
        println!("Library Version: {}", self.library_version);
        println!("Created: {}", self.created_at);
    }
}
