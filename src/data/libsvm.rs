//! LibSVM format reader
//!
//! One sample per line:
//!
//! ```text
//! <label> <index>:<value> <index>:<value> ... [# comment]
//! ```
//!
//! Indices are 1-based and strictly increasing within a line. Labels are
//! coerced to ±1 by sign, so `2`/`0` files load as `+1`/`-1`. A `qid:` token
//! after the label is accepted and ignored.

use crate::core::{Dataset, GramError, Result, Sample, SparseVector};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Sparse samples read from a LibSVM file
#[derive(Debug, Clone)]
pub struct LibSVMDataset {
    samples: Vec<Sample>,
    dimensions: usize,
}

impl LibSVMDataset {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(GramError::IoError)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut samples = Vec::new();
        let mut dimensions = 0;

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(GramError::IoError)?;
            let content = line.split('#').next().unwrap_or("").trim();
            if content.is_empty() {
                continue;
            }

            let sample = Self::parse_line(content).map_err(|e| {
                GramError::ParseError(format!("line {}: {}", line_num + 1, e))
            })?;
            if let Some(&last) = sample.features.indices.last() {
                dimensions = dimensions.max(last + 1);
            }
            samples.push(sample);
        }

        if samples.is_empty() {
            return Err(GramError::EmptyDataset);
        }
        log::debug!(
            "Read {} LibSVM samples spanning {} features",
            samples.len(),
            dimensions
        );
        Ok(Self {
            samples,
            dimensions,
        })
    }

    fn parse_line(line: &str) -> Result<Sample> {
        let mut tokens = line.split_whitespace();
        let label_token = tokens
            .next()
            .ok_or_else(|| GramError::ParseError("missing label".to_string()))?;
        let raw_label: f64 = label_token
            .parse()
            .map_err(|_| GramError::ParseError(format!("invalid label '{label_token}'")))?;
        if !raw_label.is_finite() {
            return Err(GramError::InvalidLabel(raw_label));
        }
        let label = if raw_label > 0.0 { 1.0 } else { -1.0 };

        let mut indices = Vec::new();
        let mut values = Vec::new();
        for token in tokens {
            let (index, value) = token.split_once(':').ok_or_else(|| {
                GramError::ParseError(format!("expected index:value, got '{token}'"))
            })?;
            if index == "qid" {
                continue;
            }

            let index: usize = index
                .parse()
                .map_err(|_| GramError::ParseError(format!("invalid feature index '{index}'")))?;
            let value: f64 = value
                .parse()
                .map_err(|_| GramError::ParseError(format!("invalid feature value '{value}'")))?;
            if index == 0 {
                return Err(GramError::ParseError(
                    "feature indices start at 1".to_string(),
                ));
            }
            let index = index - 1;
            if indices.last().is_some_and(|&prev| prev >= index) {
                return Err(GramError::ParseError(format!(
                    "feature index {} is not increasing",
                    index + 1
                )));
            }

            indices.push(index);
            values.push(value);
        }

        Ok(Sample::new(SparseVector::new(indices, values), label))
    }
}

impl Dataset for LibSVMDataset {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn dim(&self) -> usize {
        self.dimensions
    }

    fn get_sample(&self, i: usize) -> Sample {
        self.samples[i].clone()
    }

    fn get_labels(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.label).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_line() {
        let sample = LibSVMDataset::parse_line("+1 1:0.5 3:1.2").unwrap();
        assert_eq!(sample.label, 1.0);
        assert_eq!(sample.features.indices, vec![0, 2]);
        assert_eq!(sample.features.values, vec![0.5, 1.2]);

        let sample = LibSVMDataset::parse_line("-1 qid:3 2:0.3").unwrap();
        assert_eq!(sample.label, -1.0);
        assert_eq!(sample.features.indices, vec![1]);
    }

    #[test]
    fn test_labels_coerced_by_sign() {
        assert_eq!(LibSVMDataset::parse_line("2 1:1.0").unwrap().label, 1.0);
        assert_eq!(LibSVMDataset::parse_line("0 1:1.0").unwrap().label, -1.0);
        assert_eq!(LibSVMDataset::parse_line("-3").unwrap().label, -1.0);
        assert!(matches!(
            LibSVMDataset::parse_line("nan 1:1.0"),
            Err(GramError::InvalidLabel(_))
        ));
    }

    #[test]
    fn test_parse_line_rejects_malformed() {
        let malformed = [
            "+1 1",
            "+1 abc:1.0",
            "+1 1:abc",
            "+1 0:1.0",
            "+1 3:1.0 2:1.0",
            "+1 2:1 2:1",
        ];
        for line in malformed {
            assert!(
                LibSVMDataset::parse_line(line).is_err(),
                "accepted malformed line '{line}'"
            );
        }
    }

    #[test]
    fn test_from_reader() {
        let data = "# header\n+1 1:0.5 3:1.2 # trailing\n\n-1 2:0.3 5:2.1\n";
        let dataset = LibSVMDataset::from_reader(Cursor::new(data)).unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.dim(), 5);
        assert_eq!(dataset.get_labels(), vec![1.0, -1.0]);
        assert_eq!(dataset.get_sample(1).features.indices, vec![1, 4]);
    }

    #[test]
    fn test_from_reader_reports_line_number() {
        let data = "+1 1:0.5\n-1 2:x\n";
        match LibSVMDataset::from_reader(Cursor::new(data)) {
            Err(GramError::ParseError(msg)) => assert!(msg.starts_with("line 2:"), "{msg}"),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_from_reader_empty_dataset() {
        let result = LibSVMDataset::from_reader(Cursor::new("# Only comments\n\n"));
        assert!(matches!(result, Err(GramError::EmptyDataset)));
    }

    #[test]
    fn test_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(temp_file, "+1 1:0.5 3:1.2").expect("Failed to write");
        writeln!(temp_file, "-1 2:0.3 5000:2.1").expect("Failed to write");
        temp_file.flush().expect("Failed to flush");

        let dataset = LibSVMDataset::from_file(temp_file.path()).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.dim(), 5000);
    }

    #[test]
    fn test_from_file_io_error() {
        let result = LibSVMDataset::from_file("/non/existent/file.libsvm");
        assert!(matches!(result, Err(GramError::IoError(_))));
    }
}
