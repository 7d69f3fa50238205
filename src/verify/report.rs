//! Plain-text rendering of verification results and contracts
//!
//! Each report is a `Display` wrapper; the `render_*` helpers collect one
//! into a `String`. Printing is left to the caller.

use std::fmt;

use crate::model::{LoadingContract, Prediction};
use crate::verify::record::{Outcome, VerificationRecord, VerificationSummary};

fn describe(record: &VerificationRecord) -> String {
    match &record.outcome {
        Outcome::Pass { max_abs_diff } => format!("PASS  max diff {:.3e}", max_abs_diff),
        Outcome::ValueMismatch {
            max_abs_diff,
            tolerance,
        } => format!(
            "FAIL  max diff {:.3e} (tolerance {:.1e})",
            max_abs_diff, tolerance
        ),
        Outcome::SizeMismatch { expected, actual } => {
            format!("FAIL  size {} elements, expected {}", actual, expected)
        }
        Outcome::ShapeMismatch { expected, actual } => {
            format!("FAIL  reference shape {:?}, expected {:?}", actual, expected)
        }
        Outcome::MissingFile => format!("FAIL  missing {}", record.path.display()),
        Outcome::MissingReference => "FAIL  no reference tensor".to_string(),
        Outcome::Unreadable { reason } => format!("FAIL  unreadable: {}", reason),
        Outcome::Skipped => "SKIP  no reference file".to_string(),
    }
}

/// Verification summary with a title: one line per record, then totals
struct SummaryReport<'a> {
    title: &'a str,
    summary: &'a VerificationSummary,
}

impl fmt::Display for SummaryReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = self.summary;
        writeln!(f, "{}", self.title)?;
        writeln!(f, "{:-<72}", "")?;

        for record in &summary.records {
            writeln!(
                f,
                "{:<28} {:<18} {}",
                record.id.to_string(),
                record.outcome.label(),
                describe(record)
            )?;
        }

        writeln!(f, "{:-<72}", "")?;
        writeln!(
            f,
            "{}/{} passed, {} failed",
            summary.passed(),
            summary.total(),
            summary.failed()
        )?;
        if summary.skipped() > 0 {
            writeln!(f, "{} skipped", summary.skipped())?;
        }
        writeln!(
            f,
            "Total: {} bytes ({:.2} MB)",
            summary.total_bytes,
            summary.total_bytes as f64 / (1024.0 * 1024.0)
        )?;

        if !summary.stray_files.is_empty() {
            writeln!(f, "Unexpected files:")?;
            for stray in &summary.stray_files {
                writeln!(f, "  {}", stray.display())?;
            }
        }

        let verdict = if summary.is_success() {
            "ALL CHECKS PASSED"
        } else {
            "VERIFICATION FAILED"
        };
        writeln!(f, "{}", verdict)
    }
}

/// Input layout followed by the file table
struct ContractReport<'a>(&'a LoadingContract);

impl fmt::Display for ContractReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let contract = self.0;
        let input = &contract.input;

        writeln!(f, "Architecture: {}", contract.architecture)?;
        writeln!(f, "Byte order:   {}", contract.byte_order)?;
        writeln!(f)?;
        writeln!(f, "Input tensor")?;
        writeln!(f, "  shape:    {:?} ({})", input.shape, input.dtype)?;
        writeln!(f, "  layout:   {}", input.layout)?;
        writeln!(f, "  range:    [{}, {}]", input.value_range.0, input.value_range.1)?;
        writeln!(f, "  bytes:    {}", input.bytes)?;
        writeln!(
            f,
            "  audio:    {} Hz, {} s, n_fft {}, hop {}, {} mels",
            input.sample_rate, input.duration_secs, input.n_fft, input.hop_length, input.n_mels
        )?;
        writeln!(f)?;

        writeln!(f, "{:<24} {:<20} {:>10} {:>12}", "File", "Shape", "Elements", "Bytes")?;
        writeln!(f, "{:-<69}", "")?;
        for entry in &contract.files {
            writeln!(
                f,
                "{:<24} {:<20} {:>10} {:>12}",
                entry.file,
                format!("{:?}", entry.shape),
                entry.elements,
                entry.bytes
            )?;
        }
        writeln!(f, "{:-<69}", "")?;
        writeln!(
            f,
            "{} files, {} elements, {} bytes total",
            contract.files.len(),
            contract.total_elements,
            contract.total_bytes
        )
    }
}

/// Ranked predictions, one per line
struct PredictionReport<'a>(&'a [Prediction]);

impl fmt::Display for PredictionReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (rank, prediction) in self.0.iter().enumerate() {
            writeln!(
                f,
                "{}. {:<16} [{}] {:>6.2}%",
                rank + 1,
                prediction.instrument.display_name(),
                prediction.instrument.code(),
                prediction.probability * 100.0
            )?;
        }
        Ok(())
    }
}

pub fn render_summary(title: &str, summary: &VerificationSummary) -> String {
    SummaryReport { title, summary }.to_string()
}

pub fn render_contract(contract: &LoadingContract) -> String {
    ContractReport(contract).to_string()
}

pub fn render_predictions(predictions: &[Prediction]) -> String {
    PredictionReport(predictions).to_string()
}
