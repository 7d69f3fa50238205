//! Verification Module
//!
//! Checks another implementation's tensor files against reference values
//! and renders the results.

pub mod record;
pub mod report;
pub mod verifier;

pub use record::{Outcome, VerificationRecord, VerificationSummary};
pub use report::{render_contract, render_predictions, render_summary};
pub use verifier::{max_abs_diff, stray_files, Verifier};
