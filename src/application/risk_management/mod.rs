//! Per-signal and composite entry-gate risk checks (spec.md 4.6), plus
//! the sizing engine that turns an approved signal into an order size.

pub mod pipeline;
pub mod sizing;
pub mod validators;

pub use pipeline::{RiskValidationPipeline, RiskValidator, ValidationContext, ValidationResult};
pub use validators::default_validators;
