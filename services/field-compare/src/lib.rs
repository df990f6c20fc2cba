//! Command-line front end for the field alignment engine.
//!
//! A bundle file describes the forecast sources, an optional reference and
//! the request. The binary loads it, runs the engine and prints tables,
//! JSON or CSV.

pub mod bundle;
pub mod report;

pub use bundle::{Bundle, RequestSpec};
pub use report::{ComparisonReport, ResultsReport};

use field_engine::{Comparison, EngineConfig, FieldSource, VerificationRecord};

/// Load a bundle's sources and run a comparison.
pub fn run_compare(bundle: &Bundle, config: &EngineConfig) -> anyhow::Result<Comparison> {
    bundle.validate()?;
    let request = match &bundle.request {
        Some(request) => request.to_request()?,
        None => anyhow::bail!("a request must be specified"),
    };
    let (sources, reference) = bundle.build_sources()?;
    let sources: Vec<&dyn FieldSource> = sources.iter().map(|s| s as &dyn FieldSource).collect();
    let reference = reference.as_ref().map(|r| r as &dyn FieldSource);
    Ok(field_engine::compare(&sources, reference, &request, config)?)
}

/// Load a bundle's sources and flatten the comparison into records.
pub fn run_verify(bundle: &Bundle, config: &EngineConfig) -> anyhow::Result<Vec<VerificationRecord>> {
    let comparison = run_compare(bundle, config)?;
    Ok(field_engine::convert(&comparison.fields()))
}
