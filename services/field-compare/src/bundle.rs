//! Comparison bundles: sources, reference, request and engine settings in
//! one YAML or JSON file.

use std::path::Path;

use anyhow::{bail, Context};
use field_common::time::parse_datetime;
use field_common::BoundingBox;
use field_engine::{ComparisonRequest, EngineConfig, InMemorySource, LossCurve, ReduceMode, SourceSpec};
use serde::{Deserialize, Serialize};

/// Everything one invocation needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bundle {
    /// Forecast sources; the first is the primary.
    #[serde(default)]
    pub sources: Vec<SourceSpec>,

    #[serde(default)]
    pub reference: Option<SourceSpec>,

    #[serde(default)]
    pub request: Option<RequestSpec>,

    /// Engine settings. When absent they come from the environment.
    #[serde(default)]
    pub config: Option<EngineConfig>,

    /// Pre-parsed training-loss curves.
    #[serde(default)]
    pub curves: Vec<LossCurve>,
}

/// Request as written by hand: times, members and boxes as strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSpec {
    pub variable: String,

    /// Cycle start such as `2023-08-15T00`.
    #[serde(default)]
    pub valid_time: Option<String>,

    #[serde(default)]
    pub lead_times: Vec<u32>,

    /// `mean`, `spread` or member indices.
    #[serde(default)]
    pub members: Vec<String>,

    /// `min_lon,min_lat,max_lon,max_lat`
    #[serde(default)]
    pub bbox: Option<String>,

    #[serde(default)]
    pub difference: bool,

    /// Common grid spacing in degrees when no reference is given.
    #[serde(default)]
    pub resolution: Option<f64>,
}

impl RequestSpec {
    pub fn to_request(&self) -> anyhow::Result<ComparisonRequest> {
        let valid_time = self
            .valid_time
            .as_deref()
            .map(parse_datetime)
            .transpose()
            .context("invalid valid_time")?;
        let members = self
            .members
            .iter()
            .map(|m| ReduceMode::parse(m).with_context(|| format!("invalid member selection '{}'", m)))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let bbox = self
            .bbox
            .as_deref()
            .map(BoundingBox::parse)
            .transpose()
            .context("invalid bbox")?;

        Ok(ComparisonRequest {
            variable: self.variable.clone(),
            valid_time,
            lead_times: self.lead_times.clone(),
            members,
            bbox,
            difference: self.difference,
            resolution: self.resolution,
        })
    }
}

impl Bundle {
    /// Load from a file. `.json` files are read as JSON, anything else as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read bundle {}", path.display()))?;
        let bundle = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            _ => serde_yaml::from_str(&content)?,
        };
        Ok(bundle)
    }

    /// Validate what a comparison needs.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.sources.is_empty() {
            bail!("at least one forecast source must be specified");
        }
        let Some(request) = &self.request else {
            bail!("a request must be specified");
        };
        if request.difference && self.reference.is_none() {
            bail!("difference requested but no reference source given");
        }
        if let Some(config) = &self.config {
            config.validate().map_err(anyhow::Error::msg)?;
        }
        Ok(())
    }

    /// Build the forecast sources and the reference.
    pub fn build_sources(&self) -> anyhow::Result<(Vec<InMemorySource>, Option<InMemorySource>)> {
        let sources = self
            .sources
            .iter()
            .map(|s| s.build().with_context(|| format!("source {}", s.name)))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let reference = self
            .reference
            .as_ref()
            .map(|s| s.build().with_context(|| format!("reference {}", s.name)))
            .transpose()?;
        Ok((sources, reference))
    }

    /// Override the request's common-grid spacing.
    pub fn with_resolution(mut self, resolution: Option<f64>) -> Self {
        if let (Some(resolution), Some(request)) = (resolution, self.request.as_mut()) {
            request.resolution = Some(resolution);
        }
        self
    }

    pub fn engine_config(&self) -> EngineConfig {
        self.config.clone().unwrap_or_else(EngineConfig::from_env)
    }
}
