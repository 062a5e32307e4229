//! Result payloads produced by a successful run.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{EngineError, Procedure};

/// Goodness-of-fit summary.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CalculationResults {
    /// Chi-squared per contrast.
    #[serde(default)]
    pub chi_values: Vec<f64>,
    /// Summed chi-squared over all contrasts.
    #[serde(default)]
    pub sum_chi: f64,
}

/// Point-estimate results.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Results {
    #[serde(default)]
    pub calculation: CalculationResults,
    /// Names of the fitted parameters.
    #[serde(default)]
    pub fit_names: Vec<String>,
    /// Best-fit parameter values, parallel to `fit_names`.
    #[serde(default)]
    pub fit_params: Vec<f64>,
    /// Reflectivity, SLD profiles and other curves, passed through untouched.
    #[serde(default)]
    pub curves: Value,
}

/// Results of a sampling procedure.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BayesResults {
    /// Best-fit estimate drawn from the samples.
    pub estimate: Results,
    /// Chains, posteriors and confidence intervals.
    pub samples: Value,
}

/// Outcome of a run, shaped by its procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ResultPayload {
    PointEstimate(Results),
    Sampled(BayesResults),
}

impl ResultPayload {
    /// The point estimate, available for both shapes.
    pub fn estimate(&self) -> &Results {
        match self {
            ResultPayload::PointEstimate(results) => results,
            ResultPayload::Sampled(bayes) => &bayes.estimate,
        }
    }

    pub fn sum_chi(&self) -> f64 {
        self.estimate().calculation.sum_chi
    }

    pub fn is_sampled(&self) -> bool {
        matches!(self, ResultPayload::Sampled(_))
    }
}

/// The terminal `Result` item: updated problem plus shaped results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Problem definition with fitted values written back.
    pub updated_problem: Value,
    pub payload: ResultPayload,
}

/// Raw engine output before shaping.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawOutput {
    pub problem: Value,
    pub results: Results,
    /// Sample data; required for Bayesian procedures.
    pub samples: Option<Value>,
}

/// Shapes raw engine output into the payload the procedure calls for.
///
/// # Errors
/// Returns [`EngineError::MissingOutput`] when a Bayesian procedure
/// produced no sample data.
pub fn make_results(procedure: Procedure, raw: RawOutput) -> Result<RunResult, EngineError> {
    let payload = if procedure.is_bayesian() {
        let samples = raw.samples.ok_or_else(|| {
            EngineError::MissingOutput(format!("{procedure} produced no sample data"))
        })?;
        ResultPayload::Sampled(BayesResults {
            estimate: raw.results,
            samples,
        })
    } else {
        ResultPayload::PointEstimate(raw.results)
    };

    Ok(RunResult {
        updated_problem: raw.problem,
        payload,
    })
}
