//! Optimisation and sampling procedures.

use serde::{Deserialize, Serialize};

/// The optimisation or sampling strategy selected for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Procedure {
    /// Single reflectivity calculation, no fitting.
    #[default]
    Calculate,
    /// Nelder-Mead simplex.
    Simplex,
    /// Differential evolution.
    #[serde(rename = "de")]
    DifferentialEvolution,
    /// Nested sampling.
    #[serde(rename = "ns")]
    NestedSampling,
    /// DREAM Markov chain Monte Carlo.
    Dream,
}

impl Procedure {
    /// All procedures, in menu order.
    pub const ALL: [Procedure; 5] = [
        Procedure::Calculate,
        Procedure::Simplex,
        Procedure::DifferentialEvolution,
        Procedure::NestedSampling,
        Procedure::Dream,
    ];

    /// Identifier used on the wire and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            Procedure::Calculate => "calculate",
            Procedure::Simplex => "simplex",
            Procedure::DifferentialEvolution => "de",
            Procedure::NestedSampling => "ns",
            Procedure::Dream => "dream",
        }
    }

    /// Whether the procedure produces a sampled (Bayesian) result.
    pub fn is_bayesian(self) -> bool {
        matches!(self, Procedure::NestedSampling | Procedure::Dream)
    }

    /// Whether engine messages carry a running chi-squared during the fit.
    pub fn reports_live_fit(self) -> bool {
        matches!(self, Procedure::Simplex | Procedure::DifferentialEvolution)
    }

    /// Human-readable description.
    pub fn description(self) -> &'static str {
        match self {
            Procedure::Calculate => "Calculate reflectivity without fitting",
            Procedure::Simplex => "Nelder-Mead simplex optimisation",
            Procedure::DifferentialEvolution => "Differential evolution optimisation",
            Procedure::NestedSampling => "Nested sampling (Bayesian)",
            Procedure::Dream => "DREAM Markov chain Monte Carlo (Bayesian)",
        }
    }
}

impl std::fmt::Display for Procedure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Procedure {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Procedure::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown procedure: {s}"))
    }
}
