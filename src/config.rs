use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::types::col;

/// Who gets help: sets the inclusion and exclusion error rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Targeting {
    /// No errors.
    Perfect,
    /// Errors from the economy's preparedness to scale up.
    Data,
    /// 33 % inclusion-equivalent and exclusion error.
    #[serde(rename = "x33")]
    X33,
    /// Inclusion error only.
    Incl,
    /// Exclusion error only.
    Excl,
}

/// How large the post-disaster budget is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Budget {
    Data,
    UnifPoor,
    OnePerAffected,
    One,
    #[serde(rename = "x10")]
    X10,
    #[serde(rename = "x05")]
    X05,
    #[serde(rename = "max01")]
    Max01,
    #[serde(rename = "max05")]
    Max05,
    Unlimited,
}

/// How the budget is divided between helped households.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distribution {
    No,
    UnifAll,
    UnifPoor,
    One,
    Hundred,
    Prop,
    Perfect,
    PropNonpoor,
}

/// Who pays for the support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Financing {
    Tax,
    InsurancePremium,
}

/// Per-household loss used to size needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossMeasure {
    /// Capital loss (`dk`).
    Dk,
    /// Immediate consumption loss (`dc`).
    Dc,
    /// NPV consumption loss before any response (`dc_npv_pre`).
    DcNpvPre,
}

impl LossMeasure {
    pub fn column(&self) -> &'static str {
        match self {
            LossMeasure::Dk => col::DK,
            LossMeasure::Dc => col::DC,
            LossMeasure::DcNpvPre => col::DC_NPV_PRE,
        }
    }
}

macro_rules! option_spellings {
    ($ty:ident, $axis:literal, { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $s),+
                }
            }
        }

        impl FromStr for $ty {
            type Err = ModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok($ty::$variant),)+
                    other => Err(ModelError::UnknownOption { axis: $axis, value: other.to_string() }),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

option_spellings!(Targeting, "targeting", {
    Perfect => "perfect",
    Data => "data",
    X33 => "x33",
    Incl => "incl",
    Excl => "excl",
});

option_spellings!(Budget, "budget", {
    Data => "data",
    UnifPoor => "unif_poor",
    OnePerAffected => "one_per_affected",
    One => "one",
    X10 => "x10",
    X05 => "x05",
    Max01 => "max01",
    Max05 => "max05",
    Unlimited => "unlimited",
});

option_spellings!(Distribution, "distribution", {
    No => "no",
    UnifAll => "unif_all",
    UnifPoor => "unif_poor",
    One => "one",
    Hundred => "hundred",
    Prop => "prop",
    Perfect => "perfect",
    PropNonpoor => "prop_nonpoor",
});

option_spellings!(Financing, "financing", {
    Tax => "tax",
    InsurancePremium => "insurance_premium",
});

option_spellings!(LossMeasure, "loss measure", {
    Dk => "dk",
    Dc => "dc",
    DcNpvPre => "dc_npv_pre",
});

/// One point on the four policy axes. Axes left out of a JSON config take
/// their baseline value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyOptions {
    pub targeting: Targeting,
    pub budget: Budget,
    pub distribution: Distribution,
    pub financing: Financing,
}

impl PolicyOptions {
    /// Support observed in the data: the baseline every insurance scheme tops up.
    pub const BASELINE: PolicyOptions = PolicyOptions {
        targeting: Targeting::Data,
        budget: Budget::Data,
        distribution: Distribution::UnifPoor,
        financing: Financing::Tax,
    };
}

impl Default for PolicyOptions {
    fn default() -> Self {
        Self::BASELINE
    }
}

fn default_share_insured() -> f64 {
    0.25
}

fn default_fraction_inside() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_loss_measure() -> LossMeasure {
    LossMeasure::Dk
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(flatten)]
    pub policy: PolicyOptions,
    #[serde(default = "default_loss_measure")]
    pub loss_measure: LossMeasure,
    /// Reference consumption for marginal welfare: local GDP per capita when
    /// true, the economy's `gdp_pc_pp_nat` otherwise.
    #[serde(default = "default_true")]
    pub is_local_welfare: bool,
    /// Return the full per-category-per-event table.
    #[serde(default)]
    pub return_iah: bool,
    /// Carry aggregated per-row statistics into the economy table.
    #[serde(default)]
    pub return_stats: bool,
    /// Share of the support paid domestically.
    #[serde(default = "default_fraction_inside")]
    pub fraction_inside: f64,
    /// Shareable loss fraction under an insurance scheme.
    #[serde(default = "default_share_insured")]
    pub share_insured: f64,
    /// Share of losses avoided by households reached by early warning.
    pub early_warning_efficacy: f64,
}

impl ModelConfig {
    /// There is no default early-warning efficacy; callers must pick one.
    pub fn new(early_warning_efficacy: f64) -> Self {
        ModelConfig {
            policy: PolicyOptions::BASELINE,
            loss_measure: LossMeasure::Dk,
            is_local_welfare: true,
            return_iah: false,
            return_stats: false,
            fraction_inside: 1.0,
            share_insured: default_share_insured(),
            early_warning_efficacy,
        }
    }

    pub fn with_policy(mut self, policy: PolicyOptions) -> Self {
        self.policy = policy;
        self
    }

    pub fn validate(&self) -> ModelResult<()> {
        for (name, value) in [
            ("fraction_inside", self.fraction_inside),
            ("share_insured", self.share_insured),
            ("early_warning_efficacy", self.early_warning_efficacy),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ModelError::OutOfUnitRange { name, value });
            }
        }
        Ok(())
    }
}
