use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Dimension names used by the pipeline.
pub mod dim {
    pub const ECONOMY: &str = "economy";
    pub const HAZARD: &str = "hazard";
    pub const RP: &str = "rp";
    pub const INCOME_CAT: &str = "income_cat";
    pub const AFFECTED_CAT: &str = "affected_cat";
    pub const HELPED_CAT: &str = "helped_cat";

    /// Dimensions at which one event happens.
    pub const EVENT: [&str; 3] = [ECONOMY, HAZARD, RP];
}

/// Column names shared between the input tables and the computation stages.
pub mod col {
    // economy
    pub const AVG_PROD_K: &str = "avg_prod_k";
    pub const TAU_TAX: &str = "tau_tax";
    pub const T_REBUILD_K: &str = "T_rebuild_K";
    pub const RHO: &str = "rho";
    pub const INCOME_ELAST: &str = "income_elast";
    pub const MAX_INCREASED_SPENDING: &str = "max_increased_spending";
    pub const BORROW_ABI: &str = "borrow_abi";
    pub const PREPARE_SCALEUP: &str = "prepare_scaleup";
    pub const SHAREABLE: &str = "shareable";
    pub const POP: &str = "pop";
    pub const PROTECTION: &str = "protection";
    pub const GDP_PC_PP_NAT: &str = "gdp_pc_pp_nat";
    pub const GDP_PC_PP: &str = "gdp_pc_pp";
    pub const MACRO_MULTIPLIER: &str = "macro_multiplier";
    pub const PI: &str = "pi";

    // household category
    pub const K: &str = "k";
    pub const V: &str = "v";
    pub const GAMMA_SP: &str = "gamma_SP";
    pub const AXFIN: &str = "axfin";
    pub const N: &str = "n";
    pub const C: &str = "c";
    pub const SOCIAL: &str = "social";

    // hazard
    pub const FA: &str = "fa";
    pub const SHEW: &str = "shew";

    // shock
    pub const V_SHEW: &str = "v_shew";
    pub const DK: &str = "dk";
    pub const DK_EVENT: &str = "dk_event";
    pub const DC: &str = "dc";
    pub const DC_NPV_PRE: &str = "dc_npv_pre";

    // response
    pub const ERROR_INCL: &str = "error_incl";
    pub const ERROR_EXCL: &str = "error_excl";
    pub const MAX_AID: &str = "max_aid";
    pub const NEED: &str = "need";
    pub const AID: &str = "aid";
    pub const UNIF_AID: &str = "unif_aid";
    pub const HELP_RECEIVED: &str = "help_received";
    pub const HELP_FEE: &str = "help_fee";

    // welfare
    pub const DC_NPV_POST: &str = "dc_npv_post";
    pub const DW: &str = "dw";

    // event and economy outputs
    pub const D_K: &str = "dK";
    pub const D_K_TOT: &str = "dKtot";
    pub const DELTA_W: &str = "delta_W";
    pub const DELTA_W_TOT: &str = "delta_W_tot";
    pub const AVERAGE_AID_COST_PC: &str = "average_aid_cost_pc";
    pub const DW_PC_CURRENCY: &str = "dWpc_currency";
    pub const DW_TOT_CURRENCY: &str = "dWtot_currency";
    pub const RISK: &str = "risk";
    pub const RESILIENCE: &str = "resilience";
    pub const RISK_TO_ASSETS: &str = "risk_to_assets";

    /// Prefix for intermediate statistics carried into the economy table.
    pub const STAT_PREFIX: &str = "stat_";
}

/// Hazard name used when the caller supplies no hazard dimension.
pub const DEFAULT_HAZARD: &str = "default_hazard";

/// Return period of a hazard event, in years.
///
/// `Default` is the sentinel for inputs that carry no return-period
/// distribution: the exposure is treated as return-period independent and
/// the losses are annualised by the economy's protection instead.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnPeriod {
    Default,
    Years(f64),
}

impl ReturnPeriod {
    pub fn years(value: f64) -> ModelResult<Self> {
        if value.is_finite() && value > 0.0 {
            Ok(ReturnPeriod::Years(value))
        } else {
            Err(ModelError::InvalidReturnPeriod { value })
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, ReturnPeriod::Default)
    }

    pub fn as_years(&self) -> Option<f64> {
        match self {
            ReturnPeriod::Default => None,
            ReturnPeriod::Years(y) => Some(*y),
        }
    }
}

impl PartialEq for ReturnPeriod {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ReturnPeriod {}

impl Ord for ReturnPeriod {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (ReturnPeriod::Default, ReturnPeriod::Default) => Ordering::Equal,
            (ReturnPeriod::Default, ReturnPeriod::Years(_)) => Ordering::Less,
            (ReturnPeriod::Years(_), ReturnPeriod::Default) => Ordering::Greater,
            (ReturnPeriod::Years(a), ReturnPeriod::Years(b)) => a.total_cmp(b),
        }
    }
}

impl PartialOrd for ReturnPeriod {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for ReturnPeriod {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            ReturnPeriod::Default => 0u8.hash(state),
            ReturnPeriod::Years(y) => {
                1u8.hash(state);
                y.to_bits().hash(state);
            }
        }
    }
}

impl fmt::Display for ReturnPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnPeriod::Default => write!(f, "default_rp"),
            ReturnPeriod::Years(y) => write!(f, "{y}"),
        }
    }
}

/// One component of a row key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Period(ReturnPeriod),
    Name(String),
}

impl Label {
    pub fn name(s: impl Into<String>) -> Self {
        Label::Name(s.into())
    }

    pub fn as_period(&self) -> Option<ReturnPeriod> {
        match self {
            Label::Period(rp) => Some(*rp),
            Label::Name(_) => None,
        }
    }
}

impl From<&str> for Label {
    fn from(s: &str) -> Self {
        Label::Name(s.to_string())
    }
}

impl From<String> for Label {
    fn from(s: String) -> Self {
        Label::Name(s)
    }
}

impl From<ReturnPeriod> for Label {
    fn from(rp: ReturnPeriod) -> Self {
        Label::Period(rp)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Name(s) => write!(f, "{s}"),
            Label::Period(rp) => write!(f, "{rp}"),
        }
    }
}

/// Household income category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncomeCat {
    Poor,
    Nonpoor,
}

/// Whether a household is hit by the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AffectedCat {
    Affected,
    Unaffected,
}

/// Whether a household receives post-disaster support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HelpedCat {
    Helped,
    NotHelped,
}

impl IncomeCat {
    pub const ALL: [IncomeCat; 2] = [IncomeCat::Poor, IncomeCat::Nonpoor];

    pub fn as_str(&self) -> &'static str {
        match self {
            IncomeCat::Poor => "poor",
            IncomeCat::Nonpoor => "nonpoor",
        }
    }
}

impl AffectedCat {
    pub const ALL: [AffectedCat; 2] = [AffectedCat::Affected, AffectedCat::Unaffected];

    pub fn as_str(&self) -> &'static str {
        match self {
            AffectedCat::Affected => "a",
            AffectedCat::Unaffected => "na",
        }
    }
}

impl HelpedCat {
    pub const ALL: [HelpedCat; 2] = [HelpedCat::Helped, HelpedCat::NotHelped];

    pub fn as_str(&self) -> &'static str {
        match self {
            HelpedCat::Helped => "helped",
            HelpedCat::NotHelped => "not_helped",
        }
    }
}

impl From<IncomeCat> for Label {
    fn from(c: IncomeCat) -> Self {
        Label::Name(c.as_str().to_string())
    }
}

impl From<AffectedCat> for Label {
    fn from(c: AffectedCat) -> Self {
        Label::Name(c.as_str().to_string())
    }
}

impl From<HelpedCat> for Label {
    fn from(c: HelpedCat) -> Self {
        Label::Name(c.as_str().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn return_period_rejects_non_positive() {
        assert!(ReturnPeriod::years(0.0).is_err());
        assert!(ReturnPeriod::years(-5.0).is_err());
        assert!(ReturnPeriod::years(f64::NAN).is_err());
        assert_eq!(ReturnPeriod::years(10.0).unwrap(), ReturnPeriod::Years(10.0));
    }

    #[test]
    fn default_sorts_before_any_period() {
        let mut rps = vec![
            ReturnPeriod::Years(100.0),
            ReturnPeriod::Default,
            ReturnPeriod::Years(2.0),
        ];
        rps.sort();
        assert_eq!(
            rps,
            vec![ReturnPeriod::Default, ReturnPeriod::Years(2.0), ReturnPeriod::Years(100.0)]
        );
    }

    #[test]
    fn categorical_labels_sort_alphabetically() {
        let a: Label = AffectedCat::Affected.into();
        let na: Label = AffectedCat::Unaffected.into();
        assert!(a < na);
        let h: Label = HelpedCat::Helped.into();
        let nh: Label = HelpedCat::NotHelped.into();
        assert!(h < nh);
    }

    #[test]
    fn label_serializes_untagged() {
        let json = serde_json::to_string(&Label::name("poor")).unwrap();
        assert_eq!(json, r#""poor""#);
        let json = serde_json::to_string(&Label::Period(ReturnPeriod::Years(50.0))).unwrap();
        assert_eq!(json, r#"{"years":50.0}"#);
    }
}
