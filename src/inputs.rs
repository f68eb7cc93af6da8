use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::table::Frame;
use crate::types::{IncomeCat, Label, ReturnPeriod, col, dim};

/// Economy-level (macro) attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomyRecord {
    pub name: String,
    /// Average productivity of capital.
    pub avg_prod_k: f64,
    pub tau_tax: f64,
    /// Years to rebuild 95 % of destroyed capital.
    #[serde(rename = "T_rebuild_K")]
    pub t_rebuild_k: f64,
    /// Discount rate.
    pub rho: f64,
    pub income_elast: f64,
    pub max_increased_spending: f64,
    pub borrow_abi: f64,
    pub prepare_scaleup: f64,
    /// Fraction of losses the support is sized to cover.
    pub shareable: f64,
    pub pop: f64,
    /// Return period below which losses are absorbed by protection.
    pub protection: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gdp_pc_pp_nat: Option<f64>,
}

/// Household-category attributes, one per (economy, income category).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub economy: String,
    pub income_cat: IncomeCat,
    /// Capital per person.
    pub k: f64,
    /// Vulnerability: fraction of exposed capital lost.
    pub v: f64,
    /// Share of social transfers received.
    #[serde(rename = "gamma_SP")]
    pub gamma_sp: f64,
    /// Financial inclusion.
    pub axfin: f64,
    /// Share of the economy's population.
    pub n: f64,
    /// Exposure, used when no hazard data is supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fa: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shew: Option<f64>,
}

/// Hazard-ratio observation. Optional key parts must be set on all records
/// or on none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardRecord {
    pub economy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hazard: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub income_cat: Option<IncomeCat>,
    pub fa: f64,
    /// Early-warning coverage.
    #[serde(default)]
    pub shew: f64,
    /// Hazard-specific values for any economy or category column (e.g. `v`).
    #[serde(flatten)]
    pub overrides: BTreeMap<String, f64>,
}

/// The three canonical input tables.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInputs {
    /// Keyed by `economy`.
    pub economies: Frame,
    /// Keyed by `economy × income_cat`.
    pub categories: Frame,
    /// Keyed by `economy` plus any of `hazard`, `rp`, `income_cat`.
    pub hazards: Option<Frame>,
}

fn optional_column<T>(
    name: &str,
    records: &[T],
    get: impl Fn(&T) -> Option<f64>,
) -> ModelResult<Option<Vec<f64>>> {
    let values: Vec<Option<f64>> = records.iter().map(get).collect();
    if values.iter().all(Option::is_none) {
        return Ok(None);
    }
    values
        .into_iter()
        .map(|v| v.ok_or_else(|| ModelError::MissingColumn { name: name.to_string() }))
        .collect::<ModelResult<Vec<f64>>>()
        .map(Some)
}

fn all_or_none<T>(field: &str, records: &[T], present: impl Fn(&T) -> bool) -> ModelResult<bool> {
    let count = records.iter().filter(|r| present(r)).count();
    if count == 0 {
        Ok(false)
    } else if count == records.len() {
        Ok(true)
    } else {
        Err(ModelError::InconsistentHazardRecords {
            detail: format!("'{field}' set on {count} of {} records", records.len()),
        })
    }
}

impl ModelInputs {
    pub fn new(economies: Frame, categories: Frame, hazards: Option<Frame>) -> ModelResult<Self> {
        if economies.dims() != [dim::ECONOMY] {
            return Err(ModelError::DimensionMismatch {
                left: vec![dim::ECONOMY.to_string()],
                right: economies.dims().to_vec(),
            });
        }
        if categories.dims() != [dim::ECONOMY, dim::INCOME_CAT] {
            return Err(ModelError::DimensionMismatch {
                left: vec![dim::ECONOMY.to_string(), dim::INCOME_CAT.to_string()],
                right: categories.dims().to_vec(),
            });
        }
        if let Some(h) = &hazards {
            h.dim_index(dim::ECONOMY)?;
            let allowed = [dim::ECONOMY, dim::HAZARD, dim::RP, dim::INCOME_CAT];
            if let Some(extra) = h.dims().iter().find(|d| !allowed.contains(&d.as_str())) {
                return Err(ModelError::DimensionMismatch {
                    left: allowed.iter().map(|d| d.to_string()).collect(),
                    right: vec![extra.clone()],
                });
            }
        }
        Ok(ModelInputs { economies, categories, hazards })
    }

    pub fn from_records(
        economies: &[EconomyRecord],
        categories: &[CategoryRecord],
        hazards: Option<&[HazardRecord]>,
    ) -> ModelResult<Self> {
        let economies = economy_frame(economies)?;
        let categories = category_frame(categories)?;
        let hazards = match hazards {
            Some(h) if !h.is_empty() => Some(hazard_frame(h)?),
            _ => None,
        };
        Self::new(economies, categories, hazards)
    }
}

pub fn economy_frame(records: &[EconomyRecord]) -> ModelResult<Frame> {
    let mut names = vec![
        col::AVG_PROD_K,
        col::TAU_TAX,
        col::T_REBUILD_K,
        col::RHO,
        col::INCOME_ELAST,
        col::MAX_INCREASED_SPENDING,
        col::BORROW_ABI,
        col::PREPARE_SCALEUP,
        col::SHAREABLE,
        col::POP,
        col::PROTECTION,
    ];
    let nat = optional_column(col::GDP_PC_PP_NAT, records, |r| r.gdp_pc_pp_nat)?;
    if nat.is_some() {
        names.push(col::GDP_PC_PP_NAT);
    }
    let rows = records.iter().enumerate().map(|(i, r)| {
        let mut values = vec![
            r.avg_prod_k,
            r.tau_tax,
            r.t_rebuild_k,
            r.rho,
            r.income_elast,
            r.max_increased_spending,
            r.borrow_abi,
            r.prepare_scaleup,
            r.shareable,
            r.pop,
            r.protection,
        ];
        if let Some(nat) = &nat {
            values.push(nat[i]);
        }
        (vec![Label::name(&r.name)], values)
    });
    Frame::from_rows(&[dim::ECONOMY], &names, rows)
}

pub fn category_frame(records: &[CategoryRecord]) -> ModelResult<Frame> {
    let mut names = vec![col::K, col::V, col::GAMMA_SP, col::AXFIN, col::N];
    let fa = optional_column(col::FA, records, |r| r.fa)?;
    let shew = optional_column(col::SHEW, records, |r| r.shew)?;
    if fa.is_some() {
        names.push(col::FA);
    }
    if shew.is_some() {
        names.push(col::SHEW);
    }
    let rows = records.iter().enumerate().map(|(i, r)| {
        let mut values = vec![r.k, r.v, r.gamma_sp, r.axfin, r.n];
        values.extend(fa.as_ref().map(|c| c[i]));
        values.extend(shew.as_ref().map(|c| c[i]));
        (vec![Label::name(&r.economy), Label::from(r.income_cat)], values)
    });
    Frame::from_rows(&[dim::ECONOMY, dim::INCOME_CAT], &names, rows)
}

pub fn hazard_frame(records: &[HazardRecord]) -> ModelResult<Frame> {
    let has_hazard = all_or_none(dim::HAZARD, records, |r| r.hazard.is_some())?;
    let has_rp = all_or_none(dim::RP, records, |r| r.rp.is_some())?;
    let has_income = all_or_none(dim::INCOME_CAT, records, |r| r.income_cat.is_some())?;

    let override_names: BTreeSet<&str> =
        records.iter().flat_map(|r| r.overrides.keys().map(String::as_str)).collect();
    for name in &override_names {
        if *name == col::FA || *name == col::SHEW {
            continue;
        }
        all_or_none(name, records, |r| r.overrides.contains_key(*name))?;
    }

    let mut dims = vec![dim::ECONOMY];
    if has_hazard {
        dims.push(dim::HAZARD);
    }
    if has_rp {
        dims.push(dim::RP);
    }
    if has_income {
        dims.push(dim::INCOME_CAT);
    }
    let mut names = vec![col::FA, col::SHEW];
    names.extend(override_names.iter().copied());

    let mut rows = Vec::with_capacity(records.len());
    for r in records {
        let mut key = vec![Label::name(&r.economy)];
        if let Some(h) = &r.hazard {
            key.push(Label::name(h));
        }
        if let Some(rp) = r.rp {
            key.push(Label::Period(ReturnPeriod::years(rp)?));
        }
        if let Some(c) = r.income_cat {
            key.push(Label::from(c));
        }
        let mut values = vec![r.fa, r.shew];
        values.extend(override_names.iter().map(|n| r.overrides.get(*n).copied().unwrap_or(0.0)));
        rows.push((key, values));
    }
    Frame::from_rows(&dims, &names, rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hazard(economy: &str, rp: Option<f64>) -> HazardRecord {
        HazardRecord {
            economy: economy.to_string(),
            hazard: Some("flood".to_string()),
            rp,
            income_cat: None,
            fa: 0.1,
            shew: 0.0,
            overrides: BTreeMap::new(),
        }
    }

    #[test]
    fn hazard_dims_follow_present_fields() {
        let f = hazard_frame(&[hazard("A", Some(10.0)), hazard("A", Some(100.0))]).unwrap();
        assert_eq!(f.dims(), &["economy".to_string(), "hazard".to_string(), "rp".to_string()]);
        assert_eq!(f.len(), 2);

        let f = hazard_frame(&[hazard("A", None)]).unwrap();
        assert!(!f.has_dim("rp"));
    }

    #[test]
    fn hazard_fields_must_be_all_or_none() {
        let err = hazard_frame(&[hazard("A", Some(10.0)), hazard("B", None)]).unwrap_err();
        assert!(matches!(err, ModelError::InconsistentHazardRecords { .. }));
    }

    #[test]
    fn hazard_rejects_invalid_return_period() {
        let err = hazard_frame(&[hazard("A", Some(0.0))]).unwrap_err();
        assert!(matches!(err, ModelError::InvalidReturnPeriod { .. }));
    }

    #[test]
    fn hazard_overrides_become_columns() {
        let mut h = hazard("A", Some(10.0));
        h.overrides.insert("v".to_string(), 0.5);
        let f = hazard_frame(&[h]).unwrap();
        assert!(f.has_column("v"));
        assert_eq!(f.column("v").unwrap(), &[0.5]);
    }

    #[test]
    fn hazard_record_parses_overrides_from_json() {
        let h: HazardRecord = serde_json::from_str(
            r#"{"economy":"A","hazard":"wind","rp":50,"fa":0.2,"shew":0.5,"v":0.4}"#,
        )
        .unwrap();
        assert_eq!(h.rp, Some(50.0));
        assert_eq!(h.overrides.get("v"), Some(&0.4));
        assert!(!h.overrides.contains_key("fa"));
    }

    #[test]
    fn category_fa_must_be_all_or_none() {
        let rec = |fa: Option<f64>| CategoryRecord {
            economy: "A".to_string(),
            income_cat: IncomeCat::Poor,
            k: 1.0,
            v: 0.5,
            gamma_sp: 1.0,
            axfin: 0.1,
            n: 0.2,
            fa,
            shew: None,
        };
        let mut nonpoor = rec(None);
        nonpoor.income_cat = IncomeCat::Nonpoor;
        let err = category_frame(&[rec(Some(0.1)), nonpoor]).unwrap_err();
        assert!(matches!(err, ModelError::MissingColumn { .. }));
    }

    #[test]
    fn inputs_reject_wrong_dimensions() {
        let econ = Frame::new(&["country"]).unwrap();
        let cats = Frame::new(&["economy", "income_cat"]).unwrap();
        assert!(ModelInputs::new(econ, cats, None).is_err());
    }
}
