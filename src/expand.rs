//! From the three input tables to per-event tables.
//!
//! Global preparation ([`prepare`]) runs once over all economies: incomplete
//! rows are dropped, hazard data is defaulted or interpolated onto one
//! return-period grid, and the economies present in every table are kept.
//! Everything after that ([`derive_consumption`], [`macro_multiplier`],
//! [`expand_events`]) only ever looks at one economy's rows, so callers may
//! run it per economy.

use std::collections::BTreeSet;

use log::{debug, warn};

use crate::error::{ModelError, ModelResult};
use crate::inputs::ModelInputs;
use crate::interpolate::interpolate_rps;
use crate::table::{Dimension, Frame};
use crate::types::{DEFAULT_HAZARD, Label, ReturnPeriod, col, dim};

/// Share of capital still missing once reconstruction is considered done.
const REBUILT_REMAINDER: f64 = 0.05;

/// Loading added to the transfer share for financial inclusion.
const AXFIN_LOADING: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct Prepared {
    pub economies: Frame,
    pub categories: Frame,
    /// Hazard ratios with `hazard` and `rp` dimensions, on a shared grid.
    pub hazards: Frame,
    pub dropped_economies: Vec<String>,
}

/// The event-level and category-event-level tables for a set of economies.
#[derive(Debug, Clone)]
pub struct EventTables {
    /// Keyed by `economy × hazard × rp`.
    pub macro_event: Frame,
    /// Keyed by `economy × hazard × rp × income_cat`.
    pub cats_event: Frame,
}

fn drop_incomplete(frame: &Frame, table: &str) -> ModelResult<Frame> {
    let (kept, dropped) = frame.drop_incomplete()?;
    for key in &dropped {
        let parts: Vec<String> = key.iter().map(Label::to_string).collect();
        warn!("dropping incomplete {table} row ({})", parts.join(", "));
    }
    Ok(kept)
}

fn economy_labels(frame: &Frame) -> ModelResult<BTreeSet<Label>> {
    Ok(frame.labels(dim::ECONOMY)?.into_iter().cloned().collect())
}

/// Reject economies the model is undefined for.
pub fn validate_economies(economies: &Frame) -> ModelResult<()> {
    let protection = economies.column(col::PROTECTION)?;
    let elasticity = economies.column(col::INCOME_ELAST)?;
    for (i, key) in economies.keys().iter().enumerate() {
        let economy = key[0].to_string();
        if protection[i] < 0.0 {
            return Err(ModelError::NegativeProtection { economy, protection: protection[i] });
        }
        if elasticity[i] == 1.0 {
            return Err(ModelError::UnitElasticity { economy });
        }
    }
    Ok(())
}

/// Hazard ratios with both event dimensions present.
///
/// No hazard table at all means one sentinel hazard per economy under the
/// default return period, with no columns: exposure then comes from the
/// category table. A missing `hazard` or `rp` dimension is broadcast over
/// the matching sentinel. Otherwise exposure is interpolated onto the grid
/// of observed return periods and economy protections.
pub fn default_hazards(hazards: Option<&Frame>, economies: &Frame) -> ModelResult<Frame> {
    let Some(hazards) = hazards else {
        let rows = economies.keys().iter().map(|k| {
            (
                vec![k[0].clone(), Label::name(DEFAULT_HAZARD), Label::Period(ReturnPeriod::Default)],
                Vec::new(),
            )
        });
        return Frame::from_rows(&dim::EVENT, &[], rows);
    };

    let mut hazards = hazards.clone();
    if !hazards.has_dim(dim::HAZARD) {
        hazards = hazards.broadcast(&Dimension::new(dim::HAZARD, [DEFAULT_HAZARD])?)?;
    }
    if !hazards.has_dim(dim::RP) {
        return hazards.broadcast(&Dimension::new(dim::RP, [ReturnPeriod::Default])?);
    }
    interpolate_rps(&hazards, economies.column(col::PROTECTION)?)
}

pub fn prepare(inputs: &ModelInputs) -> ModelResult<Prepared> {
    let economies = drop_incomplete(&inputs.economies, "economy")?;
    let categories = drop_incomplete(&inputs.categories, "category")?;
    let hazards = match &inputs.hazards {
        Some(h) => Some(drop_incomplete(h, "hazard")?).filter(|h| !h.is_empty()),
        None => None,
    };

    let mut common = economy_labels(&economies)?;
    let mut seen = common.clone();
    let mut tables = vec![&categories];
    tables.extend(hazards.as_ref());
    for table in tables {
        let labels = economy_labels(table)?;
        common = common.intersection(&labels).cloned().collect();
        seen.extend(labels);
    }
    let dropped_economies: Vec<String> = seen.difference(&common).map(Label::to_string).collect();
    if !dropped_economies.is_empty() {
        warn!(
            "dropping {} economies missing from at least one input table: {}",
            dropped_economies.len(),
            dropped_economies.join(", ")
        );
    }

    let hazards = default_hazards(hazards.as_ref(), &economies)?;
    let economies = economies.retain_labels(dim::ECONOMY, &common)?;
    validate_economies(&economies)?;
    let categories = categories.retain_labels(dim::ECONOMY, &common)?;
    let hazards = hazards.retain_labels(dim::ECONOMY, &common)?;
    debug!(
        "prepared {} economies, {} category rows, {} hazard rows",
        economies.len(),
        categories.len(),
        hazards.len()
    );

    Ok(Prepared { economies, categories, hazards, dropped_economies })
}

/// Consumption per category: net-of-tax capital income plus the category's
/// share of redistributed tax revenue.
fn consumption(economies: &Frame, categories: &Frame) -> ModelResult<Vec<f64>> {
    let tau = categories.align(economies, col::TAU_TAX)?;
    let apk = categories.align(economies, col::AVG_PROD_K)?;
    let gdp = categories.align(economies, col::GDP_PC_PP)?;
    let k = categories.column(col::K)?;
    let gamma = categories.column(col::GAMMA_SP)?;
    Ok((0..categories.len())
        .map(|i| (1.0 - tau[i]) * apk[i] * k[i] + gamma[i] * tau[i] * gdp[i])
        .collect())
}

/// GDP per capita, consumption, and one pass of the tax/transfer
/// decomposition with the financial-inclusion loading.
///
/// Consumption is computed, the transfer share re-derived from it, and
/// consumption computed once more. The pass is not iterated to a fixed point.
pub fn derive_consumption(economies: &Frame, categories: &Frame) -> ModelResult<(Frame, Frame)> {
    let mut economies = economies.clone();
    let mut categories = categories.clone();

    let n = categories.column(col::N)?.to_vec();
    let k_bar = categories.sum_onto(&economies, &n, categories.column(col::K)?)?;
    let gdp: Vec<f64> = economies
        .column(col::AVG_PROD_K)?
        .iter()
        .zip(&k_bar)
        .map(|(apk, k)| apk * k)
        .collect();
    economies.set_column(col::GDP_PC_PP, gdp)?;

    let c = consumption(&economies, &categories)?;
    let gdp = categories.align(&economies, col::GDP_PC_PP)?;
    let tau = categories.align(&economies, col::TAU_TAX)?;
    let gamma = categories.column(col::GAMMA_SP)?;
    let axfin = categories.column(col::AXFIN)?;
    let social: Vec<f64> = (0..categories.len())
        .map(|i| gamma[i] * gdp[i] * tau[i] / c[i] + AXFIN_LOADING * axfin[i])
        .collect();

    let social_c: Vec<f64> = social.iter().zip(&c).map(|(s, c)| s * c).collect();
    let transfers = categories.sum_onto(&economies, &n, &social_c)?;
    let income = categories.sum_onto(&economies, &n, &c)?;
    let tau: Vec<f64> = transfers.iter().zip(&income).map(|(t, y)| t / y).collect();
    let transfers_row = categories.spread(&economies, &transfers)?;
    let gamma: Vec<f64> = social_c.iter().zip(&transfers_row).map(|(sc, t)| sc / t).collect();

    economies.set_column(col::TAU_TAX, tau)?;
    categories.set_column(col::GAMMA_SP, gamma)?;
    categories.set_column(col::SOCIAL, social)?;
    let c = consumption(&economies, &categories)?;
    categories.set_column(col::C, c)?;

    Ok((economies, categories))
}

/// `(avg_prod_k + r) / (rho + r)` with `r` the rate that rebuilds 95 % of
/// lost capital in `T_rebuild_K` years.
pub fn macro_multiplier(economies: &Frame) -> ModelResult<Vec<f64>> {
    let apk = economies.column(col::AVG_PROD_K)?;
    let rho = economies.column(col::RHO)?;
    let rebuild = economies.column(col::T_REBUILD_K)?;
    Ok((0..economies.len())
        .map(|i| {
            let recons_rate = (1.0 / REBUILT_REMAINDER).ln() / rebuild[i];
            (apk[i] + recons_rate) / (rho[i] + recons_rate)
        })
        .collect())
}

/// Broadcast economy and category attributes onto the event key and overlay
/// the hazard columns.
pub fn expand_events(
    economies: &Frame,
    categories: &Frame,
    hazards: &Frame,
    early_warning_efficacy: f64,
) -> ModelResult<EventTables> {
    let events = hazards.index_on(&dim::EVENT)?;

    let mut macro_event = events.clone();
    for name in economies.column_names() {
        macro_event.set_column(name, macro_event.align(economies, name)?)?;
    }
    macro_event.fill_column(col::PI, early_warning_efficacy);
    let replaced = macro_event.overlay(hazards)?;
    if !replaced.is_empty() {
        debug!("hazard data replaced economy columns: {}", replaced.join(", "));
    }

    let mut cats_event = events
        .broadcast(&categories.dimension(dim::INCOME_CAT)?)?
        .restrict_to(&categories.index_on(&[dim::ECONOMY, dim::INCOME_CAT])?)?;
    for name in categories.column_names() {
        cats_event.set_column(name, cats_event.align(categories, name)?)?;
    }
    for name in [col::FA, col::SHEW] {
        if cats_event.has_column(name) {
            continue;
        }
        if hazards.has_column(name) {
            cats_event.set_column(name, cats_event.align(hazards, name)?)?;
        } else if name == col::SHEW {
            cats_event.fill_column(name, 0.0);
        } else {
            return Err(ModelError::MissingColumn { name: name.to_string() });
        }
    }
    let replaced = cats_event.overlay(hazards)?;
    if !replaced.is_empty() {
        debug!("hazard data replaced category columns: {}", replaced.join(", "));
    }

    Ok(EventTables { macro_event, cats_event })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inputs::{CategoryRecord, EconomyRecord, HazardRecord};
    use crate::types::IncomeCat;

    fn economy(name: &str) -> EconomyRecord {
        EconomyRecord {
            name: name.to_string(),
            avg_prod_k: 0.25,
            tau_tax: 0.2,
            t_rebuild_k: 3.0,
            rho: 0.06,
            income_elast: 1.5,
            max_increased_spending: 0.05,
            borrow_abi: 0.5,
            prepare_scaleup: 0.4,
            shareable: 0.8,
            pop: 1_000_000.0,
            protection: 5.0,
            gdp_pc_pp_nat: None,
        }
    }

    fn category(economy: &str, cat: IncomeCat, n: f64, k: f64) -> CategoryRecord {
        CategoryRecord {
            economy: economy.to_string(),
            income_cat: cat,
            k,
            v: 0.4,
            gamma_sp: 1.0,
            axfin: 0.2,
            n,
            fa: Some(0.1),
            shew: Some(0.0),
        }
    }

    fn inputs(hazards: Option<&[HazardRecord]>) -> ModelInputs {
        ModelInputs::from_records(
            &[economy("A"), economy("B")],
            &[
                category("A", IncomeCat::Poor, 0.2, 1000.0),
                category("A", IncomeCat::Nonpoor, 0.8, 5000.0),
                category("B", IncomeCat::Poor, 0.2, 1000.0),
                category("B", IncomeCat::Nonpoor, 0.8, 5000.0),
            ],
            hazards,
        )
        .unwrap()
    }

    #[test]
    fn missing_hazards_default_to_sentinel_event() {
        let p = prepare(&inputs(None)).unwrap();
        assert_eq!(p.hazards.len(), 2);
        assert_eq!(p.hazards.dims(), &["economy", "hazard", "rp"]);
        let rp = p.hazards.labels("rp").unwrap();
        assert!(rp.iter().all(|l| **l == Label::Period(ReturnPeriod::Default)));
        assert!(p.dropped_economies.is_empty());
    }

    #[test]
    fn economies_missing_from_any_table_are_dropped() {
        let hazards = [HazardRecord {
            economy: "A".to_string(),
            hazard: Some("flood".to_string()),
            rp: Some(10.0),
            income_cat: None,
            fa: 0.1,
            shew: 0.0,
            overrides: Default::default(),
        }];
        let p = prepare(&inputs(Some(&hazards))).unwrap();
        assert_eq!(p.dropped_economies, vec!["B".to_string()]);
        assert_eq!(p.economies.len(), 1);
        assert_eq!(p.categories.len(), 2);
        // rp 10 plus protection 5
        assert_eq!(p.hazards.len(), 2);
    }

    #[test]
    fn unit_elasticity_is_rejected() {
        let mut e = economy("A");
        e.income_elast = 1.0;
        let inputs = ModelInputs::from_records(
            &[e],
            &[category("A", IncomeCat::Poor, 1.0, 1000.0)],
            None,
        )
        .unwrap();
        assert!(matches!(prepare(&inputs).unwrap_err(), ModelError::UnitElasticity { .. }));
    }

    #[test]
    fn derived_consumption_matches_closed_form() {
        let p = prepare(&inputs(None)).unwrap();
        let (econ, cats) = derive_consumption(&p.economies, &p.categories).unwrap();

        let k_bar = 0.2 * 1000.0 + 0.8 * 5000.0;
        let gdp = 0.25 * k_bar;
        assert!((econ.column(col::GDP_PC_PP).unwrap()[0] - gdp).abs() < 1e-9);

        // first pass
        let c0 = |k: f64| 0.8 * 0.25 * k + 1.0 * 0.2 * gdp;
        let social = |k: f64| 1.0 * gdp * 0.2 / c0(k) + 0.1 * 0.2;
        let transfers = 0.2 * social(1000.0) * c0(1000.0) + 0.8 * social(5000.0) * c0(5000.0);
        let income = 0.2 * c0(1000.0) + 0.8 * c0(5000.0);
        let tau = transfers / income;
        assert!((econ.column(col::TAU_TAX).unwrap()[0] - tau).abs() < 1e-12);

        // rows sorted: nonpoor before poor
        let gamma_poor = social(1000.0) * c0(1000.0) / transfers;
        let c_poor = (1.0 - tau) * 0.25 * 1000.0 + gamma_poor * tau * gdp;
        let poor = [Label::name("A"), Label::from(IncomeCat::Poor)];
        assert!((cats.get(&poor, col::GAMMA_SP).unwrap() - gamma_poor).abs() < 1e-12);
        assert!((cats.get(&poor, col::C).unwrap() - c_poor).abs() < 1e-9);
    }

    #[test]
    fn transfers_stay_budget_balanced_after_decomposition() {
        let p = prepare(&inputs(None)).unwrap();
        let (_, cats) = derive_consumption(&p.economies, &p.categories).unwrap();
        let a = cats.mask("economy", &Label::name("A")).unwrap();
        let a = cats.filter(&a).unwrap();
        let n = a.column(col::N).unwrap();
        let gamma = a.column(col::GAMMA_SP).unwrap();
        let share: f64 = n.iter().zip(gamma).map(|(n, g)| n * g).sum();
        assert!((share - 1.0).abs() < 1e-12);
    }

    #[test]
    fn macro_multiplier_closed_form() {
        let p = prepare(&inputs(None)).unwrap();
        let mm = macro_multiplier(&p.economies).unwrap();
        let r = 20f64.ln() / 3.0;
        assert!((mm[0] - (0.25 + r) / (0.06 + r)).abs() < 1e-12);
    }

    #[test]
    fn hazard_columns_overlay_category_columns() {
        let mut h = HazardRecord {
            economy: "A".to_string(),
            hazard: Some("flood".to_string()),
            rp: None,
            income_cat: None,
            fa: 0.3,
            shew: 0.5,
            overrides: Default::default(),
        };
        h.overrides.insert("v".to_string(), 0.9);
        let p = prepare(&inputs(Some(&[h]))).unwrap();
        let (econ, cats) = derive_consumption(&p.economies, &p.categories).unwrap();
        let t = expand_events(&econ, &cats, &p.hazards, 0.2).unwrap();

        assert_eq!(t.macro_event.len(), 1);
        assert_eq!(t.cats_event.len(), 2);
        assert_eq!(t.cats_event.column(col::FA).unwrap(), &[0.3, 0.3]);
        assert_eq!(t.cats_event.column(col::V).unwrap(), &[0.9, 0.9]);
        assert_eq!(t.macro_event.column(col::PI).unwrap(), &[0.2]);
        assert_eq!(t.macro_event.column(col::PROTECTION).unwrap(), &[5.0]);
    }
}
