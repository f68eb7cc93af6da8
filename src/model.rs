use std::collections::BTreeMap;

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::average::average_over_rp;
use crate::config::ModelConfig;
use crate::error::{ModelError, ModelResult};
use crate::expand::{EventTables, derive_consumption, expand_events, macro_multiplier, prepare};
use crate::indicators::risk_and_resilience;
use crate::inputs::ModelInputs;
use crate::interpolate::observed_return_periods;
use crate::response::{Response, post_disaster_support};
use crate::shock::compute_shock;
use crate::table::Frame;
use crate::types::{Label, col, dim};
use crate::welfare::apply_welfare_losses;

/// Headline results for one economy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EconomyOutcome {
    pub economy: String,
    pub gdp_pc_pp: f64,
    pub macro_multiplier: f64,
    /// Expected annual capital loss per capita.
    #[serde(rename = "dK")]
    pub dk: f64,
    #[serde(rename = "dKtot")]
    pub dk_tot: f64,
    /// Expected annual welfare loss per capita, in utility units.
    #[serde(rename = "delta_W")]
    pub delta_w: f64,
    #[serde(rename = "delta_W_tot")]
    pub delta_w_tot: f64,
    pub average_aid_cost_pc: f64,
    #[serde(rename = "dWpc_currency")]
    pub dw_pc_currency: f64,
    #[serde(rename = "dWtot_currency")]
    pub dw_tot_currency: f64,
    pub risk: f64,
    pub resilience: f64,
    pub risk_to_assets: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResilienceReport {
    /// Economy table with derived and output columns, keyed by `economy`.
    pub economies: Frame,
    pub outcomes: Vec<EconomyOutcome>,
    /// Economies missing from at least one input table.
    pub dropped_economies: Vec<String>,
    /// Per-category-per-event rows, when `return_iah` is set.
    pub iah: Option<Frame>,
}

impl ResilienceReport {
    pub fn outcome(&self, economy: &str) -> Option<&EconomyOutcome> {
        self.outcomes.iter().find(|o| o.economy == economy)
    }
}

struct EconomyRun {
    economy: Frame,
    iah: Frame,
}

/// Economy-level outcomes of every event, before averaging over return periods.
fn event_outcomes(macro_event: &Frame, iah: &Frame, return_stats: bool) -> ModelResult<Frame> {
    let n = iah.column(col::N)?;
    let pop = macro_event.column(col::POP)?;
    let dk = iah.sum_onto(macro_event, n, iah.column(col::DK)?)?;
    let delta_w = iah.sum_onto(macro_event, n, iah.column(col::DW)?)?;
    let dk_tot = dk.iter().zip(pop).map(|(d, p)| d * p).collect();
    let delta_w_tot = delta_w.iter().zip(pop).map(|(d, p)| d * p).collect();

    let mut out = macro_event.select(&[])?;
    out.set_column(col::D_K, dk)?;
    out.set_column(col::D_K_TOT, dk_tot)?;
    out.set_column(col::DELTA_W, delta_w)?;
    out.set_column(col::DELTA_W_TOT, delta_w_tot)?;
    out.set_column(col::AVERAGE_AID_COST_PC, macro_event.column(col::AID)?.to_vec())?;

    if return_stats {
        // averaging divides by protection under the default return period
        let scale = match observed_return_periods(macro_event)? {
            None => macro_event.column(col::PROTECTION)?.to_vec(),
            Some(_) => vec![1.0; macro_event.len()],
        };
        for name in iah.column_names() {
            let total = iah.sum_onto(macro_event, n, iah.column(name)?)?;
            let scaled = total.iter().zip(&scale).map(|(t, s)| t * s).collect();
            out.set_column(&format!("{}{name}", col::STAT_PREFIX), scaled)?;
        }
    }
    Ok(out)
}

fn run_economy(economies: &Frame, categories: &Frame, hazards: &Frame, config: &ModelConfig) -> ModelResult<EconomyRun> {
    let (mut economies, categories) = derive_consumption(economies, categories)?;
    let multiplier = macro_multiplier(&economies)?;
    economies.set_column(col::MACRO_MULTIPLIER, multiplier)?;

    let EventTables { macro_event, cats_event } =
        expand_events(&economies, &categories, hazards, config.early_warning_efficacy)?;
    let (macro_event, cats_ia) = compute_shock(&macro_event, &cats_event)?;
    let Response { macro_event, mut iah } = post_disaster_support(&macro_event, &cats_ia, config)?;
    apply_welfare_losses(&mut iah, &macro_event)?;

    let per_event = event_outcomes(&macro_event, &iah, config.return_stats)?;
    let per_hazard = average_over_rp(&per_event, &macro_event)?;
    let names: Vec<&str> = per_hazard.column_names().collect();
    let totals = per_hazard.aggregate_by(None, &[dim::ECONOMY], &names)?;
    for name in &names {
        economies.set_column(name, economies.align(&totals, name)?)?;
    }
    debug!("economy {:?}: {} events, {} category rows", economies.keys(), macro_event.len(), iah.len());

    Ok(EconomyRun { economy: economies, iah })
}

fn stack_parts(parts: Vec<Frame>) -> ModelResult<Frame> {
    let dims: Vec<String> = parts.first().map(|p| p.dims().to_vec()).unwrap_or_default();
    let dims: Vec<&str> = dims.iter().map(String::as_str).collect();
    Frame::stack(&dims, parts)
}

fn outcomes(economies: &Frame) -> ModelResult<Vec<EconomyOutcome>> {
    let get = |name: &str| economies.column(name);
    let (gdp, mm, dk, dk_tot) = (get(col::GDP_PC_PP)?, get(col::MACRO_MULTIPLIER)?, get(col::D_K)?, get(col::D_K_TOT)?);
    let (delta_w, delta_w_tot, aid) = (get(col::DELTA_W)?, get(col::DELTA_W_TOT)?, get(col::AVERAGE_AID_COST_PC)?);
    let (dw_pc, dw_tot) = (get(col::DW_PC_CURRENCY)?, get(col::DW_TOT_CURRENCY)?);
    let (risk, resilience, rta) = (get(col::RISK)?, get(col::RESILIENCE)?, get(col::RISK_TO_ASSETS)?);
    Ok(economies
        .keys()
        .iter()
        .enumerate()
        .map(|(i, key)| EconomyOutcome {
            economy: key[0].to_string(),
            gdp_pc_pp: gdp[i],
            macro_multiplier: mm[i],
            dk: dk[i],
            dk_tot: dk_tot[i],
            delta_w: delta_w[i],
            delta_w_tot: delta_w_tot[i],
            average_aid_cost_pc: aid[i],
            dw_pc_currency: dw_pc[i],
            dw_tot_currency: dw_tot[i],
            risk: risk[i],
            resilience: resilience[i],
            risk_to_assets: rta[i],
        })
        .collect())
}

/// Risk and resilience indicators for every economy present in all three
/// input tables.
///
/// Inputs are only read. After global preparation each economy is computed
/// independently on the rayon pool; results do not depend on the sharding.
pub fn compute_resilience(inputs: &ModelInputs, config: &ModelConfig) -> ModelResult<ResilienceReport> {
    config.validate()?;
    let prepared = prepare(inputs)?;
    if prepared.economies.is_empty() {
        warn!("no economy is present in all input tables");
        return Ok(ResilienceReport {
            economies: prepared.economies,
            outcomes: Vec::new(),
            dropped_economies: prepared.dropped_economies,
            iah: None,
        });
    }

    let mut categories: BTreeMap<Label, Frame> =
        prepared.categories.partition_by(dim::ECONOMY)?.into_iter().collect();
    let mut hazards: BTreeMap<Label, Frame> = prepared.hazards.partition_by(dim::ECONOMY)?.into_iter().collect();
    let mut shards = Vec::with_capacity(prepared.economies.len());
    for (label, economy) in prepared.economies.partition_by(dim::ECONOMY)? {
        let missing = || ModelError::MissingKey { key: label.to_string() };
        let c = categories.remove(&label).ok_or_else(missing)?;
        let h = hazards.remove(&label).ok_or_else(missing)?;
        shards.push((economy, c, h));
    }

    let runs = shards
        .par_iter()
        .map(|(e, c, h)| run_economy(e, c, h, config))
        .collect::<ModelResult<Vec<_>>>()?;
    let (economy_parts, iah_parts): (Vec<Frame>, Vec<Frame>) =
        runs.into_iter().map(|r| (r.economy, r.iah)).unzip();

    let mut economies = stack_parts(economy_parts)?;
    risk_and_resilience(&mut economies, config.is_local_welfare)?;
    let iah = if config.return_iah { Some(stack_parts(iah_parts)?) } else { None };
    let outcomes = outcomes(&economies)?;
    info!(
        "computed {} economies under {}/{}/{}/{} ({} dropped)",
        outcomes.len(),
        config.policy.targeting,
        config.policy.budget,
        config.policy.distribution,
        config.policy.financing,
        prepared.dropped_economies.len()
    );

    Ok(ResilienceReport { economies, outcomes, dropped_economies: prepared.dropped_economies, iah })
}
