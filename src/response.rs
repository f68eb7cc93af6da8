//! Post-disaster support.
//!
//! Four independent policy axes decide who is helped ([`Targeting`]), how
//! large the budget is ([`Budget`]), how it is shared between helped
//! households ([`Distribution`]) and who pays for it ([`Financing`]). Each
//! axis is one function below; [`respond`] runs them in order.

use log::debug;

use crate::config::{Budget, Distribution, Financing, LossMeasure, ModelConfig, PolicyOptions, Targeting};
use crate::error::ModelResult;
use crate::shock::affected_mask;
use crate::table::{Dimension, Frame};
use crate::types::{HelpedCat, IncomeCat, Label, col, dim};

/// Fixed error rate of the `x33`, `incl` and `excl` targeting options.
const FIXED_TARGETING_ERROR: f64 = 0.33;

/// Event-level and row-level tables after the response.
#[derive(Debug, Clone)]
pub struct Response {
    /// Adds `fa`, `error_incl`, `error_excl`, `max_aid`, `need`, `aid`.
    pub macro_event: Frame,
    /// Category rows split by `helped_cat`, with reweighted `n`,
    /// `help_received` and `help_fee`.
    pub iah: Frame,
}

fn helped_dimension() -> ModelResult<Dimension> {
    Dimension::new(dim::HELPED_CAT, HelpedCat::ALL)
}

/// `(inclusion, exclusion)` error rates for an event with aggregate
/// exposure `fa`.
pub fn targeting_errors(targeting: Targeting, fa: f64, prepare_scaleup: f64) -> (f64, f64) {
    // nobody is unaffected, so nobody can be wrongly included
    let odds = if fa < 1.0 { fa / (1.0 - fa) } else { 0.0 };
    match targeting {
        Targeting::Perfect => (0.0, 0.0),
        Targeting::Data => {
            let error = (1.0 - prepare_scaleup) / 2.0;
            (error * odds, error)
        }
        Targeting::X33 => (FIXED_TARGETING_ERROR * odds, FIXED_TARGETING_ERROR),
        Targeting::Incl => (FIXED_TARGETING_ERROR * odds, 0.0),
        Targeting::Excl => (0.0, FIXED_TARGETING_ERROR),
    }
}

/// Population weight of a row once targeting errors are applied.
fn reweight(n: f64, affected: bool, helped: bool, incl: f64, excl: f64) -> f64 {
    match (affected, helped) {
        (true, true) => n * (1.0 - excl),
        (true, false) => n * excl,
        (false, true) => n * incl,
        (false, false) => n * (1.0 - incl),
    }
}

fn safe_div(num: f64, den: f64) -> f64 {
    if den == 0.0 { 0.0 } else { num / den }
}

struct Context<'a> {
    iah: &'a Frame,
    macro_event: &'a Frame,
    n: &'a [f64],
    loss: &'a [f64],
    affected: Vec<bool>,
    helped: Vec<bool>,
    poor: Vec<bool>,
    shareable: &'a [f64],
    gdp: &'a [f64],
    prepare_scaleup: &'a [f64],
    borrow_abi: &'a [f64],
}

impl Context<'_> {
    /// `Σ n·values` per event over the rows selected by `keep`.
    fn total(&self, values: &[f64], keep: impl Fn(usize) -> bool) -> ModelResult<Vec<f64>> {
        let weights: Vec<f64> =
            (0..self.n.len()).map(|i| if keep(i) { self.n[i] } else { 0.0 }).collect();
        self.iah.sum_onto(self.macro_event, &weights, values)
    }

    fn shared(&self, totals: Vec<f64>) -> Vec<f64> {
        totals.iter().zip(self.shareable).map(|(t, s)| t * s).collect()
    }

    /// Event-level values repeated onto every row.
    fn per_row(&self, values: &[f64]) -> ModelResult<Vec<f64>> {
        self.iah.spread(self.macro_event, values)
    }
}

/// Budget before distribution: the event's need, the aid on offer and the
/// spending ceiling. Options that only move the ceiling leave need and aid
/// to the distribution step.
struct Sizing {
    need: Option<Vec<f64>>,
    aid: Option<Vec<f64>>,
    max_aid: Vec<f64>,
}

fn size_budget(budget: Budget, ctx: &Context<'_>, max_aid: Vec<f64>) -> ModelResult<Sizing> {
    let scaled = |f: f64| ctx.gdp.iter().map(|g| f * g).collect::<Vec<f64>>();
    let mut sizing = Sizing { need: None, aid: None, max_aid };
    match budget {
        Budget::Data => {}
        Budget::UnifPoor => {
            let need = ctx.shared(ctx.total(ctx.loss, |i| ctx.affected[i] && ctx.poor[i])?);
            let aid = need.iter().zip(&sizing.max_aid).map(|(n, m)| n.min(*m)).collect();
            sizing.need = Some(need);
            sizing.aid = Some(aid);
        }
        Budget::OnePerAffected => {
            let need = ctx.total(&vec![1.0; ctx.n.len()], |i| ctx.affected[i])?;
            sizing.aid = Some(need.clone());
            sizing.need = Some(need);
        }
        Budget::One => sizing.aid = Some(vec![1.0; ctx.gdp.len()]),
        Budget::X10 => sizing.aid = Some(scaled(0.1)),
        Budget::X05 => sizing.aid = Some(scaled(0.05)),
        Budget::Max01 => sizing.max_aid = scaled(0.01),
        Budget::Max05 => sizing.max_aid = scaled(0.05),
        Budget::Unlimited => {
            let need = ctx.shared(ctx.total(ctx.loss, |i| ctx.affected[i])?);
            sizing.aid = Some(need.clone());
            sizing.need = Some(need);
        }
    }
    Ok(sizing)
}

/// Aid actually spent against a need computed by the distribution step.
fn available(budget: Budget, need: &[f64], ctx: &Context<'_>, sizing: &Sizing) -> Vec<f64> {
    match (budget, &sizing.aid) {
        (Budget::Data, _) => (0..need.len())
            .map(|j| (need[j] * ctx.prepare_scaleup[j] * ctx.borrow_abi[j]).min(sizing.max_aid[j]))
            .collect(),
        (_, Some(aid)) => aid.clone(),
        (_, None) => need.iter().zip(&sizing.max_aid).map(|(n, m)| n.min(*m)).collect(),
    }
}

struct Transfers {
    need: Vec<f64>,
    aid: Vec<f64>,
    unif_aid: Option<Vec<f64>>,
    help: Vec<f64>,
}

fn distribute(
    distribution: Distribution,
    budget: Budget,
    ctx: &Context<'_>,
    sizing: &Sizing,
    loss_column: &str,
) -> ModelResult<Transfers> {
    let rows = ctx.n.len();
    let events = ctx.gdp.len();
    match distribution {
        Distribution::No => Ok(Transfers {
            need: sizing.need.clone().unwrap_or_else(|| vec![0.0; events]),
            aid: vec![0.0; events],
            unif_aid: None,
            help: vec![0.0; rows],
        }),
        Distribution::UnifAll | Distribution::UnifPoor => {
            // `unif_poor` sizes the need on the poor; the aid still goes to every helped row
            let poor_only = distribution == Distribution::UnifPoor;
            let need = ctx.shared(ctx.total(ctx.loss, |i| ctx.affected[i] && (!poor_only || ctx.poor[i]))?);
            let aid = available(budget, &need, ctx, sizing);
            let recipients = ctx.total(&vec![1.0; rows], |i| ctx.helped[i])?;
            let unif_aid: Vec<f64> = aid.iter().zip(&recipients).map(|(a, p)| safe_div(*a, *p)).collect();
            let per_row = ctx.per_row(&unif_aid)?;
            let help = (0..rows).map(|i| if ctx.helped[i] { per_row[i] } else { 0.0 }).collect();
            Ok(Transfers { need, aid, unif_aid: Some(unif_aid), help })
        }
        Distribution::One | Distribution::Hundred => {
            let unif_aid =
                if distribution == Distribution::One { vec![1.0; events] } else { ctx.gdp.to_vec() };
            let per_row = ctx.per_row(&unif_aid)?;
            let help: Vec<f64> = (0..rows).map(|i| if ctx.helped[i] { per_row[i] } else { 0.0 }).collect();
            let need = ctx.total(&help, |_| true)?;
            Ok(Transfers { aid: need.clone(), need, unif_aid: Some(unif_aid), help })
        }
        Distribution::Prop | Distribution::Perfect | Distribution::PropNonpoor => {
            // every row of a category is sized on the loss of its affected households
            let affected_helped: Vec<bool> = (0..rows).map(|i| ctx.affected[i] && ctx.helped[i]).collect();
            let category_loss = ctx
                .iah
                .filter(&affected_helped)?
                .drop_dim(dim::HELPED_CAT)?
                .drop_dim(dim::AFFECTED_CAT)?;
            let mut row_need = ctx.iah.align(&category_loss, loss_column)?;
            if distribution == Distribution::PropNonpoor {
                for (need, poor) in row_need.iter_mut().zip(&ctx.poor) {
                    if *poor {
                        *need = 0.0;
                    }
                }
            }
            let need = ctx.shared(ctx.total(&row_need, |i| ctx.helped[i])?);
            let aid = available(budget, &need, ctx, sizing);
            let need_row = ctx.per_row(&need)?;
            let aid_row = ctx.per_row(&aid)?;
            let shareable_row = ctx.per_row(ctx.shareable)?;
            let help = (0..rows)
                .map(|i| {
                    if ctx.helped[i] {
                        safe_div(shareable_row[i] * row_need[i] * aid_row[i], need_row[i])
                    } else {
                        0.0
                    }
                })
                .collect();
            Ok(Transfers { need, aid, unif_aid: None, help })
        }
    }
}

/// Fee charged to every row to recover the transfers, scaled by the
/// domestically paid share.
fn finance(financing: Financing, fraction_inside: f64, ctx: &Context<'_>, help: &[f64]) -> ModelResult<Vec<f64>> {
    let rows = ctx.n.len();
    match financing {
        Financing::Tax => {
            let k = ctx.iah.column(col::K)?;
            let paid = ctx.total(help, |_| true)?;
            let capital = ctx.total(k, |_| true)?;
            let rate: Vec<f64> = paid.iter().zip(&capital).map(|(p, c)| safe_div(*p, *c)).collect();
            let rate = ctx.per_row(&rate)?;
            Ok((0..rows).map(|i| fraction_inside * rate[i] * k[i]).collect())
        }
        Financing::InsurancePremium => {
            // per-capita premium that balances the payout within each event × income category
            let categories = ctx.iah.index_on(&[dim::ECONOMY, dim::HAZARD, dim::RP, dim::INCOME_CAT])?;
            let paid = ctx.iah.sum_onto(&categories, ctx.n, help)?;
            let insured = ctx.iah.sum_onto(&categories, ctx.n, &vec![1.0; rows])?;
            let premium: Vec<f64> = paid.iter().zip(&insured).map(|(p, n)| safe_div(*p, *n)).collect();
            let premium = ctx.iah.spread(&categories, &premium)?;
            Ok(premium.into_iter().map(|p| fraction_inside * p).collect())
        }
    }
}

/// One post-disaster response under a single point of the policy space.
///
/// `macro_event` needs `prepare_scaleup`, `max_increased_spending`,
/// `borrow_abi`, `gdp_pc_pp` and `shareable`; `cats_ia` is the output of
/// [`crate::shock::compute_shock`].
pub fn respond(
    macro_event: &Frame,
    cats_ia: &Frame,
    policy: PolicyOptions,
    fraction_inside: f64,
    loss_measure: LossMeasure,
) -> ModelResult<Response> {
    let mut macro_event = macro_event.clone();
    let fa_event = cats_ia.sum_onto(&macro_event, cats_ia.column(col::N)?, cats_ia.column(col::FA)?)?;
    let (incl, excl): (Vec<f64>, Vec<f64>) = fa_event
        .iter()
        .zip(macro_event.column(col::PREPARE_SCALEUP)?)
        .map(|(fa, p)| targeting_errors(policy.targeting, *fa, *p))
        .unzip();
    macro_event.set_column(col::FA, fa_event)?;
    macro_event.set_column(col::ERROR_INCL, incl)?;
    macro_event.set_column(col::ERROR_EXCL, excl)?;

    let mut iah = Frame::categorical_concat(cats_ia, cats_ia, &helped_dimension()?)?;
    let affected = affected_mask(&iah)?;
    let helped = iah.mask(dim::HELPED_CAT, &Label::from(HelpedCat::Helped))?;
    let poor = iah.mask(dim::INCOME_CAT, &Label::from(IncomeCat::Poor))?;
    let incl = iah.align(&macro_event, col::ERROR_INCL)?;
    let excl = iah.align(&macro_event, col::ERROR_EXCL)?;
    let n: Vec<f64> = iah
        .column(col::N)?
        .iter()
        .enumerate()
        .map(|(i, n)| reweight(*n, affected[i], helped[i], incl[i], excl[i]))
        .collect();
    iah.set_column(col::N, n)?;

    let spending = macro_event.column(col::MAX_INCREASED_SPENDING)?;
    let borrow_abi = macro_event.column(col::BORROW_ABI)?;
    let gdp = macro_event.column(col::GDP_PC_PP)?;
    let max_aid: Vec<f64> = (0..macro_event.len()).map(|j| spending[j] * borrow_abi[j] * gdp[j]).collect();

    let ctx = Context {
        iah: &iah,
        macro_event: &macro_event,
        n: iah.column(col::N)?,
        loss: iah.column(loss_measure.column())?,
        affected,
        helped,
        poor,
        shareable: macro_event.column(col::SHAREABLE)?,
        gdp: macro_event.column(col::GDP_PC_PP)?,
        prepare_scaleup: macro_event.column(col::PREPARE_SCALEUP)?,
        borrow_abi: macro_event.column(col::BORROW_ABI)?,
    };
    let sizing = size_budget(policy.budget, &ctx, max_aid)?;
    let transfers = distribute(policy.distribution, policy.budget, &ctx, &sizing, loss_measure.column())?;
    let fee = finance(policy.financing, fraction_inside, &ctx, &transfers.help)?;
    debug!(
        "response {}/{}/{}/{} over {} events",
        policy.targeting,
        policy.budget,
        policy.distribution,
        policy.financing,
        macro_event.len()
    );

    let Sizing { max_aid, .. } = sizing;
    macro_event.set_column(col::MAX_AID, max_aid)?;
    macro_event.set_column(col::NEED, transfers.need)?;
    macro_event.set_column(col::AID, transfers.aid)?;
    if let Some(unif_aid) = transfers.unif_aid {
        macro_event.set_column(col::UNIF_AID, unif_aid)?;
    }
    iah.set_column(col::HELP_RECEIVED, transfers.help)?;
    iah.set_column(col::HELP_FEE, fee)?;

    Ok(Response { macro_event, iah })
}

/// The configured response. Insurance tops up the support observed in the
/// data: both responses are computed on the same shock and their needs,
/// budgets, transfers and fees are added.
pub fn post_disaster_support(macro_event: &Frame, cats_ia: &Frame, config: &ModelConfig) -> ModelResult<Response> {
    match config.policy.financing {
        Financing::Tax => {
            respond(macro_event, cats_ia, config.policy, config.fraction_inside, config.loss_measure)
        }
        Financing::InsurancePremium => {
            let baseline = respond(macro_event, cats_ia, PolicyOptions::BASELINE, 1.0, LossMeasure::Dk)?;

            let mut insured_event = macro_event.clone();
            insured_event.fill_column(col::SHAREABLE, config.share_insured);
            let mut insured =
                respond(&insured_event, cats_ia, config.policy, config.fraction_inside, config.loss_measure)?;
            insured.macro_event.set_column(col::SHAREABLE, macro_event.column(col::SHAREABLE)?.to_vec())?;

            for name in [col::NEED, col::AID] {
                add_aligned(&mut insured.macro_event, &baseline.macro_event, name)?;
            }
            for name in [col::HELP_RECEIVED, col::HELP_FEE] {
                add_aligned(&mut insured.iah, &baseline.iah, name)?;
            }
            Ok(insured)
        }
    }
}

fn add_aligned(target: &mut Frame, source: &Frame, name: &str) -> ModelResult<()> {
    let extra = target.align(source, name)?;
    let summed = target.column(name)?.iter().zip(extra).map(|(a, b)| a + b).collect();
    target.set_column(name, summed)
}
