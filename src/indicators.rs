use crate::error::ModelResult;
use crate::table::Frame;
use crate::types::col;
use crate::welfare::welfare;

/// Step of the centred finite difference used for marginal welfare.
const H: f64 = 1e-4;

/// Marginal welfare of discounted consumption `consumption / rho`.
pub fn marginal_welfare(consumption: f64, rho: f64, elasticity: f64) -> f64 {
    let c = consumption / rho;
    (welfare(c + H, elasticity) - welfare(c - H, elasticity)) / (2.0 * H)
}

/// Risk, resilience and risk to assets per economy.
///
/// Reads `dK`, `delta_W`, `rho`, `income_elast`, `pop`, `gdp_pc_pp` and,
/// when `is_local_welfare` is false, `gdp_pc_pp_nat` for the reference
/// consumption. Adds `dWpc_currency`, `dWtot_currency`, `risk`,
/// `resilience` and `risk_to_assets`.
pub fn risk_and_resilience(economies: &mut Frame, is_local_welfare: bool) -> ModelResult<()> {
    let reference = if is_local_welfare { col::GDP_PC_PP } else { col::GDP_PC_PP_NAT };
    let reference = economies.column(reference)?;
    let gdp = economies.column(col::GDP_PC_PP)?;
    let rho = economies.column(col::RHO)?;
    let elasticity = economies.column(col::INCOME_ELAST)?;
    let pop = economies.column(col::POP)?;
    let dk = economies.column(col::D_K)?;
    let delta_w = economies.column(col::DELTA_W)?;

    let rows = economies.len();
    let mut dw_pc = Vec::with_capacity(rows);
    let mut dw_tot = Vec::with_capacity(rows);
    let mut risk = Vec::with_capacity(rows);
    let mut resilience = Vec::with_capacity(rows);
    let mut risk_to_assets = Vec::with_capacity(rows);
    for i in 0..rows {
        let wprime = marginal_welfare(reference[i], rho[i], elasticity[i]);
        let currency = delta_w[i] / wprime;
        let r = currency / gdp[i];
        let res = wprime * dk[i] / delta_w[i];
        dw_pc.push(currency);
        dw_tot.push(currency * pop[i]);
        risk.push(r);
        resilience.push(res);
        risk_to_assets.push(res * r);
    }

    economies.set_column(col::DW_PC_CURRENCY, dw_pc)?;
    economies.set_column(col::DW_TOT_CURRENCY, dw_tot)?;
    economies.set_column(col::RISK, risk)?;
    economies.set_column(col::RESILIENCE, resilience)?;
    economies.set_column(col::RISK_TO_ASSETS, risk_to_assets)
}
