use crate::error::{ModelError, ModelResult};
use crate::interpolate::observed_return_periods;
use crate::table::Frame;
use crate::types::{col, dim};

/// Annual probability mass of each return period in `sorted` (ascending):
/// `1/rp_i - 1/rp_(i+1)`, and `1/rp` for the largest.
pub fn exceedance_probabilities(sorted: &[f64]) -> Vec<f64> {
    sorted
        .iter()
        .enumerate()
        .map(|(i, rp)| match sorted.get(i + 1) {
            Some(next) => 1.0 / rp - 1.0 / next,
            None => 1.0 / rp,
        })
        .collect()
}

/// Collapse the `rp` dimension of `df` into expected annual values.
///
/// `protection` supplies a `protection` column at any coarser or equal key.
/// Events at or below an economy's protection carry no probability, and the
/// remaining weights are not renormalised. Under the default-return-period
/// sentinel every column is divided by protection instead. A frame without
/// an `rp` dimension is returned unchanged.
pub fn average_over_rp(df: &Frame, protection: &Frame) -> ModelResult<Frame> {
    if !df.has_dim(dim::RP) {
        return Ok(df.clone());
    }
    let threshold = df.align(protection, col::PROTECTION)?;
    let rest: Vec<&str> = df.dims().iter().map(String::as_str).filter(|d| *d != dim::RP).collect();
    let names: Vec<&str> = df.column_names().collect();

    let Some(rps) = observed_return_periods(df)? else {
        if let Some(i) = threshold.iter().position(|p| *p == 0.0) {
            return Err(ModelError::ZeroProtection { economy: economy_of(df, i)? });
        }
        let mut out = df.clone();
        for name in &names {
            let scaled = df.column(name)?.iter().zip(&threshold).map(|(v, p)| v / p).collect();
            out.set_column(name, scaled)?;
        }
        return out.drop_dim(dim::RP);
    };

    let probabilities = exceedance_probabilities(&rps);
    let weights: Vec<f64> = df
        .labels(dim::RP)?
        .iter()
        .zip(&threshold)
        .map(|(label, p)| {
            let rp = label.as_period().and_then(|r| r.as_years()).unwrap_or(0.0);
            if rp <= *p {
                return 0.0;
            }
            rps.iter().position(|r| *r == rp).map_or(0.0, |i| probabilities[i])
        })
        .collect();
    df.aggregate_weighted(&weights, &rest, &names)
}

fn economy_of(df: &Frame, row: usize) -> ModelResult<String> {
    let labels = df.labels(dim::ECONOMY)?;
    Ok(labels.get(row).map(|l| l.to_string()).unwrap_or_default())
}
