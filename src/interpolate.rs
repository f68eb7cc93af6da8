use std::collections::BTreeMap;

use crate::error::{ModelError, ModelResult};
use crate::table::{Frame, Key};
use crate::types::{Label, ReturnPeriod, dim};

/// Distinct return periods of a frame's `rp` dimension.
///
/// `Ok(None)` when the frame carries the default sentinel; mixing the
/// sentinel with numeric periods is an error.
pub fn observed_return_periods(frame: &Frame) -> ModelResult<Option<Vec<f64>>> {
    let labels = frame.dimension(dim::RP)?;
    let mut years = Vec::new();
    let mut has_default = false;
    for l in labels.labels() {
        match l.as_period() {
            Some(ReturnPeriod::Default) => has_default = true,
            Some(ReturnPeriod::Years(y)) => years.push(y),
            None => return Err(ModelError::InvalidReturnPeriod { value: f64::NAN }),
        }
    }
    match (has_default, years.is_empty()) {
        (true, true) => Ok(None),
        (true, false) => Err(ModelError::MixedReturnPeriods),
        (false, _) => {
            years.sort_by(f64::total_cmp);
            Ok(Some(years))
        }
    }
}

/// Dense exposure curve over the return-period grid.
///
/// Every column is interpolated independently for every combination of the
/// frame's other dimensions (economy, hazard, and income category when
/// present). The grid is the union of all observed return periods and the
/// positive `protection` thresholds, so every series ends up on the same
/// grid. Frames carrying the default-return-period sentinel are returned
/// unchanged.
pub fn interpolate_rps(fa_ratios: &Frame, protection: &[f64]) -> ModelResult<Frame> {
    let Some(observed) = observed_return_periods(fa_ratios)? else {
        return Ok(fa_ratios.clone());
    };

    let mut grid: Vec<f64> = observed
        .iter()
        .copied()
        .chain(protection.iter().copied().filter(|p| p.is_finite() && *p > 0.0))
        .collect();
    grid.sort_by(f64::total_cmp);
    grid.dedup();

    let rp_pos = fa_ratios.dim_index(dim::RP)?;
    let mut series: BTreeMap<Key, Vec<(f64, usize)>> = BTreeMap::new();
    for (i, key) in fa_ratios.keys().iter().enumerate() {
        let mut rest = key.clone();
        let rp = rest.remove(rp_pos);
        let years = rp
            .as_period()
            .and_then(|p| p.as_years())
            .ok_or(ModelError::MixedReturnPeriods)?;
        series.entry(rest).or_default().push((years, i));
    }

    let names: Vec<&str> = fa_ratios.column_names().collect();
    let columns: Vec<&[f64]> = names.iter().map(|n| fa_ratios.column(n)).collect::<ModelResult<_>>()?;

    let mut rows = Vec::with_capacity(series.len() * grid.len());
    for (rest, mut points) in series {
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        let curves: Vec<Vec<f64>> = columns
            .iter()
            .map(|values| {
                let xy: Vec<(f64, f64)> = points.iter().map(|&(x, i)| (x, values[i])).collect();
                exposure_curve(&xy, &grid)
            })
            .collect();
        for (g, rp) in grid.iter().enumerate() {
            let mut key = rest.clone();
            key.insert(rp_pos, Label::Period(ReturnPeriod::Years(*rp)));
            rows.push((key, curves.iter().map(|c| c[g]).collect()));
        }
    }

    let dims: Vec<&str> = fa_ratios.dims().iter().map(String::as_str).collect();
    Frame::from_rows(&dims, &names, rows)
}

/// Linear interpolation through `points` (sorted by x, non-empty) plus an
/// extrapolated point at x = 0, clipped at zero and held constant beyond the
/// last observed x.
fn exposure_curve(points: &[(f64, f64)], grid: &[f64]) -> Vec<f64> {
    let (x1, y1) = points[0];
    let y0 = match points.get(1) {
        Some(&(x2, y2)) => y1 - x1 * (y2 - y1) / (x2 - x1),
        None => y1,
    };
    let mut xs = vec![0.0];
    let mut ys = vec![y0];
    for &(x, y) in points {
        xs.push(x);
        ys.push(y);
    }
    let last = xs.len() - 1;

    grid.iter()
        .map(|&g| {
            let v = if g >= xs[last] {
                ys[last]
            } else {
                // xs[0] = 0 < g < xs[last]
                let hi = xs.partition_point(|&x| x <= g).max(1);
                let lo = hi - 1;
                ys[lo] + (g - xs[lo]) * (ys[hi] - ys[lo]) / (xs[hi] - xs[lo])
            };
            v.max(0.0)
        })
        .collect()
}
