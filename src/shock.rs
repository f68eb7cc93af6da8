use crate::error::ModelResult;
use crate::table::{Dimension, Frame};
use crate::types::{AffectedCat, Label, col, dim};

pub(crate) fn affected_dimension() -> ModelResult<Dimension> {
    Dimension::new(dim::AFFECTED_CAT, AffectedCat::ALL)
}

/// Row mask of affected households.
pub(crate) fn affected_mask(frame: &Frame) -> ModelResult<Vec<bool>> {
    frame.mask(dim::AFFECTED_CAT, &Label::from(AffectedCat::Affected))
}

/// Capital and consumption losses per category-event row.
///
/// Each `cats_event` row is split into affected and unaffected households,
/// weighted by `fa` and `1 - fa`. Capital loss is `k · v · (1 - pi · shew)`
/// for affected rows and zero for unaffected rows. Adds `dk_event` (the
/// population-weighted event total) to the returned event table; the
/// returned category table carries `v_shew`, `dk`, `dc` and `dc_npv_pre`.
pub fn compute_shock(macro_event: &Frame, cats_event: &Frame) -> ModelResult<(Frame, Frame)> {
    let mut macro_event = macro_event.clone();
    let mut cats_ia = Frame::categorical_concat(cats_event, cats_event, &affected_dimension()?)?;
    let affected = affected_mask(&cats_ia)?;

    let fa = cats_ia.column(col::FA)?;
    let n: Vec<f64> = cats_ia
        .column(col::N)?
        .iter()
        .zip(fa)
        .zip(&affected)
        .map(|((n, fa), a)| if *a { n * fa } else { n * (1.0 - fa) })
        .collect();
    cats_ia.set_column(col::N, n)?;

    let pi = cats_ia.align(&macro_event, col::PI)?;
    let v_shew: Vec<f64> = cats_ia
        .column(col::V)?
        .iter()
        .zip(cats_ia.column(col::SHEW)?)
        .zip(&pi)
        .map(|((v, shew), pi)| v * (1.0 - pi * shew))
        .collect();
    let dk: Vec<f64> = cats_ia
        .column(col::K)?
        .iter()
        .zip(&v_shew)
        .zip(&affected)
        .map(|((k, v), a)| if *a { k * v } else { 0.0 })
        .collect();
    cats_ia.set_column(col::V_SHEW, v_shew)?;

    let dk_event = cats_ia.sum_onto(&macro_event, cats_ia.column(col::N)?, &dk)?;
    macro_event.set_column(col::DK_EVENT, dk_event)?;

    let tau = cats_ia.align(&macro_event, col::TAU_TAX)?;
    let dk_event = cats_ia.align(&macro_event, col::DK_EVENT)?;
    let multiplier = cats_ia.align(&macro_event, col::MACRO_MULTIPLIER)?;
    let gamma = cats_ia.column(col::GAMMA_SP)?;
    let dc: Vec<f64> = (0..cats_ia.len())
        .map(|i| (1.0 - tau[i]) * dk[i] + gamma[i] * tau[i] * dk_event[i])
        .collect();
    let dc_npv_pre: Vec<f64> = dc.iter().zip(&multiplier).map(|(dc, m)| dc * m).collect();

    cats_ia.set_column(col::DK, dk)?;
    cats_ia.set_column(col::DC, dc)?;
    cats_ia.set_column(col::DC_NPV_PRE, dc_npv_pre)?;

    Ok((macro_event, cats_ia))
}
