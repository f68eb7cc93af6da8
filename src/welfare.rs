use crate::error::ModelResult;
use crate::table::Frame;
use crate::types::col;

/// Isoelastic welfare of consumption `c`. Undefined for `elasticity == 1`,
/// which economies are checked against on entry.
pub fn welfare(c: f64, elasticity: f64) -> f64 {
    (c.powf(1.0 - elasticity) - 1.0) / (1.0 - elasticity)
}

/// Welfare lost by each row of `iah` when its discounted consumption
/// `c / rho` drops by `dc_npv_post`.
pub fn delta_welfare(iah: &Frame, macro_event: &Frame) -> ModelResult<Vec<f64>> {
    let rho = iah.align(macro_event, col::RHO)?;
    let elasticity = iah.align(macro_event, col::INCOME_ELAST)?;
    let c = iah.column(col::C)?;
    let dc = iah.column(col::DC_NPV_POST)?;
    Ok((0..iah.len())
        .map(|i| {
            let before = c[i] / rho[i];
            welfare(before, elasticity[i]) - welfare(before - dc[i], elasticity[i])
        })
        .collect())
}

/// Net consumption loss after support and its welfare cost, as the
/// `dc_npv_post` and `dw` columns of `iah`.
pub fn apply_welfare_losses(iah: &mut Frame, macro_event: &Frame) -> ModelResult<()> {
    let dc_npv_post: Vec<f64> = iah
        .column(col::DC_NPV_PRE)?
        .iter()
        .zip(iah.column(col::HELP_RECEIVED)?)
        .zip(iah.column(col::HELP_FEE)?)
        .map(|((pre, help), fee)| pre - help + fee)
        .collect();
    iah.set_column(col::DC_NPV_POST, dc_npv_post)?;
    let dw = delta_welfare(iah, macro_event)?;
    iah.set_column(col::DW, dw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Label, dim};

    #[test]
    fn welfare_closed_form() {
        assert!((welfare(4.0, 1.5) - (0.5 - 1.0) / -0.5).abs() < 1e-12);
        assert!((welfare(1.0, 2.0)).abs() < 1e-12);
    }

    #[test]
    fn welfare_is_increasing_and_concave() {
        let e = 1.5;
        let (a, b, c) = (welfare(100.0, e), welfare(200.0, e), welfare(300.0, e));
        assert!(a < b && b < c);
        assert!(b - a > c - b);
    }

    #[test]
    fn support_reduces_welfare_loss() {
        let key = |h: &str| vec![Label::name("A"), Label::name(h)];
        let macro_event = Frame::from_rows(
            &[dim::ECONOMY],
            &[col::RHO, col::INCOME_ELAST],
            vec![(vec![Label::name("A")], vec![0.06, 1.5])],
        )
        .unwrap();
        let mut iah = Frame::from_rows(
            &[dim::ECONOMY, dim::HELPED_CAT],
            &[col::C, col::DC_NPV_PRE, col::HELP_RECEIVED, col::HELP_FEE],
            vec![
                (key("helped"), vec![300.0, 1000.0, 400.0, 10.0]),
                (key("not_helped"), vec![300.0, 1000.0, 0.0, 10.0]),
            ],
        )
        .unwrap();
        apply_welfare_losses(&mut iah, &macro_event).unwrap();
        assert_eq!(iah.column(col::DC_NPV_POST).unwrap(), &[610.0, 1010.0]);
        let dw = iah.column(col::DW).unwrap();
        assert!(dw[0] > 0.0 && dw[0] < dw[1]);
        let expected = welfare(5000.0, 1.5) - welfare(5000.0 - 610.0, 1.5);
        assert!((dw[0] - expected).abs() < 1e-9);
    }
}
