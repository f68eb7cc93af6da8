use serde::Serialize;

use crate::model::{EconomyOutcome, ResilienceReport};

/// Spread of one indicator across economies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistStats {
    pub n: usize,
    pub min: f64,
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl DistStats {
    /// Statistics of the finite values in `values`; `None` when there are none.
    pub fn of(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        let mut sorted: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
        sorted.sort_by(f64::total_cmp);
        let (&min, &max) = (sorted.first()?, sorted.last()?);
        let n = sorted.len();
        let mean = sorted.iter().sum::<f64>() / n as f64;
        let sum_sq: f64 = sorted.iter().map(|x| (x - mean).powi(2)).sum();
        let std_dev = if n > 1 { (sum_sq / (n - 1) as f64).sqrt() } else { 0.0 };
        Some(DistStats {
            n,
            min,
            p5: quantile(&sorted, 0.05),
            p25: quantile(&sorted, 0.25),
            p50: quantile(&sorted, 0.50),
            p75: quantile(&sorted, 0.75),
            p95: quantile(&sorted, 0.95),
            max,
            mean,
            std_dev,
        })
    }
}

/// Linear interpolation between the closest ranks of a sorted, non-empty slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let rank = q * (sorted.len() - 1) as f64;
    let below = sorted[rank.floor() as usize];
    let above = sorted[rank.ceil() as usize];
    below + (above - below) * rank.fract()
}

/// Cross-economy summary of a [`ResilienceReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub economies: usize,
    pub dropped: usize,
    pub risk: DistStats,
    pub resilience: DistStats,
    pub risk_to_assets: DistStats,
    /// Population-weighted totals over all economies.
    pub total_asset_losses: f64,
    pub total_welfare_losses_currency: f64,
    /// Least resilient economy.
    pub least_resilient: String,
}

impl ReportSummary {
    /// Asset losses per unit of welfare loss over the whole report, the
    /// report-wide counterpart of each economy's resilience. `None` when
    /// nothing was lost.
    pub fn aggregate_resilience(&self) -> Option<f64> {
        (self.total_welfare_losses_currency > 0.0)
            .then(|| self.total_asset_losses / self.total_welfare_losses_currency)
    }
}

fn stats_of(outcomes: &[EconomyOutcome], metric: impl Fn(&EconomyOutcome) -> f64) -> Option<DistStats> {
    DistStats::of(outcomes.iter().map(metric))
}

/// Summarise a report across its economies. `None` when it has none.
///
/// Non-finite indicator values (an economy with no welfare loss has
/// undefined resilience) are left out of the distributions.
pub fn summarise(report: &ResilienceReport) -> Option<ReportSummary> {
    let outcomes = &report.outcomes;
    let least_resilient = outcomes
        .iter()
        .filter(|o| o.resilience.is_finite())
        .min_by(|a, b| a.resilience.total_cmp(&b.resilience))?;
    Some(ReportSummary {
        economies: outcomes.len(),
        dropped: report.dropped_economies.len(),
        risk: stats_of(outcomes, |o| o.risk)?,
        resilience: stats_of(outcomes, |o| o.resilience)?,
        risk_to_assets: stats_of(outcomes, |o| o.risk_to_assets)?,
        total_asset_losses: outcomes.iter().map(|o| o.dk_tot).sum(),
        total_welfare_losses_currency: outcomes.iter().map(|o| o.dw_tot_currency).sum(),
        least_resilient: least_resilient.economy.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::Scenario;

    #[test]
    fn stats_of_known_values() {
        let ds = DistStats::of([5.0, 1.0, 4.0, 2.0, 3.0]).unwrap();
        assert_eq!(ds.n, 5);
        assert_eq!((ds.min, ds.max), (1.0, 5.0));
        assert!((ds.p50 - 3.0).abs() < 1e-10, "p50");
        assert!((ds.p25 - 2.0).abs() < 1e-10, "p25");
        assert!((ds.p95 - 4.8).abs() < 1e-10, "p95");
        assert!((ds.mean - 3.0).abs() < 1e-10, "mean");
        assert!((ds.std_dev - 2.5f64.sqrt()).abs() < 1e-10, "std_dev");
    }

    #[test]
    fn quantiles_interpolate_between_ranks() {
        let ds = DistStats::of([0.5, 1.0]).unwrap();
        assert!((ds.p50 - 0.75).abs() < 1e-10);
    }

    #[test]
    fn non_finite_values_are_skipped() {
        let ds = DistStats::of([f64::NAN, 2.0, f64::INFINITY]).unwrap();
        assert_eq!(ds.n, 1);
        assert_eq!((ds.min, ds.p50, ds.max, ds.std_dev), (2.0, 2.0, 2.0, 0.0));
        assert!(DistStats::of([f64::NAN]).is_none());
        assert!(DistStats::of(Vec::new()).is_none());
    }

    #[test]
    fn aggregate_resilience_needs_a_welfare_loss() {
        let stats = DistStats::of([1.0]).unwrap();
        let mut summary = ReportSummary {
            economies: 1,
            dropped: 0,
            risk: stats.clone(),
            resilience: stats.clone(),
            risk_to_assets: stats,
            total_asset_losses: 0.0,
            total_welfare_losses_currency: 0.0,
            least_resilient: "A".to_string(),
        };
        assert_eq!(summary.aggregate_resilience(), None);

        summary.total_asset_losses = 3.0;
        summary.total_welfare_losses_currency = 4.0;
        assert_eq!(summary.aggregate_resilience(), Some(0.75));
    }

    #[test]
    fn canonical_summary_covers_every_economy() {
        let report = Scenario::canonical().run().unwrap();
        let summary = summarise(&report).unwrap();
        assert_eq!(summary.economies, report.outcomes.len());
        assert_eq!(summary.risk.n, report.outcomes.len());
        assert!(summary.risk.min <= summary.risk.p50 && summary.risk.p50 <= summary.risk.max);

        let min_resilience = report.outcomes.iter().map(|o| o.resilience).fold(f64::INFINITY, f64::min);
        let least = report.outcome(&summary.least_resilient).unwrap();
        assert_eq!(least.resilience, min_resilience);

        let dk_tot: f64 = report.outcomes.iter().map(|o| o.dk_tot).sum();
        assert!((summary.total_asset_losses - dk_tot).abs() < 1e-6 * dk_tot);
        assert!(summary.aggregate_resilience().is_some_and(|r| r > 0.0));
    }

    #[test]
    fn empty_report_has_no_summary() {
        let mut report = Scenario::canonical().run().unwrap();
        report.outcomes.clear();
        assert!(summarise(&report).is_none());
    }
}
