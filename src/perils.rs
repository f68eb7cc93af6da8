//! Seeded synthetic scenarios for benchmarking and exploration.
//!
//! Household capital is drawn log-normally, shares and abilities from Beta
//! distributions, and each peril's exposure curve grows with return period
//! at a rate set by a Pareto tail index.

use rand::Rng;
use rand_distr::{Beta, Distribution, LogNormal, Pareto};

use crate::config::ModelConfig;
use crate::error::{ModelError, ModelResult};
use crate::inputs::{CategoryRecord, EconomyRecord, HazardRecord};
use crate::scenario::Scenario;
use crate::types::IncomeCat;

/// Largest exposed share any synthetic curve reaches.
const MAX_FA: f64 = 0.95;

/// Protection levels economies are drawn from, in years.
const PROTECTION_LEVELS: [f64; 6] = [1.0, 2.0, 5.0, 10.0, 20.0, 50.0];

pub enum SeverityModel {
    /// Log-normal; ln-space params. E[X] = exp(mu + sigma²/2).
    LogNormal { mu: f64, sigma: f64 },
    /// `scale` = minimum value, `shape` = tail index α.
    Pareto { scale: f64, shape: f64 },
}

impl SeverityModel {
    pub fn sample(&self, rng: &mut impl Rng) -> ModelResult<f64> {
        match self {
            SeverityModel::LogNormal { mu, sigma } => {
                let dist = LogNormal::new(*mu, *sigma).map_err(|e| invalid("LogNormal", e))?;
                Ok(dist.sample(rng))
            }
            SeverityModel::Pareto { scale, shape } => {
                let dist = Pareto::new(*scale, *shape).map_err(|e| invalid("Pareto", e))?;
                Ok(dist.sample(rng))
            }
        }
    }
}

fn invalid(distribution: &'static str, e: impl std::fmt::Display) -> ModelError {
    ModelError::InvalidDistribution { distribution, detail: e.to_string() }
}

fn beta(alpha: f64, beta: f64, rng: &mut impl Rng) -> ModelResult<f64> {
    let dist = Beta::new(alpha, beta).map_err(|e| invalid("Beta", e))?;
    Ok(dist.sample(rng))
}

pub struct PerilConfig {
    pub hazard: &'static str,
    pub return_periods: &'static [f64],
    /// Beta parameters of the exposed share at the most frequent return period.
    pub base_exposure: (f64, f64),
    /// Pareto tail index of the exposure growth: fa grows like `rp^(1/α)`.
    pub tail: SeverityModel,
    /// Beta parameters of the early-warning share; `None` for unwarned perils.
    pub warning: Option<(f64, f64)>,
}

/// PLACEHOLDER calibration, loosely shaped on flood, earthquake and cyclone
/// exposure curves.
pub fn default_peril_configs() -> Vec<PerilConfig> {
    vec![
        PerilConfig {
            hazard: "flood",
            return_periods: &[5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0],
            base_exposure: (2.0, 60.0),
            tail: SeverityModel::Pareto { scale: 2.0, shape: 3.0 },
            warning: Some((3.0, 3.0)),
        },
        PerilConfig {
            hazard: "earthquake",
            return_periods: &[50.0, 100.0, 250.0, 500.0, 1000.0],
            base_exposure: (1.5, 80.0),
            tail: SeverityModel::Pareto { scale: 1.5, shape: 4.0 },
            warning: None,
        },
        PerilConfig {
            hazard: "cyclone",
            return_periods: &[10.0, 25.0, 50.0, 100.0, 250.0],
            base_exposure: (2.0, 40.0),
            tail: SeverityModel::Pareto { scale: 2.5, shape: 3.0 },
            warning: Some((5.0, 2.0)),
        },
    ]
}

/// Exposure curve over `config.return_periods`, non-decreasing and capped.
fn exposure_curve(config: &PerilConfig, rng: &mut impl Rng) -> ModelResult<Vec<(f64, f64)>> {
    let base = beta(config.base_exposure.0, config.base_exposure.1, rng)?;
    let index = config.tail.sample(rng)?;
    let first = config.return_periods.first().copied().unwrap_or(1.0);
    Ok(config
        .return_periods
        .iter()
        .map(|rp| (*rp, (base * (rp / first).powf(1.0 / index)).min(MAX_FA)))
        .collect())
}

fn synthetic_economy(name: &str, rng: &mut impl Rng) -> ModelResult<(EconomyRecord, [CategoryRecord; 2])> {
    // ── Households ─────────────────────────────────────────────────────────
    let k_nonpoor = SeverityModel::LogNormal { mu: 20_000f64.ln(), sigma: 0.8 }.sample(rng)?;
    let k_poor = k_nonpoor * rng.random_range(0.15..0.35);
    let v_poor = rng.random_range(0.4..0.8);
    let v_nonpoor = v_poor * rng.random_range(0.4..0.9);
    let axfin_nonpoor = beta(5.0, 2.0, rng)?;
    let axfin_poor = axfin_nonpoor * beta(2.0, 2.0, rng)?;

    let category = |income_cat, n, k, v, gamma_sp, axfin| CategoryRecord {
        economy: name.to_string(),
        income_cat,
        k,
        v,
        gamma_sp,
        axfin,
        n,
        fa: None,
        shew: None,
    };
    let categories = [
        category(IncomeCat::Poor, 0.2, k_poor, v_poor, rng.random_range(1.0..2.0), axfin_poor),
        category(IncomeCat::Nonpoor, 0.8, k_nonpoor, v_nonpoor, rng.random_range(0.7..1.0), axfin_nonpoor),
    ];

    // ── Economy ────────────────────────────────────────────────────────────
    let economy = EconomyRecord {
        name: name.to_string(),
        avg_prod_k: rng.random_range(0.25..0.4),
        tau_tax: rng.random_range(0.1..0.35),
        t_rebuild_k: rng.random_range(2.0..5.0),
        rho: 0.06,
        income_elast: 1.5,
        max_increased_spending: 0.05,
        borrow_abi: beta(2.0, 2.0, rng)?,
        prepare_scaleup: beta(2.0, 2.0, rng)?,
        shareable: 0.8,
        pop: SeverityModel::LogNormal { mu: 1e7f64.ln(), sigma: 1.0 }.sample(rng)?.round(),
        protection: PROTECTION_LEVELS[rng.random_range(0..PROTECTION_LEVELS.len())],
        gdp_pc_pp_nat: None,
    };
    Ok((economy, categories))
}

/// A scenario of `economies` synthetic economies exposed to every peril in
/// `configs`, run under `config`.
pub fn synthetic_scenario(
    economies: usize,
    configs: &[PerilConfig],
    config: ModelConfig,
    rng: &mut impl Rng,
) -> ModelResult<Scenario> {
    let mut scenario = Scenario {
        economies: Vec::with_capacity(economies),
        categories: Vec::with_capacity(2 * economies),
        hazards: None,
        config,
    };
    let mut hazards = Vec::new();
    for i in 0..economies {
        let name = format!("economy_{i:04}");
        let (economy, categories) = synthetic_economy(&name, rng)?;
        scenario.economies.push(economy);
        scenario.categories.extend(categories);

        for peril in configs {
            let shew = match peril.warning {
                Some((a, b)) => beta(a, b, rng)?,
                None => 0.0,
            };
            for (rp, fa) in exposure_curve(peril, rng)? {
                hazards.push(HazardRecord {
                    economy: name.clone(),
                    hazard: Some(peril.hazard.to_string()),
                    rp: Some(rp),
                    income_cat: None,
                    fa,
                    shew,
                    overrides: Default::default(),
                });
            }
        }
    }
    scenario.hazards = Some(hazards).filter(|h| !h.is_empty());
    Ok(scenario)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    fn rng() -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(42)
    }

    /// LogNormal(mu=9.9, sigma=0.8): E[X] = exp(9.9 + 0.32) ≈ 27_400.
    /// 10k samples must land within ±20 % of that.
    #[test]
    fn severity_lognormal_mean_in_expected_range() {
        let model = SeverityModel::LogNormal { mu: 9.9, sigma: 0.8 };
        let mut rng = rng();
        let n = 10_000;
        let mean: f64 = (0..n).map(|_| model.sample(&mut rng).unwrap()).sum::<f64>() / n as f64;
        let expected = (9.9_f64 + 0.8_f64 * 0.8 / 2.0).exp();
        let (lo, hi) = (expected * 0.8, expected * 1.2);
        assert!(mean >= lo && mean <= hi, "LogNormal mean {mean:.0} outside [{lo:.0}, {hi:.0}]");
    }

    #[test]
    fn pareto_samples_respect_scale() {
        let model = SeverityModel::Pareto { scale: 2.0, shape: 3.0 };
        let mut rng = rng();
        assert!((0..1000).all(|_| model.sample(&mut rng).unwrap() >= 2.0));
    }

    #[test]
    fn invalid_parameters_are_reported() {
        let model = SeverityModel::Pareto { scale: -1.0, shape: 3.0 };
        assert!(matches!(
            model.sample(&mut rng()).unwrap_err(),
            ModelError::InvalidDistribution { distribution: "Pareto", .. }
        ));
    }

    #[test]
    fn exposure_curves_are_monotone_and_capped() {
        let mut rng = rng();
        for config in default_peril_configs() {
            for _ in 0..50 {
                let curve = exposure_curve(&config, &mut rng).unwrap();
                assert_eq!(curve.len(), config.return_periods.len());
                for w in curve.windows(2) {
                    assert!(w[0].1 <= w[1].1, "{} {:?}", config.hazard, curve);
                }
                assert!(curve.iter().all(|(_, fa)| (0.0..=MAX_FA).contains(fa)));
            }
        }
    }

    #[test]
    fn same_seed_same_scenario() {
        let build = || {
            synthetic_scenario(5, &default_peril_configs(), ModelConfig::new(0.2), &mut rng()).unwrap()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn scenario_has_one_row_per_economy_category_and_event() {
        let configs = default_peril_configs();
        let s = synthetic_scenario(4, &configs, ModelConfig::new(0.2), &mut rng()).unwrap();
        assert_eq!(s.economies.len(), 4);
        assert_eq!(s.categories.len(), 8);
        let per_economy: usize = configs.iter().map(|c| c.return_periods.len()).sum();
        assert_eq!(s.hazards.as_ref().map(Vec::len), Some(4 * per_economy));
        for e in &s.economies {
            assert!(PROTECTION_LEVELS.contains(&e.protection));
        }
    }

    #[test]
    fn earthquakes_carry_no_early_warning() {
        let s = synthetic_scenario(3, &default_peril_configs(), ModelConfig::new(0.2), &mut rng()).unwrap();
        for h in s.hazards.unwrap() {
            if h.hazard.as_deref() == Some("earthquake") {
                assert_eq!(h.shew, 0.0);
            }
        }
    }

    #[test]
    fn synthetic_scenario_runs_end_to_end() {
        let s = synthetic_scenario(6, &default_peril_configs(), ModelConfig::new(0.2), &mut rng()).unwrap();
        let report = s.run().unwrap();
        assert_eq!(report.outcomes.len(), 6);
        for o in &report.outcomes {
            assert!(o.risk.is_finite() && o.risk > 0.0, "{o:?}");
            assert!(o.resilience.is_finite() && o.resilience > 0.0, "{o:?}");
        }
    }
}
