use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::error::ModelResult;
use crate::inputs::{CategoryRecord, EconomyRecord, HazardRecord, ModelInputs};
use crate::model::{ResilienceReport, compute_resilience};
use crate::types::IncomeCat;

/// Input records plus the configuration to run them under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub economies: Vec<EconomyRecord>,
    pub categories: Vec<CategoryRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hazards: Option<Vec<HazardRecord>>,
    pub config: ModelConfig,
}

fn household(economy: &str, income_cat: IncomeCat, n: f64, k: f64, v: f64, gamma_sp: f64, axfin: f64) -> CategoryRecord {
    CategoryRecord {
        economy: economy.to_string(),
        income_cat,
        k,
        v,
        gamma_sp,
        axfin,
        n,
        fa: None,
        shew: None,
    }
}

fn exposure(economy: &str, hazard: &str, rp: f64, fa: f64, shew: f64) -> HazardRecord {
    HazardRecord {
        economy: economy.to_string(),
        hazard: Some(hazard.to_string()),
        rp: Some(rp),
        income_cat: None,
        fa,
        shew,
        overrides: Default::default(),
    }
}

impl Scenario {
    /// Three stylised economies exposed to floods and earthquakes.
    pub fn canonical() -> Self {
        // ── Economies ─────────────────────────────────────────────────────────
        // Capital per person in USD PPP. Protection in years of return period.
        let economies = vec![
            EconomyRecord {
                name: "Arcadia".to_string(),
                avg_prod_k: 0.33,
                tau_tax: 0.22,
                t_rebuild_k: 3.0,
                rho: 0.06,
                income_elast: 1.5,
                max_increased_spending: 0.05,
                borrow_abi: 0.6,
                prepare_scaleup: 0.5,
                shareable: 0.8,
                pop: 12_000_000.0,
                protection: 10.0,
                gdp_pc_pp_nat: None,
            },
            EconomyRecord {
                name: "Borealis".to_string(),
                avg_prod_k: 0.28,
                tau_tax: 0.30,
                t_rebuild_k: 2.0,
                rho: 0.06,
                income_elast: 1.5,
                max_increased_spending: 0.05,
                borrow_abi: 0.9,
                prepare_scaleup: 0.8,
                shareable: 0.8,
                pop: 5_500_000.0,
                protection: 50.0,
                gdp_pc_pp_nat: None,
            },
            EconomyRecord {
                name: "Cascadia".to_string(),
                avg_prod_k: 0.36,
                tau_tax: 0.12,
                t_rebuild_k: 4.0,
                rho: 0.06,
                income_elast: 1.5,
                max_increased_spending: 0.05,
                borrow_abi: 0.3,
                prepare_scaleup: 0.2,
                shareable: 0.8,
                pop: 48_000_000.0,
                protection: 2.0,
                gdp_pc_pp_nat: None,
            },
        ];

        // ── Household categories: bottom 20 % are poor ────────────────────────
        let categories = vec![
            household("Arcadia", IncomeCat::Poor, 0.2, 9_000.0, 0.55, 1.4, 0.1),
            household("Arcadia", IncomeCat::Nonpoor, 0.8, 42_000.0, 0.30, 0.9, 0.5),
            household("Borealis", IncomeCat::Poor, 0.2, 30_000.0, 0.35, 1.6, 0.6),
            household("Borealis", IncomeCat::Nonpoor, 0.8, 120_000.0, 0.20, 0.85, 0.9),
            household("Cascadia", IncomeCat::Poor, 0.2, 2_500.0, 0.70, 1.2, 0.05),
            household("Cascadia", IncomeCat::Nonpoor, 0.8, 11_000.0, 0.45, 0.95, 0.2),
        ];

        // ── Exposure curves ───────────────────────────────────────────────────
        let mut hazards = Vec::new();
        for (economy, scale, shew) in [("Arcadia", 1.0, 0.3), ("Borealis", 0.6, 0.8), ("Cascadia", 1.6, 0.05)] {
            for (rp, fa) in [(5.0, 0.02), (20.0, 0.05), (100.0, 0.12), (500.0, 0.2)] {
                hazards.push(exposure(economy, "flood", rp, fa * scale, shew));
            }
            for (rp, fa) in [(50.0, 0.03), (250.0, 0.1), (1000.0, 0.25)] {
                hazards.push(exposure(economy, "earthquake", rp, fa * scale, 0.0));
            }
        }

        Scenario { economies, categories, hazards: Some(hazards), config: ModelConfig::new(0.2) }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> ModelResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn to_json(&self) -> ModelResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn inputs(&self) -> ModelResult<ModelInputs> {
        ModelInputs::from_records(&self.economies, &self.categories, self.hazards.as_deref())
    }

    pub fn run(&self) -> ModelResult<ResilienceReport> {
        compute_resilience(&self.inputs()?, &self.config)
    }
}
