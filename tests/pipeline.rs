use rind::average::exceedance_probabilities;
use rind::config::{Budget, Distribution, Financing, LossMeasure, ModelConfig, PolicyOptions, Targeting};
use rind::error::ModelError;
use rind::expand::{derive_consumption, expand_events, macro_multiplier, prepare};
use rind::inputs::{CategoryRecord, EconomyRecord, HazardRecord};
use rind::model::ResilienceReport;
use rind::response::{post_disaster_support, respond};
use rind::scenario::Scenario;
use rind::shock::compute_shock;
use rind::table::Frame;
use rind::types::{AffectedCat, HelpedCat, IncomeCat, Label, ReturnPeriod, col, dim};

fn economy(name: &str, protection: f64) -> EconomyRecord {
    EconomyRecord {
        name: name.to_string(),
        avg_prod_k: 0.3,
        tau_tax: 0.2,
        t_rebuild_k: 3.0,
        rho: 0.06,
        income_elast: 1.5,
        max_increased_spending: 0.05,
        borrow_abi: 0.5,
        prepare_scaleup: 0.4,
        shareable: 0.8,
        pop: 1_000_000.0,
        protection,
        gdp_pc_pp_nat: None,
    }
}

fn category(economy: &str, income_cat: IncomeCat, n: f64, k: f64, v: f64) -> CategoryRecord {
    CategoryRecord {
        economy: economy.to_string(),
        income_cat,
        k,
        v,
        gamma_sp: if income_cat == IncomeCat::Poor { 1.5 } else { 0.8 },
        axfin: 0.3,
        n,
        fa: None,
        shew: None,
    }
}

fn flood(economy: &str, rp: f64, fa: f64) -> HazardRecord {
    HazardRecord {
        economy: economy.to_string(),
        hazard: Some("flood".to_string()),
        rp: Some(rp),
        income_cat: None,
        fa,
        shew: 0.0,
        overrides: Default::default(),
    }
}

/// One economy, one hazard at rp 10 and 100, protected up to rp 10.
fn two_period_scenario(nonpoor_v: f64) -> Scenario {
    let mut config = ModelConfig::new(0.2).with_policy(PolicyOptions {
        targeting: Targeting::Data,
        budget: Budget::UnifPoor,
        distribution: Distribution::UnifPoor,
        financing: Financing::Tax,
    });
    config.return_iah = true;
    Scenario {
        economies: vec![economy("A", 10.0)],
        categories: vec![
            category("A", IncomeCat::Poor, 0.3, 2_000.0, 0.6),
            category("A", IncomeCat::Nonpoor, 0.7, 10_000.0, nonpoor_v),
        ],
        hazards: Some(vec![flood("A", 10.0, 0.1), flood("A", 100.0, 0.3)]),
        config,
    }
}

fn rows_where(iah: &Frame, filters: &[(&str, Label)]) -> Frame {
    let mut keep = vec![true; iah.len()];
    for (dim, label) in filters {
        for (k, m) in keep.iter_mut().zip(iah.mask(dim, label).unwrap()) {
            *k &= m;
        }
    }
    iah.filter(&keep).unwrap()
}

fn weighted_sum(frame: &Frame, column: &str) -> f64 {
    let n = frame.column(col::N).unwrap();
    frame.column(column).unwrap().iter().zip(n).map(|(v, n)| v * n).sum()
}

fn rp(years: f64) -> Label {
    Label::Period(ReturnPeriod::Years(years))
}

fn run(scenario: &Scenario) -> ResilienceReport {
    scenario.run().unwrap()
}

#[test]
fn protection_drops_the_frequent_event() {
    assert_eq!(exceedance_probabilities(&[10.0, 100.0]), vec![0.1 - 0.01, 0.01]);

    let report = run(&two_period_scenario(0.3));
    let iah = report.iah.as_ref().unwrap();
    let rp100 = rows_where(iah, &[(dim::RP, rp(100.0))]);
    let event_dk = weighted_sum(&rp100, col::DK);
    let event_dw = weighted_sum(&rp100, col::DW);

    let a = report.outcome("A").unwrap();
    assert!((a.dk - 0.01 * event_dk).abs() < 1e-9 * a.dk);
    assert!((a.delta_w - 0.01 * event_dw).abs() < 1e-9 * a.delta_w);
}

#[test]
fn poor_targeted_budget_follows_affected_poor_losses() {
    let report = run(&two_period_scenario(0.3));
    let iah = report.iah.as_ref().unwrap();
    let a = report.outcome("A").unwrap();

    let affected_poor = rows_where(
        iah,
        &[
            (dim::RP, rp(100.0)),
            (dim::INCOME_CAT, Label::from(IncomeCat::Poor)),
            (dim::AFFECTED_CAT, Label::from(AffectedCat::Affected)),
        ],
    );
    let need = 0.8 * weighted_sum(&affected_poor, col::DK);
    let max_aid = 0.05 * 0.5 * a.gdp_pc_pp;
    let aid = need.min(max_aid);

    let helped = rows_where(iah, &[(dim::RP, rp(100.0)), (dim::HELPED_CAT, Label::from(HelpedCat::Helped))]);
    assert!((weighted_sum(&helped, col::HELP_RECEIVED) - aid).abs() < 1e-9 * aid);
    assert!((a.average_aid_cost_pc - 0.01 * aid).abs() < 1e-12 + 1e-9 * aid);

    // every helped household gets the same amount, whatever its income
    let per_head = aid / helped.column(col::N).unwrap().iter().sum::<f64>();
    for income_cat in IncomeCat::ALL {
        let rows = rows_where(&helped, &[(dim::INCOME_CAT, Label::from(income_cat))]);
        for h in rows.column(col::HELP_RECEIVED).unwrap() {
            assert!((h - per_head).abs() < 1e-9 * per_head, "{}: {h} vs {per_head}", income_cat.as_str());
        }
    }
}

#[test]
fn nonpoor_vulnerability_does_not_move_the_poor_budget() {
    let low = run(&two_period_scenario(0.2));
    let high = run(&two_period_scenario(0.4));
    let (low_a, high_a) = (low.outcome("A").unwrap(), high.outcome("A").unwrap());
    assert!(high_a.dk > low_a.dk);
    assert!((high_a.average_aid_cost_pc - low_a.average_aid_cost_pc).abs() < 1e-12);
}

#[test]
fn protection_beyond_every_event_zeroes_losses() {
    let mut scenario = two_period_scenario(0.3);
    scenario.economies[0].protection = 1_000.0;
    let report = run(&scenario);
    let a = report.outcome("A").unwrap();
    assert_eq!(a.dk, 0.0);
    assert_eq!(a.delta_w, 0.0);
    assert_eq!(a.average_aid_cost_pc, 0.0);
}

#[test]
fn insurance_tops_up_the_observed_response() {
    let scenario = Scenario::canonical();
    let mut config = scenario.config.clone().with_policy(PolicyOptions {
        targeting: Targeting::Perfect,
        budget: Budget::Unlimited,
        distribution: Distribution::Prop,
        financing: Financing::InsurancePremium,
    });
    config.share_insured = 0.3;

    let prepared = prepare(&scenario.inputs().unwrap()).unwrap();
    let (mut economies, categories) = derive_consumption(&prepared.economies, &prepared.categories).unwrap();
    let multiplier = macro_multiplier(&economies).unwrap();
    economies.set_column(col::MACRO_MULTIPLIER, multiplier).unwrap();
    let events = expand_events(&economies, &categories, &prepared.hazards, config.early_warning_efficacy).unwrap();
    let (macro_event, cats_ia) = compute_shock(&events.macro_event, &events.cats_event).unwrap();

    let combined = post_disaster_support(&macro_event, &cats_ia, &config).unwrap();
    let baseline = respond(&macro_event, &cats_ia, PolicyOptions::BASELINE, 1.0, LossMeasure::Dk).unwrap();
    let mut insured_event = macro_event.clone();
    insured_event.fill_column(col::SHAREABLE, 0.3);
    let insured = respond(&insured_event, &cats_ia, config.policy, 1.0, LossMeasure::Dk).unwrap();

    let total = combined.iah.column(col::HELP_RECEIVED).unwrap();
    let base = combined.iah.align(&baseline.iah, col::HELP_RECEIVED).unwrap();
    let extra = combined.iah.align(&insured.iah, col::HELP_RECEIVED).unwrap();
    for i in 0..total.len() {
        assert!((total[i] - base[i] - extra[i]).abs() < 1e-9 * (1.0 + total[i].abs()));
    }
    assert_eq!(
        combined.macro_event.column(col::SHAREABLE).unwrap(),
        macro_event.column(col::SHAREABLE).unwrap()
    );
}

#[test]
fn economies_missing_a_table_are_reported_not_computed() {
    let mut scenario = two_period_scenario(0.3);
    scenario.categories.push(category("Z", IncomeCat::Poor, 1.0, 500.0, 0.5));
    let report = run(&scenario);
    assert_eq!(report.dropped_economies, vec!["Z".to_string()]);
    assert_eq!(report.outcomes.len(), 1);
}

#[test]
fn category_exposure_is_used_without_hazard_table() {
    let mut scenario = two_period_scenario(0.3);
    scenario.hazards = None;
    for c in &mut scenario.categories {
        c.fa = Some(0.05);
    }
    let a = run(&scenario).outcomes.remove(0);
    // a sentinel event of annual probability 1/protection
    assert!(a.dk > 0.0 && a.delta_w > 0.0);

    scenario.economies[0].protection = 0.0;
    assert!(matches!(scenario.run().unwrap_err(), ModelError::ZeroProtection { .. }));
}

#[test]
fn repeated_runs_are_identical() {
    let scenario = Scenario::canonical();
    let first = run(&scenario);
    let second = run(&scenario);
    assert_eq!(first.outcomes, second.outcomes);
}

#[test]
fn scenario_files_load_from_disk() {
    let path = std::env::temp_dir().join(format!("rind-scenario-{}.json", std::process::id()));
    let scenario = two_period_scenario(0.3);
    std::fs::write(&path, scenario.to_json().unwrap()).unwrap();
    let loaded = Scenario::from_json_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(loaded, scenario);
}

#[test]
fn unknown_policy_spellings_are_rejected_in_scenario_files() {
    let mut json: serde_json::Value = serde_json::from_str(&Scenario::canonical().to_json().unwrap()).unwrap();
    json["config"]["distribution"] = serde_json::Value::String("everyone".to_string());
    assert!(serde_json::from_value::<Scenario>(json).is_err());
}
