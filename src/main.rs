use std::fs::File;
use std::io::BufWriter;

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rind::analysis::{self, DistStats, ReportSummary};
use rind::config::ModelConfig;
use rind::model::ResilienceReport;
use rind::perils::{default_peril_configs, synthetic_scenario};
use rind::scenario::Scenario;

const USAGE: &str = "usage: rind [--scenario FILE | --synthetic N [--seed S]] [--targeting T] [--budget B] \
[--distribution D] [--financing F] [--loss-measure M] [--early-warning E] [--iah] [--stats] [--output FILE] [--quiet]";

/// Print `message` and the usage line, then exit non-zero.
fn fail(message: &str) -> ! {
    eprintln!("rind: {message}\n{USAGE}");
    std::process::exit(2)
}

#[derive(Debug)]
struct Options {
    scenario_path: Option<String>,
    synthetic: Option<usize>,
    seed: u64,
    output_path: Option<String>,
    quiet: bool,
    config: ModelConfig,
    efficacy: Option<f64>,
}

fn parse_arg<T: std::str::FromStr>(flag: &str, value: Option<&String>) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    let value = value.ok_or_else(|| format!("{flag} requires a value"))?;
    value.parse().map_err(|e| format!("{flag} {value}: {e}"))
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut opts = Options {
        scenario_path: None,
        synthetic: None,
        seed: 42,
        output_path: None,
        quiet: false,
        config: ModelConfig::new(0.2),
        efficacy: None,
    };
    let mut args = args.iter();
    while let Some(flag) = args.next() {
        let flag = flag.as_str();
        match flag {
            "--scenario" => opts.scenario_path = Some(parse_arg(flag, args.next())?),
            "--synthetic" => opts.synthetic = Some(parse_arg(flag, args.next())?),
            "--seed" => opts.seed = parse_arg(flag, args.next())?,
            "--targeting" => opts.config.policy.targeting = parse_arg(flag, args.next())?,
            "--budget" => opts.config.policy.budget = parse_arg(flag, args.next())?,
            "--distribution" => opts.config.policy.distribution = parse_arg(flag, args.next())?,
            "--financing" => opts.config.policy.financing = parse_arg(flag, args.next())?,
            "--loss-measure" => opts.config.loss_measure = parse_arg(flag, args.next())?,
            "--early-warning" => opts.efficacy = Some(parse_arg(flag, args.next())?),
            "--iah" => opts.config.return_iah = true,
            "--stats" => opts.config.return_stats = true,
            "--output" => opts.output_path = Some(parse_arg(flag, args.next())?),
            "--quiet" => opts.quiet = true,
            _ => return Err(format!("unknown argument {flag}")),
        }
    }
    Ok(opts)
}

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let opts = parse_args(&args).unwrap_or_else(|e| fail(&e));

    // Policy flags apply on top of a scenario file's own config.
    let overrides = opts.config;
    let mut scenario = match (opts.scenario_path, opts.synthetic) {
        (Some(path), _) => {
            let mut s = Scenario::from_json_file(&path).unwrap_or_else(|e| fail(&format!("failed to load {path}: {e}")));
            s.config.policy = overrides.policy;
            s.config.loss_measure = overrides.loss_measure;
            s.config.return_iah |= overrides.return_iah;
            s.config.return_stats |= overrides.return_stats;
            s
        }
        (None, Some(n)) => {
            let mut rng = ChaCha20Rng::seed_from_u64(opts.seed);
            synthetic_scenario(n, &default_peril_configs(), overrides, &mut rng)
                .unwrap_or_else(|e| fail(&format!("failed to generate synthetic scenario: {e}")))
        }
        (None, None) => Scenario { config: overrides, ..Scenario::canonical() },
    };
    if let Some(e) = opts.efficacy {
        scenario.config.early_warning_efficacy = e;
    }

    let report = scenario.run().unwrap_or_else(|e| fail(&format!("model run failed: {e}")));

    if let Some(path) = opts.output_path {
        let file = File::create(&path).unwrap_or_else(|e| fail(&format!("failed to create {path}: {e}")));
        serde_json::to_writer_pretty(BufWriter::new(file), &report)
            .unwrap_or_else(|e| fail(&format!("failed to write {path}: {e}")));
    }

    if !opts.quiet {
        let p = scenario.config.policy;
        println!(
            "Policy: targeting={} budget={} distribution={} financing={}",
            p.targeting, p.budget, p.distribution, p.financing
        );
        print_outcomes(&report);
        if let Some(summary) = analysis::summarise(&report) {
            print_summary(&summary);
        }
    }
}

fn print_outcomes(report: &ResilienceReport) {
    println!("\n=== Economy outcomes ===");
    println!(
        "{:<14} | {:>10} | {:>6} | {:>10} | {:>10} | {:>10} | {:>7} | {:>11} | {:>7}",
        "Economy", "GDP pc", "MM", "dK pc", "dW pc ($)", "Aid pc", "Risk%", "Resilience%", "RtA%"
    );
    println!("{}", "-".repeat(14 + 10 + 6 + 10 + 10 + 10 + 7 + 11 + 7 + 3 * 8));
    for o in &report.outcomes {
        println!(
            "{:<14} | {:>10.0} | {:>6.3} | {:>10.2} | {:>10.2} | {:>10.2} | {:>6.3}% | {:>10.1}% | {:>6.3}%",
            o.economy,
            o.gdp_pc_pp,
            o.macro_multiplier,
            o.dk,
            o.dw_pc_currency,
            o.average_aid_cost_pc,
            o.risk * 100.0,
            o.resilience * 100.0,
            o.risk_to_assets * 100.0,
        );
    }
    if !report.dropped_economies.is_empty() {
        println!("\nDropped (missing from an input table): {}", report.dropped_economies.join(", "));
    }
}

fn print_dist_row(title: &str, ds: &DistStats, scale: f64) {
    println!(
        "{:<12} | {:>8.2} | {:>8.2} | {:>8.2} | {:>8.2} | {:>8.2} | {:>8.2} | {:>8.2} | {:>8.2}",
        title,
        ds.min * scale,
        ds.p5 * scale,
        ds.p25 * scale,
        ds.p50 * scale,
        ds.p75 * scale,
        ds.p95 * scale,
        ds.max * scale,
        ds.mean * scale,
    );
}

fn print_summary(summary: &ReportSummary) {
    println!("\n=== Distribution across {} economies (%) ===", summary.economies);
    println!(
        "{:<12} | {:>8} | {:>8} | {:>8} | {:>8} | {:>8} | {:>8} | {:>8} | {:>8}",
        "Indicator", "min", "p5", "p25", "p50", "p75", "p95", "max", "mean"
    );
    print_dist_row("Risk", &summary.risk, 100.0);
    print_dist_row("Resilience", &summary.resilience, 100.0);
    print_dist_row("RiskToAssets", &summary.risk_to_assets, 100.0);
    print!(
        "\nTotal asset losses {:.3e}/yr, welfare losses {:.3e}/yr",
        summary.total_asset_losses, summary.total_welfare_losses_currency
    );
    match summary.aggregate_resilience() {
        Some(r) => println!(", aggregate resilience {:.1}%", r * 100.0),
        None => println!(),
    }
    println!("Least resilient: {}", summary.least_resilient);
}
