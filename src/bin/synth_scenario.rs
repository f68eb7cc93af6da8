use std::collections::BTreeMap;
use std::env;

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rind::config::ModelConfig;
use rind::perils::{default_peril_configs, synthetic_scenario};

/// `synth_scenario [ECONOMIES] [SEED]`: scenario JSON on stdout, summary on stderr.
fn main() {
    env_logger::init();
    let n_economies: usize = env::args().nth(1).and_then(|s| s.parse().ok()).unwrap_or(20);
    let seed: u64 = env::args().nth(2).and_then(|s| s.parse().ok()).unwrap_or(42);

    let configs = default_peril_configs();
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let scenario = synthetic_scenario(n_economies, &configs, ModelConfig::new(0.2), &mut rng)
        .expect("failed to generate scenario");

    println!("{}", scenario.to_json().expect("serialisation failed"));

    let hazards = scenario.hazards.as_deref().unwrap_or_default();
    eprintln!(
        "synth_scenario: seed {seed}, {} economies, {} category rows, {} hazard rows",
        scenario.economies.len(),
        scenario.categories.len(),
        hazards.len()
    );

    // Per-hazard exposure at the rarest return period.
    let mut rarest: BTreeMap<&str, (f64, Vec<f64>)> = BTreeMap::new();
    for h in hazards {
        let (Some(name), Some(rp)) = (h.hazard.as_deref(), h.rp) else { continue };
        let entry = rarest.entry(name).or_insert((rp, Vec::new()));
        if rp > entry.0 {
            *entry = (rp, Vec::new());
        }
        if rp == entry.0 {
            entry.1.push(h.fa);
        }
    }
    for (name, (rp, fa)) in &rarest {
        let mean = fa.iter().sum::<f64>() / fa.len().max(1) as f64;
        let max = fa.iter().copied().fold(0.0, f64::max);
        eprintln!("  hazard={name:<12}  rp={rp:>6.0}  mean_fa={mean:.4}  max_fa={max:.4}");
    }

    let mut protection: BTreeMap<u64, usize> = BTreeMap::new();
    for e in &scenario.economies {
        *protection.entry(e.protection as u64).or_insert(0) += 1;
    }
    for (years, count) in protection {
        eprintln!("  protection={years:>4}y  economies={count:>4}");
    }
}
