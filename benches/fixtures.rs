use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use rind::config::ModelConfig;
use rind::expand::{EventTables, derive_consumption, expand_events, macro_multiplier, prepare};
use rind::perils::{default_peril_configs, synthetic_scenario};
use rind::scenario::Scenario;
use rind::table::Frame;
use rind::types::col;

pub struct Size {
    pub economies: usize,
    pub seed: u64,
}

pub const SMALL: Size = Size { economies: 5, seed: 42 };

pub const MEDIUM: Size = Size { economies: 50, seed: 42 };

pub const LARGE: Size = Size { economies: 250, seed: 42 };

pub fn build_scenario(size: &Size, config: ModelConfig) -> Scenario {
    let mut rng = ChaCha20Rng::seed_from_u64(size.seed);
    synthetic_scenario(size.economies, &default_peril_configs(), config, &mut rng)
        .expect("synthetic scenario")
}

/// Event tables after preparation, ready for the shock and response stages.
pub fn event_tables(scenario: &Scenario) -> EventTables {
    let prepared = prepare(&scenario.inputs().expect("inputs")).expect("prepare");
    let (mut economies, categories) =
        derive_consumption(&prepared.economies, &prepared.categories).expect("consumption");
    let multiplier = macro_multiplier(&economies).expect("multiplier");
    economies.set_column(col::MACRO_MULTIPLIER, multiplier).expect("set multiplier");
    expand_events(&economies, &categories, &prepared.hazards, scenario.config.early_warning_efficacy)
        .expect("expand events")
}

/// Hazard ratios of a scenario as a frame, before interpolation.
pub fn hazard_frame(scenario: &Scenario) -> Frame {
    scenario.inputs().expect("inputs").hazards.expect("hazards")
}
