use crate::rules::DesignRules;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub rules: DesignRules,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub negotiated: NegotiatedConfig,
    #[serde(default)]
    pub monte_carlo: MonteCarloConfig,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    #[serde(default)]
    pub input: InputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RoutingConfig {
    /// `basic`, `negotiated` or `monte_carlo`.
    #[serde(default = "default_strategy")]
    pub strategy: String,
    /// Cost of a layer change, in orthogonal steps.
    #[serde(default = "default_via_cost")]
    pub via_cost: u32,
    #[serde(default)]
    pub allow_diagonal: bool,
    #[serde(default = "default_heuristic_weight")]
    pub heuristic_weight: f64,
    #[serde(default = "default_window_margin")]
    pub window_margin: u32,
    #[serde(default = "default_max_expansions")]
    pub max_expansions: usize,
    /// Wall-clock budget for a whole routing run; 0 disables it.
    #[serde(default)]
    pub timeout_secs: f64,
    #[serde(default)]
    pub use_corridors: bool,
    #[serde(default = "default_corridor_cell")]
    pub corridor_cell_mm: f64,
    #[serde(default)]
    pub strict_rules: bool,
    #[serde(default)]
    pub high_performance: bool,
    #[serde(default)]
    pub reroute_existing: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            via_cost: default_via_cost(),
            allow_diagonal: false,
            heuristic_weight: default_heuristic_weight(),
            window_margin: default_window_margin(),
            max_expansions: default_max_expansions(),
            timeout_secs: 0.0,
            use_corridors: false,
            corridor_cell_mm: default_corridor_cell(),
            strict_rules: false,
            high_performance: false,
            reroute_existing: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NegotiatedConfig {
    #[serde(default = "default_neg_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_neg_min_iterations")]
    pub min_iterations: usize,
    #[serde(default = "default_history_increment")]
    pub history_increment: f64,
    #[serde(default = "default_present_cost")]
    pub present_cost: f64,
    #[serde(default = "default_oscillation_window")]
    pub oscillation_window: usize,
    #[serde(default = "default_true")]
    pub legalize: bool,
}

impl Default for NegotiatedConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_neg_max_iterations(),
            min_iterations: default_neg_min_iterations(),
            history_increment: default_history_increment(),
            present_cost: default_present_cost(),
            oscillation_window: default_oscillation_window(),
            legalize: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MonteCarloConfig {
    #[serde(default = "default_num_trials")]
    pub num_trials: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub parallel: bool,
    /// Run the negotiated strategy inside every trial instead of the basic one.
    #[serde(default)]
    pub negotiated_trials: bool,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            num_trials: default_num_trials(),
            seed: default_seed(),
            parallel: false,
            negotiated_trials: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OptimizerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub merge_collinear: bool,
    #[serde(default = "default_true")]
    pub eliminate_zigzags: bool,
    #[serde(default = "default_true")]
    pub compress_staircase: bool,
    #[serde(default = "default_true")]
    pub minimize_vias: bool,
    #[serde(default)]
    pub convert_45_corners: bool,
    #[serde(default = "default_chamfer")]
    pub chamfer_length: f64,
    /// Longest middle leg a zigzag may have to be straightened.
    #[serde(default = "default_max_jog")]
    pub max_jog: f64,
    /// Longest other-layer excursion `minimize_vias` will pull back.
    #[serde(default = "default_max_via_detour")]
    pub max_via_detour: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            merge_collinear: true,
            eliminate_zigzags: true,
            compress_staircase: true,
            minimize_vias: true,
            convert_45_corners: false,
            chamfer_length: default_chamfer(),
            max_jog: default_max_jog(),
            max_via_detour: default_max_via_detour(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct InputConfig {
    #[serde(default)]
    pub board: String,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub skip_nets: Vec<String>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub power_nets: Vec<String>,
    #[serde(default)]
    pub high_speed_nets: Vec<String>,
    #[serde(default)]
    pub clock_nets: Vec<String>,
    #[serde(default)]
    pub relaxation_tiers: Option<usize>,
}

fn default_true() -> bool {
    true
}

fn default_strategy() -> String {
    "basic".to_string()
}

fn default_via_cost() -> u32 {
    10
}

fn default_heuristic_weight() -> f64 {
    1.0
}

fn default_window_margin() -> u32 {
    20
}

fn default_max_expansions() -> usize {
    2_000_000
}

fn default_corridor_cell() -> f64 {
    2.5
}

fn default_neg_max_iterations() -> usize {
    30
}

fn default_neg_min_iterations() -> usize {
    5
}

fn default_history_increment() -> f64 {
    1.0
}

fn default_present_cost() -> f64 {
    1.0
}

fn default_oscillation_window() -> usize {
    4
}

fn default_num_trials() -> usize {
    8
}

fn default_seed() -> u64 {
    42
}

fn default_chamfer() -> f64 {
    0.5
}

fn default_max_jog() -> f64 {
    1.0
}

fn default_max_via_detour() -> f64 {
    3.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.routing.strategy, "basic");
        assert_eq!(cfg.negotiated.max_iterations, 30);
        assert!(cfg.optimizer.enabled);
        assert!(!cfg.optimizer.convert_45_corners);
        assert!((cfg.rules.clearance - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let text = r#"
            [rules]
            clearance = 0.15

            [routing]
            strategy = "monte_carlo"

            [input]
            skip_nets = ["GND"]
            manufacturer = "oshpark"
        "#;
        let cfg: Config = toml::from_str(text).unwrap();
        assert!((cfg.rules.clearance - 0.15).abs() < 1e-12);
        assert!((cfg.rules.trace_width - 0.2).abs() < 1e-12);
        assert_eq!(cfg.routing.strategy, "monte_carlo");
        assert_eq!(cfg.routing.via_cost, 10);
        assert_eq!(cfg.input.skip_nets, vec!["GND".to_string()]);
        assert_eq!(cfg.input.manufacturer.as_deref(), Some("oshpark"));
        assert_eq!(cfg.monte_carlo.num_trials, 8);
    }

    #[test]
    fn test_shipped_config_parses() {
        let cfg: Config = toml::from_str(include_str!("../../../config.toml")).unwrap();
        assert_eq!(cfg.routing.strategy, "negotiated");
        assert_eq!(cfg.rules.net_classes["Power"].trace_width, Some(0.4));
        assert!(cfg.monte_carlo.parallel);
    }
}
