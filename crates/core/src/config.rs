use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Top-level engine configuration, one section per component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub trail: TrailConfig,
    #[serde(default)]
    pub manager: ManagerSettings,
    #[serde(default)]
    pub gateway: GatewayPolicy,
}

/// Signal quality gate thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Absolute confidence floor applied before tier assignment
    #[serde(default = "default_confidence_floor")]
    pub confidence_floor: f64,
    /// Minimum confidence for the Scout tier
    #[serde(default = "default_scout_min")]
    pub scout_min: f64,
    /// Minimum confidence for the Standard tier
    #[serde(default = "default_standard_min")]
    pub standard_min: f64,
    /// Minimum confidence for the Prime tier
    #[serde(default = "default_prime_min")]
    pub prime_min: f64,
    /// Minimum expected return (fraction) for profitability
    #[serde(default = "default_min_expected_return")]
    pub min_expected_return: f64,
    /// Minimum volume-surge ratio; below this rejects regardless of confidence
    #[serde(default = "default_min_volume_ratio")]
    pub min_volume_ratio: f64,
}

const fn default_confidence_floor() -> f64 {
    0.70
}

const fn default_scout_min() -> f64 {
    0.75
}

const fn default_standard_min() -> f64 {
    0.80
}

const fn default_prime_min() -> f64 {
    0.85
}

const fn default_min_expected_return() -> f64 {
    0.01 // 1%
}

const fn default_min_volume_ratio() -> f64 {
    1.2
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            confidence_floor: default_confidence_floor(),
            scout_min: default_scout_min(),
            standard_min: default_standard_min(),
            prime_min: default_prime_min(),
            min_expected_return: default_min_expected_return(),
            min_volume_ratio: default_min_volume_ratio(),
        }
    }
}

/// Risk and sizing limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Starting equity when no persisted risk state exists
    #[serde(default = "default_initial_equity")]
    pub initial_equity: Decimal,
    /// Base allocation as a fraction of available cash
    #[serde(default = "default_base_allocation")]
    pub base_allocation_pct: f64,
    /// Hard per-trade cap as a fraction of equity
    #[serde(default = "default_max_per_trade")]
    pub max_per_trade_pct: f64,
    #[serde(default = "default_max_open_positions")]
    pub max_open_positions: usize,
    #[serde(default = "default_max_daily_trades")]
    pub max_daily_trades: u32,
    /// Account-level losing streak that trips safe mode
    #[serde(default = "default_max_consecutive_losses")]
    pub max_consecutive_losses: u32,
    /// Per-symbol losing streak that suspends the symbol
    #[serde(default = "default_symbol_loss_cap")]
    pub symbol_loss_cap: u32,
    /// Drawdown from peak equity that trips safe mode
    #[serde(default = "default_max_drawdown")]
    pub max_drawdown_pct: f64,
    /// Allocation multiplier for Scout-tier signals
    #[serde(default = "default_scout_multiplier")]
    pub scout_multiplier: f64,
    /// Allocation multiplier for Standard-tier signals
    #[serde(default = "default_standard_multiplier")]
    pub standard_multiplier: f64,
    /// Allocation multiplier for Prime-tier signals
    #[serde(default = "default_prime_multiplier")]
    pub prime_multiplier: f64,
    /// Force-close open positions when safe mode activates
    #[serde(default = "default_liquidate_on_safe_mode")]
    pub liquidate_on_safe_mode: bool,
}

fn default_initial_equity() -> Decimal {
    Decimal::from(10_000)
}

const fn default_base_allocation() -> f64 {
    0.10 // 10% of available cash
}

const fn default_max_per_trade() -> f64 {
    0.20 // 20% of equity
}

const fn default_max_open_positions() -> usize {
    10
}

const fn default_max_daily_trades() -> u32 {
    20
}

const fn default_max_consecutive_losses() -> u32 {
    5
}

const fn default_symbol_loss_cap() -> u32 {
    8
}

const fn default_max_drawdown() -> f64 {
    0.10 // 10% from peak
}

const fn default_scout_multiplier() -> f64 {
    0.8
}

const fn default_standard_multiplier() -> f64 {
    1.0
}

const fn default_prime_multiplier() -> f64 {
    1.5
}

const fn default_liquidate_on_safe_mode() -> bool {
    true
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            initial_equity: default_initial_equity(),
            base_allocation_pct: default_base_allocation(),
            max_per_trade_pct: default_max_per_trade(),
            max_open_positions: default_max_open_positions(),
            max_daily_trades: default_max_daily_trades(),
            max_consecutive_losses: default_max_consecutive_losses(),
            symbol_loss_cap: default_symbol_loss_cap(),
            max_drawdown_pct: default_max_drawdown(),
            scout_multiplier: default_scout_multiplier(),
            standard_multiplier: default_standard_multiplier(),
            prime_multiplier: default_prime_multiplier(),
            liquidate_on_safe_mode: default_liquidate_on_safe_mode(),
        }
    }
}

/// Trailing-protection distance, an explicit per-strategy choice.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailDistance {
    /// Distance as a fraction of the trailing reference price
    Percent(f64),
    /// Distance as a fixed dollar amount
    Fixed(Decimal),
}

/// Stealth trailing stop / take-profit parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrailConfig {
    /// Static protective stop distance from entry
    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: f64,
    /// Static profit target distance from entry
    #[serde(default = "default_take_profit_pct")]
    pub take_profit_pct: f64,
    /// Favorable excursion that activates trailing
    #[serde(default = "default_breakeven_activation")]
    pub breakeven_activation_pct: f64,
    /// How far the stop trails the best favorable price
    #[serde(default = "default_trail_distance")]
    pub distance: TrailDistance,
}

const fn default_stop_loss_pct() -> f64 {
    0.02 // 2%
}

const fn default_take_profit_pct() -> f64 {
    0.04 // 4%
}

const fn default_breakeven_activation() -> f64 {
    0.005 // +0.5%
}

const fn default_trail_distance() -> TrailDistance {
    TrailDistance::Percent(0.02)
}

impl Default for TrailConfig {
    fn default() -> Self {
        Self {
            stop_loss_pct: default_stop_loss_pct(),
            take_profit_pct: default_take_profit_pct(),
            breakeven_activation_pct: default_breakeven_activation(),
            distance: default_trail_distance(),
        }
    }
}

/// Trade manager cycle and close-retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerSettings {
    /// Monitor cycle period during market hours
    #[serde(default = "default_monitor_interval")]
    pub monitor_interval_secs: u64,
    /// Evaluation worker-pool bound
    #[serde(default = "default_max_concurrent_evaluations")]
    pub max_concurrent_evaluations: usize,
    /// Failed-close count that raises an intervention alert
    #[serde(default = "default_max_close_attempts")]
    pub max_close_attempts: u32,
    /// Base delay of the cross-cycle close-retry backoff
    #[serde(default = "default_close_backoff_base")]
    pub close_backoff_base_secs: u64,
    /// Ceiling of the close-retry backoff
    #[serde(default = "default_close_backoff_cap")]
    pub close_backoff_cap_secs: u64,
    /// Sweep all open positions at the session boundary
    #[serde(default)]
    pub close_at_session_end: bool,
}

const fn default_monitor_interval() -> u64 {
    30
}

const fn default_max_concurrent_evaluations() -> usize {
    8
}

const fn default_max_close_attempts() -> u32 {
    5
}

const fn default_close_backoff_base() -> u64 {
    30
}

const fn default_close_backoff_cap() -> u64 {
    600
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            monitor_interval_secs: default_monitor_interval(),
            max_concurrent_evaluations: default_max_concurrent_evaluations(),
            max_close_attempts: default_max_close_attempts(),
            close_backoff_base_secs: default_close_backoff_base(),
            close_backoff_cap_secs: default_close_backoff_cap(),
            close_at_session_end: false,
        }
    }
}

/// Timeout and retry budgets for execution gateway calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPolicy {
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
    /// Open-side attempts; a missed entry is low-cost
    #[serde(default = "default_open_attempts")]
    pub open_attempts: u32,
    /// Close-side attempts per cycle; cross-cycle retry continues on top
    #[serde(default = "default_close_attempts")]
    pub close_attempts: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

const fn default_call_timeout() -> u64 {
    15
}

const fn default_open_attempts() -> u32 {
    2
}

const fn default_close_attempts() -> u32 {
    3
}

const fn default_backoff_base_ms() -> u64 {
    500
}

impl Default for GatewayPolicy {
    fn default() -> Self {
        Self {
            call_timeout_secs: default_call_timeout(),
            open_attempts: default_open_attempts(),
            close_attempts: default_close_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}
