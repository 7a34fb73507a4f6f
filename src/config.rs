use crate::{
    amount::Amount,
    cases::{
        CaseCatalogEntry,
        default_catalog,
    },
    crash::deadline::{
        DeadlineBucket,
        default_buckets,
        validate_buckets,
    },
    error::ConfigError,
    gifts::{
        GiftTemplate,
        default_prize_pool,
    },
    timers::Millis,
    wallet::Currency,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    collections::HashSet,
    path::{
        Path,
        PathBuf,
    },
};

/// Every tunable of the simulation. Missing JSON fields fall back to defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub crash: CrashConfig,
    pub cases: CaseConfig,
    pub wallet: WalletConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotProfile {
    pub nickname: String,
    pub avatar: String,
}

impl BotProfile {
    fn new(nickname: &str, avatar: &str) -> Self {
        Self {
            nickname: nickname.to_string(),
            avatar: avatar.to_string(),
        }
    }
}

pub fn default_bots() -> Vec<BotProfile> {
    vec![
        BotProfile::new("CryptoKing", "👑"),
        BotProfile::new("MoonLambo", "🚀"),
        BotProfile::new("DiamondHands", "💎"),
        BotProfile::new("ToTheMoon", "🌙"),
        BotProfile::new("HODLer", "💪"),
        BotProfile::new("BullRun", "🐂"),
        BotProfile::new("SatoshisFan", "⚡"),
        BotProfile::new("DegenTrader", "🎯"),
    ]
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrashConfig {
    pub tick_ms: Millis,
    pub waiting_ms: Millis,
    pub cooldown_ms: Millis,
    /// Length of the early rising window with the stronger upward bias.
    pub boost_window_ms: Millis,
    pub candle_window: usize,
    pub seeded_candles: usize,
    pub start_price_min: f64,
    pub start_price_max: f64,
    pub price_floor_ratio: f64,
    pub multiplier_gain: f64,
    pub max_multiplier: f64,
    pub boost_base: f64,
    pub boost_span: f64,
    pub drift_bias: f64,
    pub drift_span: f64,
    pub deadline_buckets: Vec<DeadlineBucket>,
    pub bots: Vec<BotProfile>,
    pub bot_count_min: usize,
    pub bot_count_max: usize,
    pub bot_bet_min: u64,
    pub bot_bet_max: u64,
    pub bot_cashout_probability: f64,
    pub bot_cashout_max_slippage: f64,
    pub history_window: usize,
}

impl Default for CrashConfig {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            waiting_ms: 2_000,
            cooldown_ms: 2_500,
            boost_window_ms: 1_000,
            candle_window: 15,
            seeded_candles: 15,
            start_price_min: 95.0,
            start_price_max: 105.0,
            price_floor_ratio: 0.9,
            multiplier_gain: 5.0,
            max_multiplier: 10.0,
            boost_base: 3.0,
            boost_span: 8.0,
            drift_bias: 0.15,
            drift_span: 6.0,
            deadline_buckets: default_buckets(),
            bots: default_bots(),
            bot_count_min: 2,
            bot_count_max: 7,
            bot_bet_min: 1,
            bot_bet_max: 10,
            bot_cashout_probability: 0.035,
            bot_cashout_max_slippage: 0.5,
            history_window: 10,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseConfig {
    pub spin_ms: Millis,
    /// Currency case prices are charged in.
    pub currency: Currency,
    pub prize_pool: Vec<GiftTemplate>,
    pub catalog: Vec<CaseCatalogEntry>,
}

impl Default for CaseConfig {
    fn default() -> Self {
        Self {
            spin_ms: 3_000,
            currency: Currency::Ton,
            prize_pool: default_prize_pool(),
            catalog: default_catalog(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    pub initial_balance: Amount,
    pub initial_ton: Amount,
    /// Balance units credited per TON exchanged.
    pub ton_exchange_rate: f64,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            initial_balance: Amount::from_units(1_250_450_000_000),
            initial_ton: Amount::from_coins(100),
            ton_exchange_rate: 50.0,
        }
    }
}

pub fn resolve_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

impl GameConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = resolve_path(&path.as_ref().to_string_lossy());
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config: GameConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.crash.validate()?;
        self.cases.validate()?;
        self.wallet.validate()
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}

impl CrashConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_ms == 0 {
            return Err(invalid("crash.tick_ms must be greater than zero"));
        }
        if self.candle_window == 0 {
            return Err(invalid("crash.candle_window must be greater than zero"));
        }
        if !(self.start_price_min > 0.0 && self.start_price_min <= self.start_price_max) {
            return Err(invalid(format!(
                "crash start price range is invalid (min={}, max={})",
                self.start_price_min, self.start_price_max
            )));
        }
        if !(0.0..=1.0).contains(&self.price_floor_ratio) {
            return Err(invalid("crash.price_floor_ratio must be within [0, 1]"));
        }
        if !(self.max_multiplier >= 1.0 && self.multiplier_gain.is_finite()) {
            return Err(invalid("crash.max_multiplier must be at least 1.0"));
        }
        if self.bot_count_min > self.bot_count_max {
            return Err(invalid(format!(
                "crash bot count range is inverted (min={}, max={})",
                self.bot_count_min, self.bot_count_max
            )));
        }
        if self.bot_bet_min == 0 || self.bot_bet_min > self.bot_bet_max {
            return Err(invalid(format!(
                "crash bot bet range is invalid (min={}, max={})",
                self.bot_bet_min, self.bot_bet_max
            )));
        }
        if !(0.0..=1.0).contains(&self.bot_cashout_probability) {
            return Err(invalid("crash.bot_cashout_probability must be within [0, 1]"));
        }
        if self.bot_cashout_max_slippage < 0.0 {
            return Err(invalid("crash.bot_cashout_max_slippage must not be negative"));
        }
        validate_buckets(&self.deadline_buckets)
    }
}

impl CaseConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prize_pool.is_empty() {
            return Err(invalid("cases.prize_pool must not be empty"));
        }
        let mut seen = HashSet::new();
        for entry in &self.catalog {
            if !seen.insert(entry.id) {
                return Err(invalid(format!("duplicate case id {}", entry.id)));
            }
        }
        Ok(())
    }
}

impl WalletConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.ton_exchange_rate.is_finite() && self.ton_exchange_rate > 0.0) {
            return Err(invalid("wallet.ton_exchange_rate must be positive"));
        }
        Ok(())
    }
}
