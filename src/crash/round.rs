use crate::{
    amount::Amount,
    config::CrashConfig,
    crash::deadline::{
        DeadlineDraw,
        sample_deadline,
    },
    timers::Millis,
};
use rand::{
    Rng,
    seq::IndexedRandom,
};
use serde::Serialize;
use std::{
    collections::VecDeque,
    fmt,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Waiting,
    Rising,
    Crashed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Waiting => "waiting",
            Phase::Rising => "rising",
            Phase::Crashed => "crashed",
        };
        write!(f, "{name}")
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatus {
    #[default]
    Idle,
    /// Staked during `waiting`; becomes `Playing` once the round rises.
    Betting,
    Playing,
    Won,
    Lost,
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlayerStatus::Idle => "idle",
            PlayerStatus::Betting => "betting",
            PlayerStatus::Playing => "playing",
            PlayerStatus::Won => "won",
            PlayerStatus::Lost => "lost",
        };
        write!(f, "{name}")
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    pub fn is_up(&self) -> bool {
        self.close >= self.open
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    Playing,
    CashedOut,
    Lost,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Participant {
    pub nickname: String,
    pub avatar: String,
    pub bet: Amount,
    pub status: ParticipantStatus,
    pub cash_out: Option<f64>,
    pub winnings: Option<Amount>,
    pub is_local: bool,
}

impl Participant {
    fn settle(&mut self, multiplier: f64) -> Amount {
        let winnings = self.bet.scale(multiplier);
        self.status = ParticipantStatus::CashedOut;
        self.cash_out = Some(multiplier);
        self.winnings = Some(winnings);
        winnings
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LocalPlayer {
    pub status: PlayerStatus,
    pub stake: Option<Amount>,
    pub cash_out: Option<f64>,
    pub winnings: Option<Amount>,
}

pub const LOCAL_NICKNAME: &str = "You";

/// One play cycle. Mutated only by [`crate::crash::CrashRoundEngine`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CrashRound {
    pub(crate) id: u64,
    pub(crate) phase: Phase,
    pub(crate) start_price: f64,
    pub(crate) price: f64,
    pub(crate) multiplier: f64,
    pub(crate) deadline_ms: Millis,
    pub(crate) deadline_bucket: usize,
    pub(crate) candles: VecDeque<Candle>,
    pub(crate) participants: Vec<Participant>,
    pub(crate) local: LocalPlayer,
}

/// `clamp(1 + (price - start) / start * gain, 1, max)`.
pub fn multiplier_at(price: f64, start_price: f64, config: &CrashConfig) -> f64 {
    if !(start_price > 0.0) || !price.is_finite() {
        return 1.0;
    }
    let raw = 1.0 + (price - start_price) / start_price * config.multiplier_gain;
    raw.clamp(1.0, config.max_multiplier.max(1.0))
}

fn ordered<T: PartialOrd + Copy>(a: T, b: T) -> (T, T) {
    if a <= b { (a, b) } else { (b, a) }
}

impl CrashRound {
    /// Creates a round in `waiting`: start price, seeded candles, crash
    /// deadline, and simulated participants are all drawn here.
    pub fn seed<R: Rng + ?Sized>(id: u64, config: &CrashConfig, rng: &mut R) -> Self {
        let (lo, hi) = ordered(config.start_price_min, config.start_price_max);
        let start_price = lo + rng.random::<f64>() * (hi - lo);

        let mut candles = VecDeque::with_capacity(config.candle_window + 1);
        for _ in 0..config.seeded_candles {
            let base = start_price + (rng.random::<f64>() - 0.5) * 2.0;
            let open = base;
            let close = base + (rng.random::<f64>() - 0.5);
            let high = (base + rng.random::<f64>() * 1.5).max(open.max(close));
            let low = (base - rng.random::<f64>() * 1.5).min(open.min(close));
            candles.push_back(Candle {
                open,
                high,
                low,
                close,
            });
        }
        while candles.len() > config.candle_window {
            candles.pop_front();
        }

        let DeadlineDraw {
            bucket,
            deadline_ms,
        } = sample_deadline(&config.deadline_buckets, rng);

        let (count_lo, count_hi) = ordered(config.bot_count_min, config.bot_count_max);
        let count = rng.random_range(count_lo..=count_hi).min(config.bots.len());
        let (bet_lo, bet_hi) = ordered(config.bot_bet_min, config.bot_bet_max);
        let participants = config
            .bots
            .choose_multiple(rng, count)
            .cloned()
            .map(|bot| Participant {
                nickname: bot.nickname,
                avatar: bot.avatar,
                bet: Amount::from_coins(rng.random_range(bet_lo..=bet_hi)),
                status: ParticipantStatus::Playing,
                cash_out: None,
                winnings: None,
                is_local: false,
            })
            .collect();

        Self {
            id,
            phase: Phase::Waiting,
            start_price,
            price: start_price,
            multiplier: 1.0,
            deadline_ms,
            deadline_bucket: bucket,
            candles,
            participants,
            local: LocalPlayer::default(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn start_price(&self) -> f64 {
        self.start_price
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn deadline_ms(&self) -> Millis {
        self.deadline_ms
    }

    pub fn deadline_bucket(&self) -> usize {
        self.deadline_bucket
    }

    pub fn candles(&self) -> &VecDeque<Candle> {
        &self.candles
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn local(&self) -> &LocalPlayer {
        &self.local
    }

    /// One price step, `rising_ms` into the rising phase.
    pub(crate) fn advance_price<R: Rng + ?Sized>(
        &mut self,
        rising_ms: Millis,
        config: &CrashConfig,
        rng: &mut R,
    ) {
        let movement = if rising_ms < config.boost_window_ms {
            rng.random::<f64>() * config.boost_span + config.boost_base
        } else {
            (rng.random::<f64>() - config.drift_bias) * config.drift_span
        };
        let last_close = self.candles.back().map_or(self.price, |candle| candle.close);
        let floor = self.start_price * config.price_floor_ratio;
        let price = (last_close + movement).max(floor);
        self.reprice(price, config);
        self.push_candle(last_close, price, config, rng);
    }

    pub(crate) fn reprice(&mut self, price: f64, config: &CrashConfig) {
        self.price = price;
        self.multiplier = multiplier_at(price, self.start_price, config);
    }

    fn push_candle<R: Rng + ?Sized>(
        &mut self,
        open: f64,
        close: f64,
        config: &CrashConfig,
        rng: &mut R,
    ) {
        let high = open.max(close) + rng.random::<f64>() * 1.5;
        let low = open.min(close) - rng.random::<f64>() * 0.8;
        self.candles.push_back(Candle {
            open,
            high,
            low,
            close,
        });
        while self.candles.len() > config.candle_window.max(1) {
            self.candles.pop_front();
        }
    }

    /// Each still-playing bot independently cashes out with the configured
    /// per-tick probability, slightly below the current multiplier.
    pub(crate) fn simulate_bot_cash_outs<R: Rng + ?Sized>(
        &mut self,
        config: &CrashConfig,
        rng: &mut R,
    ) -> usize {
        let multiplier = self.multiplier;
        let mut cashed = 0;
        for bot in self
            .participants
            .iter_mut()
            .filter(|p| !p.is_local && p.status == ParticipantStatus::Playing)
        {
            if rng.random::<f64>() < config.bot_cashout_probability {
                let slippage = rng.random::<f64>() * config.bot_cashout_max_slippage;
                bot.settle((multiplier - slippage).max(1.0));
                cashed += 1;
            }
        }
        cashed
    }

    pub(crate) fn join_local(&mut self, stake: Amount, status: PlayerStatus) {
        self.local = LocalPlayer {
            status,
            stake: Some(stake),
            cash_out: None,
            winnings: None,
        };
        self.participants.push(Participant {
            nickname: LOCAL_NICKNAME.to_string(),
            avatar: String::from("🙂"),
            bet: stake,
            status: ParticipantStatus::Playing,
            cash_out: None,
            winnings: None,
            is_local: true,
        });
    }

    pub(crate) fn start_rising(&mut self) {
        self.phase = Phase::Rising;
        if self.local.status == PlayerStatus::Betting {
            self.local.status = PlayerStatus::Playing;
        }
    }

    /// Settles the local stake at the current multiplier. Returns winnings.
    pub(crate) fn cash_out_local(&mut self) -> Amount {
        let multiplier = self.multiplier;
        let winnings = self
            .participants
            .iter_mut()
            .find(|p| p.is_local)
            .map(|p| p.settle(multiplier))
            .unwrap_or_else(|| self.local.stake.unwrap_or_default().scale(multiplier));
        self.local.status = PlayerStatus::Won;
        self.local.cash_out = Some(multiplier);
        self.local.winnings = Some(winnings);
        winnings
    }

    pub(crate) fn crash(&mut self) {
        self.phase = Phase::Crashed;
        for participant in &mut self.participants {
            if participant.status == ParticipantStatus::Playing {
                participant.status = ParticipantStatus::Lost;
            }
        }
        if matches!(
            self.local.status,
            PlayerStatus::Playing | PlayerStatus::Betting
        ) {
            self.local.status = PlayerStatus::Lost;
        }
    }
}
