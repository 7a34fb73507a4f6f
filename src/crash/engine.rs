//! Crash round state machine: `waiting -> rising -> crashed -> (waiting)`.
//!
//! Phase changes, price ticks, the crash deadline, and the cooldown are all
//! events on one [`TimerQueue`]. The tick is periodic; the crash is a single
//! one-shot scheduled at the start of `rising`, so it may land between two
//! ticks. Timers carry the id of the round that scheduled them and never touch
//! the wallet. Only [`CrashRoundEngine::place_bet`],
//! [`CrashRoundEngine::place_gift_bet`] and [`CrashRoundEngine::cash_out`]
//! move funds.

use crate::{
    amount::Amount,
    config::CrashConfig,
    crash::round::{
        CrashRound,
        Phase,
        PlayerStatus,
    },
    error::GameError,
    gifts::{
        GiftCollection,
        GiftId,
    },
    timers::{
        Millis,
        TimerId,
        TimerQueue,
    },
    wallet::{
        Currency,
        Wallet,
    },
};
use rand::Rng;
use tracing::{
    debug,
    info,
    warn,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum CrashTimer {
    StartRising { round: u64 },
    Tick { round: u64 },
    Crash { round: u64 },
    NextRound { round: u64 },
}

#[derive(Debug)]
pub struct CrashRoundEngine {
    config: CrashConfig,
    timers: TimerQueue<CrashTimer>,
    round: Option<CrashRound>,
    history: Vec<f64>,
    next_round_id: u64,
    tick_timer: Option<TimerId>,
    rising_since: Millis,
}

impl CrashRoundEngine {
    pub fn new(config: CrashConfig) -> Self {
        Self {
            config,
            timers: TimerQueue::new(),
            round: None,
            history: Vec::new(),
            next_round_id: 0,
            tick_timer: None,
            rising_since: 0,
        }
    }

    pub fn config(&self) -> &CrashConfig {
        &self.config
    }

    pub fn round(&self) -> Option<&CrashRound> {
        self.round.as_ref()
    }

    pub fn is_mounted(&self) -> bool {
        self.round.is_some()
    }

    /// Every crash multiplier since the engine was created, oldest first.
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    pub fn recent_history(&self) -> &[f64] {
        let skip = self.history.len().saturating_sub(self.config.history_window);
        &self.history[skip..]
    }

    /// Virtual time elapsed since the engine was created.
    pub fn now(&self) -> Millis {
        self.timers.now()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.pending()
    }

    /// Starts a fresh round, discarding any round in flight.
    pub fn mount<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.round.is_some() {
            self.unmount();
        }
        self.start_round(rng);
    }

    /// Cancels every pending timer and drops the live round. A stake already
    /// placed in it is forfeited.
    pub fn unmount(&mut self) {
        self.timers.clear();
        self.tick_timer = None;
        if let Some(round) = self.round.take() {
            if matches!(
                round.local.status,
                PlayerStatus::Betting | PlayerStatus::Playing
            ) {
                warn!(round_id = round.id, "round unmounted with an open stake");
            }
            info!(round_id = round.id, phase = %round.phase, "crash round unmounted");
        }
    }

    fn start_round<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.next_round_id += 1;
        let round = CrashRound::seed(self.next_round_id, &self.config, rng);
        info!(
            round_id = round.id,
            start_price = round.start_price,
            deadline_ms = round.deadline_ms,
            bots = round.participants.len(),
            "crash round waiting"
        );
        self.timers.schedule_once(
            self.config.waiting_ms,
            CrashTimer::StartRising { round: round.id },
        );
        self.tick_timer = None;
        self.round = Some(round);
    }

    /// Advances virtual time by `elapsed` ms, firing due timers in order.
    pub fn advance<R: Rng + ?Sized>(&mut self, elapsed: Millis, rng: &mut R) {
        let until = self.timers.now().saturating_add(elapsed);
        while let Some((_, timer)) = self.timers.pop_due(until) {
            self.handle(timer, rng);
        }
        self.timers.settle(until);
    }

    fn live_round(&mut self, id: u64) -> Option<&mut CrashRound> {
        self.round.as_mut().filter(|round| round.id == id)
    }

    fn handle<R: Rng + ?Sized>(&mut self, timer: CrashTimer, rng: &mut R) {
        match timer {
            CrashTimer::StartRising { round } => self.on_start_rising(round),
            CrashTimer::Tick { round } => self.on_tick(round, rng),
            CrashTimer::Crash { round } => self.on_crash(round),
            CrashTimer::NextRound { round } => {
                if self.round.as_ref().is_some_and(|r| r.id == round) {
                    self.start_round(rng);
                }
            }
        }
    }

    fn on_start_rising(&mut self, id: u64) {
        let now = self.timers.now();
        let Some(round) = self.live_round(id) else {
            return;
        };
        round.start_rising();
        let deadline = round.deadline_ms;
        info!(round_id = id, deadline_ms = deadline, "crash round rising");
        self.rising_since = now;
        self.tick_timer = Some(
            self.timers
                .schedule_every(self.config.tick_ms, CrashTimer::Tick { round: id }),
        );
        self.timers
            .schedule_once(deadline, CrashTimer::Crash { round: id });
    }

    fn on_tick<R: Rng + ?Sized>(&mut self, id: u64, rng: &mut R) {
        let rising_ms = self.timers.now().saturating_sub(self.rising_since);
        let Some(round) = self.round.as_mut().filter(|round| round.id == id) else {
            return;
        };
        if round.phase != Phase::Rising {
            return;
        }
        round.advance_price(rising_ms, &self.config, rng);
        let cashed = round.simulate_bot_cash_outs(&self.config, rng);
        debug!(
            round_id = id,
            price = round.price,
            multiplier = round.multiplier,
            bots_cashed = cashed,
            "crash tick"
        );
    }

    fn on_crash(&mut self, id: u64) {
        if let Some(tick) = self.tick_timer.take() {
            self.timers.cancel(tick);
        }
        let Some(round) = self.round.as_mut().filter(|round| round.id == id) else {
            return;
        };
        round.crash();
        let multiplier = round.multiplier;
        let local = round.local.status;
        self.history.push(multiplier);
        info!(round_id = id, multiplier, local = %local, "crash round crashed");
        self.timers.schedule_once(
            self.config.cooldown_ms,
            CrashTimer::NextRound { round: id },
        );
    }

    fn admit_bet(&mut self) -> Result<(&mut CrashRound, PlayerStatus), GameError> {
        let round = self.round.as_mut().ok_or(GameError::RoundNotMounted)?;
        let status = match (round.phase, round.local.status) {
            (Phase::Waiting, PlayerStatus::Idle) => PlayerStatus::Betting,
            (Phase::Rising, PlayerStatus::Idle) => PlayerStatus::Playing,
            (phase, player) => return Err(GameError::BetNotAllowed { phase, player }),
        };
        Ok((round, status))
    }

    /// Stakes `amount` TON on the live round. Allowed in `waiting` (player
    /// becomes `betting`) or in `rising` (player becomes `playing`), once per
    /// round.
    pub fn place_bet(&mut self, amount: Amount, wallet: &mut Wallet) -> Result<(), GameError> {
        let amount = amount.ensure_positive()?;
        let (round, status) = self.admit_bet()?;
        wallet.debit(Currency::Ton, amount)?;
        round.join_local(amount, status);
        info!(round_id = round.id, %amount, status = %status, "bet placed");
        Ok(())
    }

    /// Stakes an owned gift instead of TON. The gift leaves the collection
    /// and its value becomes the stake; winnings are paid in TON.
    pub fn place_gift_bet(
        &mut self,
        id: GiftId,
        collection: &mut GiftCollection,
    ) -> Result<Amount, GameError> {
        let (round, status) = self.admit_bet()?;
        collection
            .get(id)
            .ok_or(GameError::GiftNotFound(id))?
            .value
            .ensure_positive()?;
        let gift = collection.take(id)?;
        round.join_local(gift.value, status);
        info!(
            round_id = round.id,
            %id,
            gift = %gift.name,
            amount = %gift.value,
            status = %status,
            "gift bet placed"
        );
        Ok(gift.value)
    }

    /// Settles the local stake at the current multiplier and credits the
    /// winnings. Returns the credited amount.
    pub fn cash_out(&mut self, wallet: &mut Wallet) -> Result<Amount, GameError> {
        let round = self.round.as_mut().ok_or(GameError::RoundNotMounted)?;
        if !(round.phase == Phase::Rising && round.local.status == PlayerStatus::Playing) {
            return Err(GameError::CashOutNotAllowed {
                phase: round.phase,
                player: round.local.status,
            });
        }
        let winnings = round.cash_out_local();
        wallet.credit(Currency::Ton, winnings);
        info!(
            round_id = round.id,
            multiplier = round.multiplier,
            %winnings,
            "cashed out"
        );
        Ok(winnings)
    }

    #[cfg(test)]
    pub(crate) fn round_mut(&mut self) -> Option<&mut CrashRound> {
        self.round.as_mut()
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use proptest::prelude::*;
    use rand::{
        SeedableRng,
        rngs::StdRng,
    };

    fn coins(raw: &str) -> Amount {
        raw.parse().unwrap()
    }

    fn mounted(seed: u64) -> (CrashRoundEngine, StdRng) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut engine = CrashRoundEngine::new(CrashConfig::default());
        engine.mount(&mut rng);
        (engine, rng)
    }

    fn phase(engine: &CrashRoundEngine) -> Phase {
        engine.round().map(|r| r.phase()).unwrap()
    }

    #[test]
    fn sut__when_waiting_delay_elapses_then_round_rises() {
        // given
        let (mut engine, mut rng) = mounted(1);

        // when
        engine.advance(1_999, &mut rng);
        let before = phase(&engine);
        engine.advance(1, &mut rng);

        // then
        assert_eq!(before, Phase::Waiting);
        assert_eq!(phase(&engine), Phase::Rising);
    }

    #[test]
    fn sut__when_deadline_elapses_then_round_crashes_at_exactly_that_time() {
        // given
        let (mut engine, mut rng) = mounted(2);
        let deadline = engine.round().unwrap().deadline_ms();
        engine.advance(2_000, &mut rng);

        // when
        engine.advance(deadline.saturating_sub(1), &mut rng);
        let before = phase(&engine);
        engine.advance(1, &mut rng);

        // then
        if deadline > 0 {
            assert_eq!(before, Phase::Rising);
        }
        assert_eq!(phase(&engine), Phase::Crashed);
        assert_eq!(engine.history().len(), 1);
        assert_eq!(engine.pending_timers(), 1);
    }

    #[test]
    fn sut__when_cooldown_elapses_then_a_new_round_waits() {
        // given
        let (mut engine, mut rng) = mounted(3);
        let deadline = engine.round().unwrap().deadline_ms();
        engine.advance(2_000 + deadline, &mut rng);
        let first_id = engine.round().unwrap().id();

        // when
        engine.advance(2_500, &mut rng);

        // then
        let round = engine.round().unwrap();
        assert_eq!(round.phase(), Phase::Waiting);
        assert_eq!(round.id(), first_id + 1);
        assert_eq!(round.local().status, PlayerStatus::Idle);
    }

    #[test]
    fn sut__when_cashing_out_at_three_x_then_wallet_receives_stake_times_three() {
        // given
        let (mut engine, mut rng) = mounted(4);
        let mut wallet = Wallet::new(Amount::ZERO, coins("10"));
        engine.place_bet(coins("2"), &mut wallet).unwrap();
        engine.advance(2_000, &mut rng);
        let config = engine.config().clone();
        let round = engine.round_mut().unwrap();
        let start = round.start_price();
        round.reprice(start * 1.4, &config);

        // when
        let winnings = engine.cash_out(&mut wallet).unwrap();

        // then
        assert_eq!(winnings, coins("6"));
        assert_eq!(wallet.balance(Currency::Ton), coins("14"));
        let local = engine.round().unwrap().local();
        assert_eq!(local.status, PlayerStatus::Won);
        assert!((local.cash_out.unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn sut__when_cashing_out_twice_then_second_call_changes_nothing() {
        // given
        let (mut engine, mut rng) = mounted(5);
        let mut wallet = Wallet::new(Amount::ZERO, coins("10"));
        engine.advance(2_000, &mut rng);
        engine.place_bet(coins("1"), &mut wallet).unwrap();
        engine.cash_out(&mut wallet).unwrap();
        let after_first = wallet.clone();

        // when
        let second = engine.cash_out(&mut wallet);

        // then
        assert!(matches!(
            second,
            Err(GameError::CashOutNotAllowed {
                player: PlayerStatus::Won,
                ..
            })
        ));
        assert_eq!(wallet, after_first);
    }

    #[test]
    fn sut__when_betting_twice_in_one_round_then_second_bet_is_rejected() {
        let (mut engine, _) = mounted(6);
        let mut wallet = Wallet::new(Amount::ZERO, coins("10"));
        engine.place_bet(coins("2"), &mut wallet).unwrap();

        let second = engine.place_bet(coins("2"), &mut wallet);

        assert_eq!(
            second,
            Err(GameError::BetNotAllowed {
                phase: Phase::Waiting,
                player: PlayerStatus::Betting,
            })
        );
        assert_eq!(wallet.balance(Currency::Ton), coins("8"));
    }

    fn collection_with(value: &str) -> GiftCollection {
        let mut collection = GiftCollection::new();
        collection.keep(
            crate::gifts::GiftTemplate::new("Golden Star", "⭐", coins(value))
                .instantiate(GiftId::new(1)),
        );
        collection
    }

    #[test]
    fn sut__when_gift_is_staked_then_its_value_is_the_stake_and_winnings_are_ton() {
        // given
        let (mut engine, mut rng) = mounted(12);
        let mut collection = collection_with("3.2");
        let mut wallet = Wallet::new(Amount::ZERO, Amount::ZERO);

        // when
        let stake = engine.place_gift_bet(GiftId::new(1), &mut collection).unwrap();
        engine.advance(2_000, &mut rng);
        let round = engine.round_mut().unwrap();
        let start = round.start_price;
        round.reprice(start * 1.2, &CrashConfig::default());
        let winnings = engine.cash_out(&mut wallet).unwrap();

        // then
        assert_eq!(stake, coins("3.2"));
        assert!(collection.is_empty());
        assert_eq!(winnings, coins("6.4"));
        assert_eq!(wallet.balance(Currency::Ton), coins("6.4"));
    }

    #[test]
    fn sut__when_gift_bet_is_rejected_then_gift_stays_in_collection() {
        // given
        let (mut engine, _) = mounted(13);
        let mut collection = collection_with("1.2");
        let mut wallet = Wallet::new(Amount::ZERO, coins("5"));
        engine.place_bet(coins("1"), &mut wallet).unwrap();

        // when
        let second = engine.place_gift_bet(GiftId::new(1), &mut collection);
        let missing = CrashRoundEngine::new(CrashConfig::default())
            .place_gift_bet(GiftId::new(1), &mut collection);

        // then
        assert!(matches!(second, Err(GameError::BetNotAllowed { .. })));
        assert_eq!(missing, Err(GameError::RoundNotMounted));
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn sut__when_staking_an_unknown_gift_then_round_is_untouched() {
        let (mut engine, _) = mounted(14);
        let mut collection = GiftCollection::new();

        let result = engine.place_gift_bet(GiftId::new(9), &mut collection);

        assert_eq!(result, Err(GameError::GiftNotFound(GiftId::new(9))));
        assert_eq!(engine.round().unwrap().local().status, PlayerStatus::Idle);
    }

    #[test]
    fn sut__when_betting_after_crash_then_bet_is_rejected() {
        let (mut engine, mut rng) = mounted(7);
        let deadline = engine.round().unwrap().deadline_ms();
        engine.advance(2_000 + deadline, &mut rng);
        let mut wallet = Wallet::new(Amount::ZERO, coins("10"));

        let result = engine.place_bet(coins("1"), &mut wallet);

        assert!(matches!(result, Err(GameError::BetNotAllowed { phase: Phase::Crashed, .. })));
        assert_eq!(wallet.balance(Currency::Ton), coins("10"));
    }

    #[test]
    fn sut__when_unmounted_then_no_timer_remains() {
        // given
        let (mut engine, mut rng) = mounted(8);
        engine.advance(1_500, &mut rng);

        // when
        engine.unmount();
        engine.advance(60_000, &mut rng);

        // then
        assert!(engine.round().is_none());
        assert_eq!(engine.pending_timers(), 0);
        assert!(engine.history().is_empty());
    }

    #[test]
    fn sut__when_many_rounds_run_then_recent_history_is_bounded() {
        let (mut engine, mut rng) = mounted(9);
        engine.advance(20 * 13_000, &mut rng);
        assert!(engine.history().len() >= 12);
        assert_eq!(engine.recent_history().len(), 10);
        assert_eq!(
            engine.recent_history().last(),
            engine.history().last()
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
        #[test]
        fn multiplier__stays_within_bounds(seed in any::<u64>(), steps in 1usize..200) {
            let (mut engine, mut rng) = mounted(seed);
            for _ in 0..steps {
                engine.advance(100, &mut rng);
                let m = engine.round().map(|r| r.multiplier()).unwrap_or(1.0);
                prop_assert!((1.0..=10.0).contains(&m));
            }
            for m in engine.history() {
                prop_assert!((1.0..=10.0).contains(m));
            }
        }
    }
}
