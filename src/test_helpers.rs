use crate::{
    amount::Amount,
    config::GameConfig,
    crash::{
        Phase,
        PlayerStatus,
    },
    session::Session,
    wallet::Currency,
};

pub const DEFAULT_SEED: u64 = 0x5EED;

pub fn coins(raw: &str) -> Amount {
    raw.parse().unwrap()
}

/// Seeded session plus drivers that walk the crash round through its phases.
pub struct TestContext {
    session: Session,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::with_config(GameConfig::default(), seed)
    }

    pub fn with_config(config: GameConfig, seed: u64) -> Self {
        Self {
            session: Session::seeded(config, seed),
        }
    }

    /// Starts from a wallet holding only `ton` TON.
    pub fn with_ton(ton: &str, seed: u64) -> Self {
        let mut config = GameConfig::default();
        config.wallet.initial_balance = Amount::ZERO;
        config.wallet.initial_ton = coins(ton);
        Self::with_config(config, seed)
    }

    pub fn session(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn ton(&self) -> Amount {
        self.session.wallet().balance(Currency::Ton)
    }

    pub fn balance(&self) -> Amount {
        self.session.wallet().balance(Currency::Balance)
    }

    pub fn phase(&self) -> Option<Phase> {
        self.session.crash().round().map(|round| round.phase())
    }

    pub fn player(&self) -> Option<PlayerStatus> {
        self.session.crash().round().map(|round| round.local().status)
    }

    pub fn deadline_ms(&self) -> u64 {
        self.session
            .crash()
            .round()
            .map(|round| round.deadline_ms())
            .unwrap()
    }

    /// Mounts a round and advances to the start of `rising`.
    pub fn mount_and_rise(&mut self) {
        self.session.mount_crash();
        let waiting = self.session.config().crash.waiting_ms;
        self.session.advance(waiting);
        assert_eq!(self.phase(), Some(Phase::Rising));
    }

    /// Advances in tick-sized steps until the live round crashes.
    pub fn run_until_crash(&mut self) {
        let tick = self.session.config().crash.tick_ms;
        for _ in 0..1_000 {
            if self.phase() == Some(Phase::Crashed) {
                return;
            }
            self.session.advance(tick);
        }
        panic!("round did not crash");
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
