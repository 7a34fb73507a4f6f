use crate::{
    amount::Amount,
    cases::{
        CaseCatalogEntry,
        CaseOutcomeEngine,
        RevealState,
    },
    config::GameConfig,
    crash::{
        CrashRound,
        CrashRoundEngine,
    },
    error::GameError,
    gifts::{
        Gift,
        GiftCollection,
        GiftId,
    },
    timers::Millis,
    wallet::{
        Currency,
        Wallet,
    },
};
use rand::{
    Rng,
    SeedableRng,
    rngs::StdRng,
};
use serde::Serialize;
use tracing::info;

/// Case panel as the view sees it. The drawn prize stays hidden while spinning.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CaseView {
    pub case_id: Option<u32>,
    pub spinning: bool,
    pub revealed: Option<Gift>,
}

impl From<&RevealState> for CaseView {
    fn from(state: &RevealState) -> Self {
        CaseView {
            case_id: state.case_id(),
            spinning: matches!(state, RevealState::Spinning { .. }),
            revealed: state.revealed().cloned(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub now_ms: Millis,
    pub balance: Amount,
    pub ton: Amount,
    pub round: Option<CrashRound>,
    /// Trailing window of crash multipliers, oldest first.
    pub history: Vec<f64>,
    pub gifts: Vec<Gift>,
    pub collection_value: Amount,
    pub catalog: Vec<CaseCatalogEntry>,
    pub case: CaseView,
    pub case_currency: Currency,
}

/// Everything one local player owns, plus both engines and the random source
/// that drives them.
#[derive(Debug)]
pub struct Session<R = StdRng> {
    config: GameConfig,
    wallet: Wallet,
    collection: GiftCollection,
    crash: CrashRoundEngine,
    cases: CaseOutcomeEngine,
    rng: R,
}

impl Session<StdRng> {
    pub fn seeded(config: GameConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy(config: GameConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }
}

impl<R: Rng> Session<R> {
    pub fn with_rng(config: GameConfig, rng: R) -> Self {
        let wallet = Wallet::from_config(&config.wallet);
        let crash = CrashRoundEngine::new(config.crash.clone());
        let cases = CaseOutcomeEngine::new(&config.cases);
        Self {
            config,
            wallet,
            collection: GiftCollection::new(),
            crash,
            cases,
            rng,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    pub fn collection(&self) -> &GiftCollection {
        &self.collection
    }

    pub fn crash(&self) -> &CrashRoundEngine {
        &self.crash
    }

    pub fn cases(&self) -> &CaseOutcomeEngine {
        &self.cases
    }

    pub fn mount_crash(&mut self) {
        self.crash.mount(&mut self.rng);
    }

    pub fn unmount_crash(&mut self) {
        self.crash.unmount();
    }

    /// Advances virtual time for both engines.
    pub fn advance(&mut self, elapsed: Millis) {
        self.crash.advance(elapsed, &mut self.rng);
        self.cases.advance(elapsed);
    }

    pub fn place_bet(&mut self, amount: Amount) -> Result<(), GameError> {
        self.crash.place_bet(amount, &mut self.wallet)
    }

    pub fn place_gift_bet(&mut self, id: GiftId) -> Result<Amount, GameError> {
        self.crash.place_gift_bet(id, &mut self.collection)
    }

    pub fn cash_out(&mut self) -> Result<Amount, GameError> {
        self.crash.cash_out(&mut self.wallet)
    }

    pub fn open_case(&mut self, case_id: u32) -> Result<Amount, GameError> {
        self.cases.open_case(case_id, &mut self.wallet, &mut self.rng)
    }

    pub fn keep_revealed(&mut self) -> Result<GiftId, GameError> {
        self.cases.keep_revealed(&mut self.collection)
    }

    pub fn sell_revealed(&mut self) -> Result<Amount, GameError> {
        self.cases.sell_revealed(&mut self.wallet)
    }

    pub fn dismiss_case(&mut self) -> Option<Gift> {
        self.cases.dismiss()
    }

    pub fn sell_gift(&mut self, id: GiftId) -> Result<Amount, GameError> {
        self.collection.sell_gift(id, &mut self.wallet)
    }

    pub fn sell_all(&mut self) -> Amount {
        self.collection.sell_all(&mut self.wallet)
    }

    pub fn top_up(&mut self, currency: Currency, amount: Amount) -> Result<(), GameError> {
        self.wallet.top_up(currency, amount)?;
        info!(%currency, %amount, "wallet topped up");
        Ok(())
    }

    pub fn exchange_ton(&mut self, amount: Amount) -> Result<Amount, GameError> {
        let credited = self
            .wallet
            .exchange_ton(amount, self.config.wallet.ton_exchange_rate)?;
        info!(%amount, %credited, "TON exchanged");
        Ok(credited)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            now_ms: self.crash.now(),
            balance: self.wallet.balance(Currency::Balance),
            ton: self.wallet.balance(Currency::Ton),
            round: self.crash.round().cloned(),
            history: self.crash.recent_history().to_vec(),
            gifts: self.collection.gifts().to_vec(),
            collection_value: self.collection.total_value(),
            catalog: self.cases.catalog().to_vec(),
            case: CaseView::from(self.cases.state()),
            case_currency: self.cases.currency(),
        }
    }
}
