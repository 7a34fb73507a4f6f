use crate::{
    amount::Amount,
    config::CaseConfig,
    error::GameError,
    gifts::{
        Gift,
        GiftCollection,
        GiftId,
        GiftIdGenerator,
        GiftTemplate,
    },
    timers::{
        Millis,
        TimerQueue,
    },
    wallet::{
        Currency,
        Wallet,
    },
};
use rand::{
    Rng,
    seq::IndexedRandom,
};
use serde::{
    Deserialize,
    Serialize,
};
use tracing::info;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseCatalogEntry {
    pub id: u32,
    pub name: String,
    pub price: Amount,
    pub icon: String,
    #[serde(default)]
    pub is_free: bool,
}

impl CaseCatalogEntry {
    fn paid(id: u32, name: &str, price: Amount, icon: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            price,
            icon: icon.to_string(),
            is_free: false,
        }
    }

    fn free(id: u32, name: &str, icon: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            price: Amount::ZERO,
            icon: icon.to_string(),
            is_free: true,
        }
    }
}

pub fn default_catalog() -> Vec<CaseCatalogEntry> {
    let tenths = |n: u64| Amount::from_units(n * 100_000_000);
    vec![
        CaseCatalogEntry::paid(1, "Basic Case", tenths(1), "📦"),
        CaseCatalogEntry::paid(2, "Premium Case", tenths(10), "🎁"),
        CaseCatalogEntry::paid(3, "Elite Case", tenths(50), "💎"),
        CaseCatalogEntry::paid(4, "Legendary Case", tenths(100), "👑"),
        CaseCatalogEntry::paid(5, "Mystery Case", tenths(25), "🔮"),
        CaseCatalogEntry::paid(6, "Golden Case", tenths(150), "🏆"),
        CaseCatalogEntry::free(101, "Daily Free Case", "🎈"),
        CaseCatalogEntry::free(102, "Welcome Case", "🎉"),
        CaseCatalogEntry::free(103, "Bonus Case", "🎊"),
        CaseCatalogEntry::free(104, "Lucky Case", "🍀"),
    ]
}

/// Where the current case open stands. The prize is drawn when the case is
/// bought; `Spinning` only delays showing it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum RevealState {
    #[default]
    Idle,
    Spinning { case_id: u32, gift: Gift },
    Revealed { case_id: u32, gift: Gift },
}

impl RevealState {
    pub fn revealed(&self) -> Option<&Gift> {
        match self {
            RevealState::Revealed { gift, .. } => Some(gift),
            _ => None,
        }
    }

    pub fn case_id(&self) -> Option<u32> {
        match self {
            RevealState::Idle => None,
            RevealState::Spinning { case_id, .. } | RevealState::Revealed { case_id, .. } => {
                Some(*case_id)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CaseTimer {
    Reveal { open: u64 },
}

/// Resolves case purchases into one gift each, drawn uniformly from a single
/// shared prize pool.
#[derive(Debug)]
pub struct CaseOutcomeEngine {
    catalog: Vec<CaseCatalogEntry>,
    prize_pool: Vec<GiftTemplate>,
    currency: Currency,
    spin_ms: Millis,
    ids: GiftIdGenerator,
    state: RevealState,
    timers: TimerQueue<CaseTimer>,
    opens: u64,
}

impl CaseOutcomeEngine {
    pub fn new(config: &CaseConfig) -> Self {
        Self {
            catalog: config.catalog.clone(),
            prize_pool: config.prize_pool.clone(),
            currency: config.currency,
            spin_ms: config.spin_ms,
            ids: GiftIdGenerator::default(),
            state: RevealState::Idle,
            timers: TimerQueue::new(),
            opens: 0,
        }
    }

    pub fn catalog(&self) -> &[CaseCatalogEntry] {
        &self.catalog
    }

    pub fn entry(&self, case_id: u32) -> Option<&CaseCatalogEntry> {
        self.catalog.iter().find(|entry| entry.id == case_id)
    }

    pub fn prize_pool(&self) -> &[GiftTemplate] {
        &self.prize_pool
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn state(&self) -> &RevealState {
        &self.state
    }

    /// Buys and opens a case. The price is charged and the prize drawn in one
    /// step; the charge stands whatever happens to the prize afterwards.
    /// Returns the amount charged.
    pub fn open_case<R: Rng + ?Sized>(
        &mut self,
        case_id: u32,
        wallet: &mut Wallet,
        rng: &mut R,
    ) -> Result<Amount, GameError> {
        if self.state != RevealState::Idle {
            return Err(GameError::CaseInProgress);
        }
        let entry = self
            .catalog
            .iter()
            .find(|entry| entry.id == case_id)
            .ok_or(GameError::UnknownCase(case_id))?;
        if self.prize_pool.is_empty() {
            return Err(GameError::EmptyPrizePool);
        }
        let charged = if entry.is_free {
            Amount::ZERO
        } else {
            wallet.debit(self.currency, entry.price)?;
            entry.price
        };
        // draw only after the debit so a rejected open leaves the rng untouched
        let template = self
            .prize_pool
            .choose(rng)
            .ok_or(GameError::EmptyPrizePool)?;
        let gift = template.instantiate(self.ids.next_id());
        info!(
            case_id,
            case = %entry.name,
            %charged,
            gift = %gift.name,
            id = %gift.id,
            "case opened"
        );

        self.opens += 1;
        if self.spin_ms == 0 {
            self.state = RevealState::Revealed { case_id, gift };
        } else {
            self.state = RevealState::Spinning { case_id, gift };
            self.timers
                .schedule_once(self.spin_ms, CaseTimer::Reveal { open: self.opens });
        }
        Ok(charged)
    }

    pub fn advance(&mut self, elapsed: Millis) {
        let until = self.timers.now().saturating_add(elapsed);
        while let Some((_, timer)) = self.timers.pop_due(until) {
            match timer {
                CaseTimer::Reveal { open } if open == self.opens => self.reveal(),
                CaseTimer::Reveal { .. } => {}
            }
        }
        self.timers.settle(until);
    }

    fn reveal(&mut self) {
        if let RevealState::Spinning { case_id, gift } = std::mem::take(&mut self.state) {
            info!(case_id, gift = %gift.name, "case revealed");
            self.state = RevealState::Revealed { case_id, gift };
        }
    }

    fn take_revealed(&mut self) -> Result<Gift, GameError> {
        match std::mem::take(&mut self.state) {
            RevealState::Revealed { gift, .. } => Ok(gift),
            other => {
                self.state = other;
                Err(GameError::NothingRevealed)
            }
        }
    }

    /// Moves the revealed prize into the collection.
    pub fn keep_revealed(&mut self, collection: &mut GiftCollection) -> Result<GiftId, GameError> {
        let gift = self.take_revealed()?;
        let id = gift.id;
        collection.keep(gift);
        Ok(id)
    }

    /// Sells the revealed prize straight away, crediting its value in TON.
    pub fn sell_revealed(&mut self, wallet: &mut Wallet) -> Result<Amount, GameError> {
        let gift = self.take_revealed()?;
        wallet.credit(Currency::Ton, gift.value);
        info!(id = %gift.id, name = %gift.name, value = %gift.value, "revealed gift sold");
        Ok(gift.value)
    }

    /// Closes the case view, cancelling a pending reveal. An unclaimed prize
    /// is discarded and returned.
    pub fn dismiss(&mut self) -> Option<Gift> {
        self.timers.clear();
        match std::mem::take(&mut self.state) {
            RevealState::Idle => None,
            RevealState::Spinning { gift, .. } | RevealState::Revealed { gift, .. } => {
                info!(id = %gift.id, name = %gift.name, "case dismissed, prize discarded");
                Some(gift)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use crate::config::CaseConfig;
    use rand::{
        SeedableRng,
        rngs::StdRng,
    };

    fn coins(raw: &str) -> Amount {
        raw.parse().unwrap()
    }

    fn engine(spin_ms: Millis) -> CaseOutcomeEngine {
        CaseOutcomeEngine::new(&CaseConfig {
            spin_ms,
            ..CaseConfig::default()
        })
    }

    #[test]
    fn sut__when_balance_is_below_price_then_open_fails_without_side_effects() {
        // given
        let mut sut = engine(3_000);
        let mut wallet = Wallet::new(Amount::ZERO, coins("4"));
        let mut rng = StdRng::seed_from_u64(7);

        // when
        let result = sut.open_case(3, &mut wallet, &mut rng);

        // then
        assert!(matches!(result, Err(GameError::InsufficientFunds { .. })));
        assert_eq!(wallet.balance(Currency::Ton), coins("4"));
        assert_eq!(sut.state(), &RevealState::Idle);
    }

    #[test]
    fn sut__when_spin_elapses_then_prize_is_revealed() {
        // given
        let mut sut = engine(3_000);
        let mut wallet = Wallet::new(Amount::ZERO, coins("5"));
        let mut rng = StdRng::seed_from_u64(7);
        let charged = sut.open_case(3, &mut wallet, &mut rng).unwrap();

        // when
        sut.advance(2_999);
        let still_spinning = matches!(sut.state(), RevealState::Spinning { .. });
        sut.advance(1);

        // then
        assert_eq!(charged, coins("5"));
        assert_eq!(wallet.balance(Currency::Ton), Amount::ZERO);
        assert!(still_spinning);
        assert!(sut.state().revealed().is_some());
    }

    #[test]
    fn sut__when_case_is_free_then_wallet_is_not_charged() {
        let mut sut = engine(0);
        let mut wallet = Wallet::default();
        let mut rng = StdRng::seed_from_u64(1);
        let charged = sut.open_case(101, &mut wallet, &mut rng).unwrap();
        assert_eq!(charged, Amount::ZERO);
        assert!(sut.state().revealed().is_some());
    }

    #[test]
    fn sut__when_opening_while_prize_is_unclaimed_then_case_in_progress() {
        let mut sut = engine(0);
        let mut wallet = Wallet::new(Amount::ZERO, coins("10"));
        let mut rng = StdRng::seed_from_u64(1);
        sut.open_case(2, &mut wallet, &mut rng).unwrap();

        let result = sut.open_case(2, &mut wallet, &mut rng);

        assert_eq!(result, Err(GameError::CaseInProgress));
        assert_eq!(wallet.balance(Currency::Ton), coins("9"));
    }

    #[test]
    fn sut__when_revealed_prize_is_kept_then_it_cannot_also_be_sold() {
        // given
        let mut sut = engine(0);
        let mut wallet = Wallet::default();
        let mut collection = GiftCollection::new();
        let mut rng = StdRng::seed_from_u64(3);
        sut.open_case(104, &mut wallet, &mut rng).unwrap();

        // when
        let kept = sut.keep_revealed(&mut collection).unwrap();
        let sold = sut.sell_revealed(&mut wallet);

        // then
        assert_eq!(collection.gifts()[0].id, kept);
        assert_eq!(sold, Err(GameError::NothingRevealed));
        assert_eq!(wallet.balance(Currency::Ton), Amount::ZERO);
    }

    #[test]
    fn sut__when_dismissed_mid_spin_then_reveal_never_fires() {
        // given
        let mut sut = engine(3_000);
        let mut wallet = Wallet::new(Amount::ZERO, coins("1"));
        let mut rng = StdRng::seed_from_u64(3);
        sut.open_case(2, &mut wallet, &mut rng).unwrap();

        // when
        let discarded = sut.dismiss();
        sut.advance(10_000);

        // then
        assert!(discarded.is_some());
        assert_eq!(sut.state(), &RevealState::Idle);
        assert_eq!(wallet.balance(Currency::Ton), Amount::ZERO);
    }

    #[test]
    fn sut__when_opening_many_cases_then_every_template_is_drawn_roughly_uniformly() {
        // given
        let mut sut = engine(0);
        let mut wallet = Wallet::default();
        let mut rng = StdRng::seed_from_u64(42);
        let pool: Vec<String> = sut.prize_pool().iter().map(|t| t.name.clone()).collect();
        let mut counts = vec![0usize; pool.len()];

        // when
        for _ in 0..8_000 {
            sut.open_case(101, &mut wallet, &mut rng).unwrap();
            let name = sut.state().revealed().map(|gift| gift.name.clone()).unwrap();
            sut.dismiss();
            let slot = pool.iter().position(|candidate| *candidate == name).unwrap();
            counts[slot] += 1;
        }

        // then
        for count in counts {
            assert!((800..1_200).contains(&count), "count {count} out of range");
        }
    }
}
