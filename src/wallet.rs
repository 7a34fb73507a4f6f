use crate::{
    amount::Amount,
    config::WalletConfig,
    error::GameError,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;
use tracing::debug;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Currency {
    /// Fiat-equivalent demo balance.
    Balance,
    Ton,
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Currency::Balance => "balance",
            Currency::Ton => "TON",
        };
        write!(f, "{name}")
    }
}

/// Two independent balances owned by the local session.
///
/// Every mutation goes through [`Wallet::debit`] or [`Wallet::credit`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    balance: Amount,
    ton: Amount,
}

// The only place a balance is reduced.
fn debit_slot(slot: &mut Amount, amount: Amount) -> bool {
    match slot.checked_sub(amount) {
        Some(rest) => {
            *slot = rest;
            true
        }
        None => false,
    }
}

impl Wallet {
    pub fn new(balance: Amount, ton: Amount) -> Self {
        Self { balance, ton }
    }

    pub fn from_config(config: &WalletConfig) -> Self {
        Self::new(config.initial_balance, config.initial_ton)
    }

    pub fn balance(&self, currency: Currency) -> Amount {
        match currency {
            Currency::Balance => self.balance,
            Currency::Ton => self.ton,
        }
    }

    fn slot_mut(&mut self, currency: Currency) -> &mut Amount {
        match currency {
            Currency::Balance => &mut self.balance,
            Currency::Ton => &mut self.ton,
        }
    }

    /// Fails without touching the balance when `amount` exceeds it.
    pub fn debit(&mut self, currency: Currency, amount: Amount) -> Result<(), GameError> {
        let available = self.balance(currency);
        if !debit_slot(self.slot_mut(currency), amount) {
            return Err(GameError::InsufficientFunds {
                currency,
                needed: amount,
                available,
            });
        }
        debug!(%currency, %amount, remaining = %self.balance(currency), "debit");
        Ok(())
    }

    pub fn credit(&mut self, currency: Currency, amount: Amount) {
        let slot = self.slot_mut(currency);
        *slot = slot.saturating_add(amount);
        debug!(%currency, %amount, total = %self.balance(currency), "credit");
    }

    /// Credits funds arriving from the (opaque) payment flow.
    pub fn top_up(&mut self, currency: Currency, amount: Amount) -> Result<(), GameError> {
        let amount = amount.ensure_positive()?;
        self.credit(currency, amount);
        Ok(())
    }

    /// Converts TON into fiat balance at `rate` balance units per TON.
    /// Returns the credited balance amount.
    pub fn exchange_ton(&mut self, amount: Amount, rate: f64) -> Result<Amount, GameError> {
        let amount = amount.ensure_positive()?;
        let credited = amount.scale(rate);
        self.debit(Currency::Ton, amount)?;
        self.credit(Currency::Balance, credited);
        Ok(credited)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use proptest::prelude::*;

    fn coins(raw: &str) -> Amount {
        raw.parse().unwrap()
    }

    #[test]
    fn sut__when_debit_exceeds_balance_then_nothing_changes() {
        // given
        let mut wallet = Wallet::new(coins("10"), coins("4"));

        // when
        let result = wallet.debit(Currency::Ton, coins("5"));

        // then
        assert_eq!(
            result,
            Err(GameError::InsufficientFunds {
                currency: Currency::Ton,
                needed: coins("5"),
                available: coins("4"),
            })
        );
        assert_eq!(wallet, Wallet::new(coins("10"), coins("4")));
    }

    #[test]
    fn sut__when_debit_equals_balance_then_balance_reaches_zero() {
        let mut wallet = Wallet::new(coins("1"), coins("2.5"));
        wallet.debit(Currency::Ton, coins("2.5")).unwrap();
        assert_eq!(wallet.balance(Currency::Ton), Amount::ZERO);
        assert_eq!(wallet.balance(Currency::Balance), coins("1"));
    }

    #[test]
    fn sut__when_exchanging_ton_then_balance_is_credited_at_rate() {
        // given
        let mut wallet = Wallet::new(coins("0"), coins("10"));

        // when
        let credited = wallet.exchange_ton(coins("2"), 50.0).unwrap();

        // then
        assert_eq!(credited, coins("100"));
        assert_eq!(wallet.balance(Currency::Ton), coins("8"));
        assert_eq!(wallet.balance(Currency::Balance), coins("100"));
    }

    #[test]
    fn sut__when_exchanging_more_than_held_then_both_balances_are_unchanged() {
        let mut wallet = Wallet::new(coins("3"), coins("1"));
        let result = wallet.exchange_ton(coins("1.5"), 50.0);
        assert!(matches!(result, Err(GameError::InsufficientFunds { .. })));
        assert_eq!(wallet, Wallet::new(coins("3"), coins("1")));
    }

    #[test]
    fn sut__when_topping_up_zero_then_invalid_amount_is_returned() {
        let mut wallet = Wallet::default();
        let result = wallet.top_up(Currency::Balance, Amount::ZERO);
        assert!(matches!(result, Err(GameError::InvalidAmount(_))));
        assert_eq!(wallet, Wallet::default());
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]
        #[test]
        fn debit__never_overdraws(balance in 0u64..=1_000_000_000_000u64, amount in 0u64..=2_000_000_000_000u64) {
            let mut wallet = Wallet::new(Amount::ZERO, Amount::from_units(balance));
            let result = wallet.debit(Currency::Ton, Amount::from_units(amount));
            if amount > balance {
                prop_assert!(result.is_err());
                prop_assert_eq!(wallet.balance(Currency::Ton), Amount::from_units(balance));
            } else {
                prop_assert!(result.is_ok());
                prop_assert_eq!(wallet.balance(Currency::Ton), Amount::from_units(balance - amount));
            }
        }
    }
}
