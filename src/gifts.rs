use crate::{
    amount::Amount,
    error::GameError,
    wallet::{
        Currency,
        Wallet,
    },
};
use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;
use tracing::info;

/// Identity of an owned gift instance, assigned when the gift is awarded.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GiftId(u64);

impl GiftId {
    pub const fn new(raw: u64) -> Self {
        GiftId(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for GiftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Immutable prize definition from the prize pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftTemplate {
    pub name: String,
    pub icon: String,
    pub value: Amount,
}

impl GiftTemplate {
    pub fn new(name: impl Into<String>, icon: impl Into<String>, value: Amount) -> Self {
        Self {
            name: name.into(),
            icon: icon.into(),
            value,
        }
    }

    pub fn instantiate(&self, id: GiftId) -> Gift {
        Gift {
            id,
            name: self.name.clone(),
            icon: self.icon.clone(),
            value: self.value,
        }
    }
}

/// A value-bearing gift owned by the player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gift {
    pub id: GiftId,
    pub name: String,
    pub icon: String,
    pub value: Amount,
}

pub fn default_prize_pool() -> Vec<GiftTemplate> {
    let ton = |units: u64| Amount::from_units(units * 100_000_000);
    vec![
        GiftTemplate::new("Common Gem", "💎", ton(5)),
        GiftTemplate::new("Rare Coin", "🪙", ton(12)),
        GiftTemplate::new("Epic Sword", "⚔️", ton(25)),
        GiftTemplate::new("Legendary Crown", "👑", ton(50)),
        GiftTemplate::new("Mystery Box", "🎁", ton(18)),
        GiftTemplate::new("Golden Star", "⭐", ton(32)),
        GiftTemplate::new("Magic Wand", "🪄", ton(41)),
        GiftTemplate::new("Treasure Chest", "💰", ton(60)),
    ]
}

#[derive(Debug, Default)]
pub struct GiftIdGenerator {
    next: u64,
}

impl GiftIdGenerator {
    pub fn next_id(&mut self) -> GiftId {
        self.next += 1;
        GiftId(self.next)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct GiftCollection {
    gifts: Vec<Gift>,
}

impl GiftCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gifts(&self) -> &[Gift] {
        &self.gifts
    }

    pub fn len(&self) -> usize {
        self.gifts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gifts.is_empty()
    }

    pub fn total_value(&self) -> Amount {
        self.gifts.iter().map(|gift| gift.value).sum()
    }

    pub fn keep(&mut self, gift: Gift) {
        info!(id = %gift.id, name = %gift.name, value = %gift.value, "gift kept");
        self.gifts.push(gift);
    }

    pub fn get(&self, id: GiftId) -> Option<&Gift> {
        self.gifts.iter().find(|gift| gift.id == id)
    }

    /// Removes the first gift with `id` without crediting anything.
    pub fn take(&mut self, id: GiftId) -> Result<Gift, GameError> {
        let index = self
            .gifts
            .iter()
            .position(|gift| gift.id == id)
            .ok_or(GameError::GiftNotFound(id))?;
        Ok(self.gifts.remove(index))
    }

    /// Removes the first gift with `id` and credits its value in TON.
    pub fn sell_gift(&mut self, id: GiftId, wallet: &mut Wallet) -> Result<Amount, GameError> {
        let gift = self.take(id)?;
        wallet.credit(Currency::Ton, gift.value);
        info!(%id, name = %gift.name, value = %gift.value, "gift sold");
        Ok(gift.value)
    }

    /// Sells every owned gift in one step and returns the credited total.
    pub fn sell_all(&mut self, wallet: &mut Wallet) -> Amount {
        let sold = std::mem::take(&mut self.gifts);
        let total: Amount = sold.iter().map(|gift| gift.value).sum();
        wallet.credit(Currency::Ton, total);
        info!(count = sold.len(), %total, "all gifts sold");
        total
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    fn coins(raw: &str) -> Amount {
        raw.parse().unwrap()
    }

    fn collection_of(values: &[&str]) -> (GiftCollection, Vec<GiftId>) {
        let mut ids = GiftIdGenerator::default();
        let mut collection = GiftCollection::new();
        let mut owned = Vec::new();
        for value in values {
            let id = ids.next_id();
            collection.keep(GiftTemplate::new("Gift", "🎁", coins(value)).instantiate(id));
            owned.push(id);
        }
        (collection, owned)
    }

    #[test]
    fn sut__when_selling_all_then_exact_total_is_credited_and_collection_empties() {
        // given
        let (mut collection, _) = collection_of(&["1.2", "3.2", "0.5"]);
        let mut wallet = Wallet::new(Amount::ZERO, coins("10"));

        // when
        let credited = collection.sell_all(&mut wallet);

        // then
        assert_eq!(credited, coins("4.9"));
        assert_eq!(wallet.balance(Currency::Ton), coins("14.9"));
        assert!(collection.is_empty());
    }

    #[test]
    fn sut__when_selling_unknown_id_then_nothing_changes() {
        // given
        let (mut collection, _) = collection_of(&["1.2"]);
        let before = collection.clone();
        let mut wallet = Wallet::new(Amount::ZERO, coins("1"));

        // when
        let result = collection.sell_gift(GiftId::new(999), &mut wallet);

        // then
        assert_eq!(result, Err(GameError::GiftNotFound(GiftId::new(999))));
        assert_eq!(collection, before);
        assert_eq!(wallet.balance(Currency::Ton), coins("1"));
    }

    #[test]
    fn sut__when_selling_one_gift_then_only_that_instance_is_removed() {
        // given
        let (mut collection, ids) = collection_of(&["0.5", "6.0", "0.5"]);
        let mut wallet = Wallet::default();

        // when
        let credited = collection.sell_gift(ids[1], &mut wallet).unwrap();

        // then
        assert_eq!(credited, coins("6"));
        assert_eq!(collection.len(), 2);
        assert!(collection.gifts().iter().all(|gift| gift.id != ids[1]));
        assert_eq!(collection.total_value(), coins("1"));
    }

    #[test]
    fn sut__when_generating_ids_then_each_is_fresh() {
        let mut ids = GiftIdGenerator::default();
        let a = ids.next_id();
        let b = ids.next_id();
        assert_ne!(a, b);
    }
}
