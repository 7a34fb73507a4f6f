use crate::{
    amount::Amount,
    crash::{
        Phase,
        PlayerStatus,
    },
    gifts::GiftId,
    wallet::Currency,
};
use std::path::PathBuf;
use thiserror::Error;

/// Precondition failures of core operations. A returned error means no state changed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("insufficient {currency} funds (needed={needed}, available={available})")]
    InsufficientFunds {
        currency: Currency,
        needed: Amount,
        available: Amount,
    },
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("bet not allowed (phase={phase}, player={player})")]
    BetNotAllowed { phase: Phase, player: PlayerStatus },
    #[error("cash-out not allowed (phase={phase}, player={player})")]
    CashOutNotAllowed { phase: Phase, player: PlayerStatus },
    #[error("unknown case id {0}")]
    UnknownCase(u32),
    #[error("a case is already open")]
    CaseInProgress,
    #[error("prize pool is empty")]
    EmptyPrizePool,
    #[error("no revealed prize to claim")]
    NothingRevealed,
    #[error("gift {0} not found")]
    GiftNotFound(GiftId),
    #[error("no crash round is mounted")]
    RoundNotMounted,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
