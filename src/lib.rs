pub mod amount;
pub mod cases;
pub mod config;
pub mod crash;
pub mod error;
pub mod gifts;
pub mod session;
pub mod timers;
pub mod wallet;

pub mod test_helpers;

pub use amount::Amount;
pub use cases::{
    CaseCatalogEntry,
    CaseOutcomeEngine,
    RevealState,
};
pub use config::GameConfig;
pub use crash::{
    CrashRound,
    CrashRoundEngine,
    Phase,
    PlayerStatus,
};
pub use error::{
    ConfigError,
    GameError,
};
pub use gifts::{
    Gift,
    GiftCollection,
    GiftId,
    GiftTemplate,
};
pub use session::{
    CaseView,
    Session,
    SessionSnapshot,
};
pub use wallet::{
    Currency,
    Wallet,
};
