pub mod deadline;
pub mod engine;
pub mod round;

pub use deadline::{
    DeadlineBucket,
    DeadlineDraw,
    sample_deadline,
};
pub use engine::CrashRoundEngine;
pub use round::{
    Candle,
    CrashRound,
    LocalPlayer,
    Participant,
    ParticipantStatus,
    Phase,
    PlayerStatus,
};
