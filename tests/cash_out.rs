#![allow(non_snake_case)]
use crash_gifts::{
    Amount,
    GameConfig,
    GameError,
    PlayerStatus,
    crash::DeadlineBucket,
    test_helpers::{
        TestContext,
        coins,
    },
};

/// Rounds that always run at least five seconds, so a cash-out early in
/// `rising` never races the crash.
fn long_round_context(ton: &str, seed: u64) -> TestContext {
    let mut config = GameConfig::default();
    config.wallet.initial_balance = Amount::ZERO;
    config.wallet.initial_ton = coins(ton);
    config.crash.deadline_buckets = vec![DeadlineBucket {
        upper: 1.0,
        min_ms: 5_000,
        max_ms: 8_000,
    }];
    TestContext::with_config(config, seed)
}

#[test]
fn cash_out__credits_stake_times_current_multiplier() {
    // given
    let mut ctx = long_round_context("10", 11);
    ctx.session().mount_crash();
    ctx.session().place_bet(coins("2")).unwrap();
    ctx.session().advance(2_100);
    let multiplier = ctx.session().crash().round().unwrap().multiplier();
    assert!(multiplier > 1.0);

    // when
    let winnings = ctx.session().cash_out().unwrap();

    // then
    assert_eq!(winnings, coins("2").scale(multiplier));
    assert_eq!(ctx.ton(), coins("8").saturating_add(winnings));
    assert_eq!(ctx.player(), Some(PlayerStatus::Won));
}

#[test]
fn cash_out__is_rejected_while_waiting() {
    // given
    let mut ctx = TestContext::with_ton("10", 12);
    ctx.session().mount_crash();
    ctx.session().place_bet(coins("2")).unwrap();

    // when
    let result = ctx.session().cash_out();

    // then
    assert!(matches!(
        result,
        Err(GameError::CashOutNotAllowed {
            player: PlayerStatus::Betting,
            ..
        })
    ));
    assert_eq!(ctx.ton(), coins("8"));
}

#[test]
fn cash_out__without_a_bet_is_rejected() {
    let mut ctx = TestContext::with_ton("10", 13);
    ctx.mount_and_rise();

    let result = ctx.session().cash_out();

    assert!(matches!(
        result,
        Err(GameError::CashOutNotAllowed {
            player: PlayerStatus::Idle,
            ..
        })
    ));
}

#[test]
fn cash_out__after_crash_changes_nothing() {
    // given
    let mut ctx = TestContext::with_ton("10", 14);
    ctx.session().mount_crash();
    ctx.session().place_bet(coins("2")).unwrap();
    ctx.session().advance(2_000);
    ctx.run_until_crash();

    // when
    let result = ctx.session().cash_out();

    // then
    assert!(result.is_err());
    assert_eq!(ctx.ton(), coins("8"));
}

#[test]
fn cash_out__records_multiplier_on_the_local_participant() {
    let mut ctx = TestContext::with_ton("10", 15);
    ctx.mount_and_rise();
    ctx.session().place_bet(coins("1")).unwrap();

    let winnings = ctx.session().cash_out().unwrap();

    let round = ctx.session().crash().round().unwrap().clone();
    let me = round.participants().iter().find(|p| p.is_local).unwrap();
    assert_eq!(me.winnings, Some(winnings));
    assert_eq!(me.cash_out, round.local().cash_out);
}
