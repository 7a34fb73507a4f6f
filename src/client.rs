use crate::ui;
use chrono::Local;
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use crash_gifts::{
    Amount,
    Currency,
    GameConfig,
    GameError,
    Phase,
    PlayerStatus,
    Session,
    SessionSnapshot,
};
use std::time::Duration;
use tokio::time::{
    self,
    Instant,
};
use tracing::{
    error,
    info,
};

const MAX_ERRORS: usize = 50;
const MAX_ACTIVITY: usize = 200;

pub struct AppConfig {
    pub game: GameConfig,
    pub seed: Option<u64>,
    pub frame: Duration,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Screen {
    #[default]
    Crash,
    Cases,
    Gifts,
}

impl Screen {
    pub const ALL: [Screen; 3] = [Screen::Crash, Screen::Cases, Screen::Gifts];

    pub fn title(self) -> &'static str {
        match self {
            Screen::Crash => "Crash",
            Screen::Cases => "Cases",
            Screen::Gifts => "Gifts",
        }
    }

    pub fn next(self) -> Screen {
        match self {
            Screen::Crash => Screen::Cases,
            Screen::Cases => Screen::Gifts,
            Screen::Gifts => Screen::Crash,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppSnapshot {
    pub game: SessionSnapshot,
    pub screen: Screen,
    pub selected_case: usize,
    pub selected_gift: usize,
    pub status: String,
    pub activity: Vec<String>,
    pub errors: Vec<String>,
}

pub struct AppController {
    session: Session,
    screen: Screen,
    selected_case: usize,
    selected_gift: usize,
    status: String,
    activity: Vec<String>,
    errors: Vec<String>,
    // (round id, phase) seen on the previous frame
    last_seen: Option<(u64, Phase)>,
}

impl AppController {
    pub fn new(config: AppConfig) -> Self {
        let mut session = match config.seed {
            Some(seed) => Session::seeded(config.game, seed),
            None => Session::from_entropy(config.game),
        };
        session.mount_crash();
        Self {
            session,
            screen: Screen::Crash,
            selected_case: 0,
            selected_gift: 0,
            status: String::from("Ready"),
            activity: Vec::new(),
            errors: Vec::new(),
            last_seen: None,
        }
    }

    pub fn snapshot(&self) -> AppSnapshot {
        AppSnapshot {
            game: self.session.snapshot(),
            screen: self.screen,
            selected_case: self.selected_case,
            selected_gift: self.selected_gift,
            status: self.status.clone(),
            activity: self.activity.iter().rev().take(8).cloned().collect(),
            errors: self.errors.iter().rev().take(3).cloned().collect(),
        }
    }

    /// Feeds elapsed wall-clock time into the simulation.
    pub fn tick(&mut self, elapsed: Duration) {
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.session.advance(elapsed_ms);
        self.observe_round();
    }

    fn observe_round(&mut self) {
        let Some(round) = self.session.crash().round() else {
            self.last_seen = None;
            return;
        };
        let seen = (round.id(), round.phase());
        if self.last_seen == Some(seen) {
            return;
        }
        let message = match round.phase() {
            Phase::Waiting => Some(format!("Round {} open for bets", round.id())),
            Phase::Rising => None,
            Phase::Crashed => {
                let outcome = match round.local().status {
                    PlayerStatus::Lost => format!(
                        " | you lost {} TON",
                        round.local().stake.unwrap_or_default()
                    ),
                    PlayerStatus::Won => format!(
                        " | you won {} TON",
                        round.local().winnings.unwrap_or_default()
                    ),
                    _ => String::new(),
                };
                Some(format!("Crashed at {:.2}x{outcome}", round.multiplier()))
            }
        };
        self.last_seen = Some(seen);
        if let Some(message) = message {
            self.record(message);
        }
    }

    pub fn show(&mut self, screen: Screen) {
        if screen == self.screen {
            return;
        }
        if self.screen == Screen::Crash {
            self.session.unmount_crash();
        }
        if screen == Screen::Crash {
            self.session.mount_crash();
        }
        info!(screen = screen.title(), "screen changed");
        self.screen = screen;
    }

    pub fn select_next(&mut self) {
        match self.screen {
            Screen::Cases => {
                let len = self.session.cases().catalog().len();
                self.selected_case = (self.selected_case + 1).min(len.saturating_sub(1));
            }
            Screen::Gifts => {
                let len = self.session.collection().len();
                self.selected_gift = (self.selected_gift + 1).min(len.saturating_sub(1));
            }
            Screen::Crash => {}
        }
    }

    pub fn select_prev(&mut self) {
        match self.screen {
            Screen::Cases => self.selected_case = self.selected_case.saturating_sub(1),
            Screen::Gifts => self.selected_gift = self.selected_gift.saturating_sub(1),
            Screen::Crash => {}
        }
    }

    pub fn place_bet(&mut self, raw: &str) {
        let result = raw
            .parse::<Amount>()
            .and_then(|amount| self.session.place_bet(amount).map(|()| amount));
        match result {
            Ok(amount) => self.record(format!("Bet {amount} TON")),
            Err(e) => self.fail("bet", e),
        }
    }

    /// Stakes the gift highlighted on the Gifts screen.
    pub fn place_gift_bet(&mut self) {
        let Some(gift) = self
            .session
            .collection()
            .gifts()
            .get(self.selected_gift)
            .cloned()
        else {
            self.status = String::from("No gift selected");
            return;
        };
        match self.session.place_gift_bet(gift.id) {
            Ok(stake) => {
                self.record(format!("Bet {} worth {stake} TON", gift.name));
                let len = self.session.collection().len();
                self.selected_gift = self.selected_gift.min(len.saturating_sub(1));
            }
            Err(e) => self.fail("gift bet", e),
        }
    }

    pub fn cash_out(&mut self) {
        match self.session.cash_out() {
            Ok(winnings) => self.record(format!("Cashed out +{winnings} TON")),
            Err(e) => self.fail("cash out", e),
        }
    }

    pub fn open_selected_case(&mut self) {
        let Some(entry) = self
            .session
            .cases()
            .catalog()
            .get(self.selected_case)
            .cloned()
        else {
            return;
        };
        match self.session.open_case(entry.id) {
            Ok(charged) if charged.is_zero() => {
                self.record(format!("Opened {} (free)", entry.name))
            }
            Ok(charged) => self.record(format!("Opened {} for {charged}", entry.name)),
            Err(e) => self.fail("open case", e),
        }
    }

    pub fn keep_revealed(&mut self) {
        let name = self.revealed_name();
        match self.session.keep_revealed() {
            Ok(id) => self.record(format!("Kept {name} {id}")),
            Err(e) => self.fail("keep", e),
        }
    }

    pub fn sell_revealed(&mut self) {
        let name = self.revealed_name();
        match self.session.sell_revealed() {
            Ok(value) => self.record(format!("Sold {name} for {value} TON")),
            Err(e) => self.fail("sell", e),
        }
    }

    fn revealed_name(&self) -> String {
        self.session
            .cases()
            .state()
            .revealed()
            .map(|gift| gift.name.clone())
            .unwrap_or_default()
    }

    pub fn dismiss_case(&mut self) {
        if let Some(gift) = self.session.dismiss_case() {
            self.record(format!("Closed case, {} discarded", gift.name));
        }
    }

    pub fn sell_selected_gift(&mut self) {
        let Some(gift) = self
            .session
            .collection()
            .gifts()
            .get(self.selected_gift)
            .cloned()
        else {
            self.status = String::from("No gift selected");
            return;
        };
        match self.session.sell_gift(gift.id) {
            Ok(value) => {
                self.record(format!("Sold {} for {value} TON", gift.name));
                let len = self.session.collection().len();
                self.selected_gift = self.selected_gift.min(len.saturating_sub(1));
            }
            Err(e) => self.fail("sell gift", e),
        }
    }

    pub fn sell_all(&mut self) {
        if self.session.collection().is_empty() {
            self.status = String::from("No gifts to sell");
            return;
        }
        let total = self.session.sell_all();
        self.selected_gift = 0;
        self.record(format!("Sold all gifts for {total} TON"));
    }

    pub fn exchange(&mut self, raw: &str) {
        let result = raw
            .parse::<Amount>()
            .and_then(|amount| self.session.exchange_ton(amount).map(|got| (amount, got)));
        match result {
            Ok((amount, got)) => self.record(format!("Exchanged {amount} TON for {got}")),
            Err(e) => self.fail("exchange", e),
        }
    }

    pub fn top_up(&mut self, raw: &str) {
        let result = raw
            .parse::<Amount>()
            .and_then(|amount| self.session.top_up(Currency::Ton, amount).map(|()| amount));
        match result {
            Ok(amount) => self.record(format!("Topped up {amount} TON")),
            Err(e) => self.fail("top up", e),
        }
    }

    fn record(&mut self, message: String) {
        let stamped = format!("{} {message}", Local::now().format("%H:%M:%S"));
        self.status = message;
        self.activity.push(stamped);
        if self.activity.len() > MAX_ACTIVITY {
            let drain = self.activity.len() - MAX_ACTIVITY;
            self.activity.drain(0..drain);
        }
    }

    fn fail(&mut self, action: &str, err: GameError) {
        self.status = format!("{action} failed");
        self.push_errors(vec![format!("{action}: {err}")]);
    }

    fn push_errors(&mut self, mut items: Vec<String>) {
        if items.is_empty() {
            return;
        }
        for item in &items {
            error!("{}", item);
        }
        self.errors.append(&mut items);
        if self.errors.len() > MAX_ERRORS {
            let drain = self.errors.len() - MAX_ERRORS;
            self.errors.drain(0..drain);
        }
    }

    fn apply(&mut self, event: ui::UserEvent) {
        match event {
            ui::UserEvent::Show(screen) => self.show(screen),
            ui::UserEvent::NextItem => self.select_next(),
            ui::UserEvent::PrevItem => self.select_prev(),
            ui::UserEvent::PlaceBet(raw) => self.place_bet(&raw),
            ui::UserEvent::GiftBet => self.place_gift_bet(),
            ui::UserEvent::CashOut => self.cash_out(),
            ui::UserEvent::OpenCase => self.open_selected_case(),
            ui::UserEvent::KeepRevealed => self.keep_revealed(),
            ui::UserEvent::SellRevealed => self.sell_revealed(),
            ui::UserEvent::DismissCase => self.dismiss_case(),
            ui::UserEvent::SellGift => self.sell_selected_gift(),
            ui::UserEvent::SellAll => self.sell_all(),
            ui::UserEvent::Exchange(raw) => self.exchange(&raw),
            ui::UserEvent::TopUp(raw) => self.top_up(&raw),
            ui::UserEvent::Quit | ui::UserEvent::Redraw => {}
        }
    }
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let frame = config.frame;
    let mut controller = AppController::new(config);
    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();

    info!("starting UI");
    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(&mut controller, &mut ui_state, &mut input_events, frame).await;
    ui::terminal_exit()?;
    info!("UI closed");
    res
}

async fn run_loop(
    controller: &mut AppController,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
    frame: Duration,
) -> Result<()> {
    let mut ticker = time::interval(frame);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
    let mut last_frame = Instant::now();
    ui::draw(ui_state, &controller.snapshot()).wrap_err("initial draw failed")?;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => { break; }
            _ = ticker.tick() => {
                let now = Instant::now();
                controller.tick(now.saturating_duration_since(last_frame));
                last_frame = now;
                ui::draw(ui_state, &controller.snapshot()).wrap_err("frame draw failed")?;
            }
            raw_ev = ui::next_raw_event(input_events) => {
                let Some(event) = ui::interpret_event(ui_state, raw_ev?) else {
                    continue;
                };
                if matches!(event, ui::UserEvent::Quit) {
                    break;
                }
                controller.apply(event);
                ui::draw(ui_state, &controller.snapshot()).wrap_err("draw after input failed")?;
            }
        }
    }
    Ok(())
}
