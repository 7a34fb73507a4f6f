use crate::client::{
    AppSnapshot,
    Screen,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use crash_gifts::{
    Phase,
    crash::{
        Candle,
        ParticipantStatus,
    },
};
use crossterm::event::{
    Event,
    EventStream,
    KeyCode,
    KeyEvent,
    KeyEventKind,
};
use crossterm::terminal::{
    disable_raw_mode,
    enable_raw_mode,
};
use futures::StreamExt;
use ratatui::prelude::*;
use ratatui::widgets::*;
use std::io::stdout;

pub type InputEventReceiver = EventStream;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UserEvent {
    Quit,
    Redraw,
    Show(Screen),
    NextItem,
    PrevItem,
    PlaceBet(String),
    GiftBet,
    CashOut,
    OpenCase,
    KeepRevealed,
    SellRevealed,
    DismissCase,
    SellGift,
    SellAll,
    Exchange(String),
    TopUp(String),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum AmountKind {
    Bet,
    Exchange,
    TopUp,
}

impl AmountKind {
    fn title(self) -> &'static str {
        match self {
            AmountKind::Bet => "Place Bet (TON)",
            AmountKind::Exchange => "Exchange TON -> Balance",
            AmountKind::TopUp => "Top Up TON",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
enum Mode {
    #[default]
    Normal,
    AmountModal { kind: AmountKind, input: String },
    QuitModal,
}

#[derive(Debug, Default)]
pub struct UiState {
    mode: Mode,
    screen: Screen,
    // mirrors the snapshot so key handling knows when the case view is up
    case_open: bool,
    case_revealed: bool,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

pub fn input_event_stream() -> InputEventReceiver {
    EventStream::new()
}

pub async fn next_raw_event(stream: &mut InputEventReceiver) -> Result<Event> {
    match stream.next().await {
        Some(event) => Ok(event?),
        None => Err(eyre!("terminal input stream closed")),
    }
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    state.screen = snap.screen;
    state.case_open = snap.game.case.case_id.is_some();
    state.case_revealed = snap.game.case.revealed.is_some();
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, snap))?;
        state.terminal = Some(term);
    }
    Ok(())
}

/// Maps a terminal event to a user intent, updating modal state as a side effect.
pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    let Event::Key(key) = event else {
        return None;
    };
    if key.kind != KeyEventKind::Press {
        return None;
    }
    interpret_key(state, key)
}

fn interpret_key(state: &mut UiState, key: KeyEvent) -> Option<UserEvent> {
    match &mut state.mode {
        Mode::AmountModal { kind, input } => {
            return match key.code {
                KeyCode::Esc => {
                    state.mode = Mode::Normal;
                    Some(UserEvent::Redraw)
                }
                KeyCode::Enter => {
                    let raw = std::mem::take(input);
                    let event = match kind {
                        AmountKind::Bet => UserEvent::PlaceBet(raw),
                        AmountKind::Exchange => UserEvent::Exchange(raw),
                        AmountKind::TopUp => UserEvent::TopUp(raw),
                    };
                    state.mode = Mode::Normal;
                    Some(event)
                }
                KeyCode::Backspace => {
                    input.pop();
                    Some(UserEvent::Redraw)
                }
                KeyCode::Char(c) if c.is_ascii_digit() || c == '.' => {
                    if input.len() < 20 {
                        input.push(c);
                    }
                    Some(UserEvent::Redraw)
                }
                _ => None,
            };
        }
        Mode::QuitModal => {
            return match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => Some(UserEvent::Quit),
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    state.mode = Mode::Normal;
                    Some(UserEvent::Redraw)
                }
                _ => None,
            };
        }
        Mode::Normal => {}
    }

    if state.case_open {
        return match key.code {
            KeyCode::Char('k') if state.case_revealed => Some(UserEvent::KeepRevealed),
            KeyCode::Char('s') if state.case_revealed => Some(UserEvent::SellRevealed),
            KeyCode::Esc => Some(UserEvent::DismissCase),
            _ => None,
        };
    }

    let open_amount = |state: &mut UiState, kind| {
        state.mode = Mode::AmountModal {
            kind,
            input: String::new(),
        };
        Some(UserEvent::Redraw)
    };

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            state.mode = Mode::QuitModal;
            Some(UserEvent::Redraw)
        }
        KeyCode::Char('1') => Some(UserEvent::Show(Screen::Crash)),
        KeyCode::Char('2') => Some(UserEvent::Show(Screen::Cases)),
        KeyCode::Char('3') => Some(UserEvent::Show(Screen::Gifts)),
        KeyCode::Tab => Some(UserEvent::Show(state.screen.next())),
        KeyCode::Down | KeyCode::Char('j') => Some(UserEvent::NextItem),
        KeyCode::Up | KeyCode::Char('k') => Some(UserEvent::PrevItem),
        KeyCode::Char('x') => open_amount(state, AmountKind::Exchange),
        KeyCode::Char('t') => open_amount(state, AmountKind::TopUp),
        KeyCode::Char('b') if state.screen == Screen::Crash => {
            open_amount(state, AmountKind::Bet)
        }
        KeyCode::Char('g') if state.screen == Screen::Crash => Some(UserEvent::GiftBet),
        KeyCode::Char('c') | KeyCode::Char(' ') if state.screen == Screen::Crash => {
            Some(UserEvent::CashOut)
        }
        KeyCode::Enter if state.screen == Screen::Cases => Some(UserEvent::OpenCase),
        KeyCode::Enter | KeyCode::Char('s') if state.screen == Screen::Gifts => {
            Some(UserEvent::SellGift)
        }
        KeyCode::Char('a') if state.screen == Screen::Gifts => Some(UserEvent::SellAll),
        _ => None,
    }
}

fn ui(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),  // tabs + balances
            Constraint::Min(12),    // active screen
            Constraint::Length(10), // activity + errors
            Constraint::Length(3),  // help
        ])
        .split(f.area());

    draw_top(f, chunks[0], snap);
    match snap.screen {
        Screen::Crash => draw_crash(f, chunks[1], snap),
        Screen::Cases => draw_cases(f, chunks[1], snap),
        Screen::Gifts => draw_gifts(f, chunks[1], snap),
    }
    draw_log(f, chunks[2], snap);
    draw_help(f, chunks[3], snap);
    draw_modals(f, state, snap);
}

fn draw_top(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(30), Constraint::Min(20)])
        .split(area);
    let selected = Screen::ALL
        .iter()
        .position(|s| *s == snap.screen)
        .unwrap_or(0);
    let tabs = Tabs::new(Screen::ALL.iter().map(|s| s.title()))
        .select(selected)
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(tabs, cols[0]);
    let balances = Paragraph::new(format!(
        "Balance: {} | TON: {} | Gifts: {} ({} TON) | {}",
        snap.game.balance,
        snap.game.ton,
        snap.game.gifts.len(),
        snap.game.collection_value,
        snap.status
    ))
    .block(Block::default().borders(Borders::ALL).title("Wallet"));
    f.render_widget(balances, cols[1]);
}

fn multiplier_color(multiplier: f64) -> Color {
    if multiplier < 1.5 {
        Color::Red
    } else if multiplier < 3.0 {
        Color::Yellow
    } else {
        Color::Green
    }
}

fn draw_crash(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(area);
    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Length(4), Constraint::Min(5)])
        .split(cols[0]);

    let mut history: Vec<Span> = Vec::new();
    if snap.game.history.is_empty() {
        history.push(Span::styled("None", Style::default().fg(Color::DarkGray)));
    }
    for m in &snap.game.history {
        history.push(Span::styled(
            format!("{m:.2}x "),
            Style::default().fg(multiplier_color(*m)),
        ));
    }
    f.render_widget(
        Paragraph::new(Line::from(history))
            .block(Block::default().borders(Borders::ALL).title("History")),
        left[0],
    );

    let Some(round) = &snap.game.round else {
        f.render_widget(
            Paragraph::new("No round mounted")
                .block(Block::default().borders(Borders::ALL).title("Round")),
            left[1],
        );
        return;
    };

    let (label, color) = match round.phase() {
        Phase::Waiting => ("Waiting for next round...", Color::DarkGray),
        Phase::Rising => ("Rising", multiplier_color(round.multiplier())),
        Phase::Crashed => ("CRASHED", Color::Red),
    };
    let local = round.local();
    let bet_line = match local.stake {
        Some(stake) => match local.cash_out {
            Some(m) => format!("Your bet: {stake} TON | {} at {m:.2}x", local.status),
            None => format!("Your bet: {stake} TON | {}", local.status),
        },
        None => String::from("No bet this round"),
    };
    let header = Paragraph::new(vec![
        Line::styled(
            format!("{:.2}x  {label}", round.multiplier()),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Line::from(bet_line),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Round {} | price {:.2}", round.id(), round.price())),
    );
    f.render_widget(header, left[1]);

    let chart_block = Block::default().borders(Borders::ALL).title("Price");
    let inner = chart_block.inner(left[2]);
    f.render_widget(chart_block, left[2]);
    let candles: Vec<Candle> = round.candles().iter().copied().collect();
    f.render_widget(Paragraph::new(candle_rows(&candles, inner.height)), inner);

    let items: Vec<ListItem> = round
        .participants()
        .iter()
        .map(|p| {
            let (text, style) = match (p.status, p.cash_out) {
                (ParticipantStatus::CashedOut, Some(m)) => (
                    format!("{} {} {} TON @ {m:.2}x", p.avatar, p.nickname, p.bet),
                    Style::default().fg(Color::Green),
                ),
                (ParticipantStatus::Lost, _) => (
                    format!("{} {} {} TON lost", p.avatar, p.nickname, p.bet),
                    Style::default().fg(Color::Red),
                ),
                _ => (
                    format!("{} {} {} TON", p.avatar, p.nickname, p.bet),
                    Style::default(),
                ),
            };
            let style = if p.is_local {
                style.add_modifier(Modifier::BOLD)
            } else {
                style
            };
            ListItem::new(Line::styled(text, style))
        })
        .collect();
    f.render_widget(
        List::new(items).block(Block::default().borders(Borders::ALL).title("Players")),
        cols[1],
    );
}

/// Renders candles as coloured columns, one character per candle, with wicks
/// drawn thin and bodies drawn solid.
fn candle_rows(candles: &[Candle], height: u16) -> Vec<Line<'static>> {
    let height = usize::from(height);
    if candles.is_empty() || height == 0 {
        return Vec::new();
    }
    let top = candles.iter().map(|c| c.high).fold(f64::MIN, f64::max);
    let bottom = candles.iter().map(|c| c.low).fold(f64::MAX, f64::min);
    let span = (top - bottom).max(f64::EPSILON);
    let row_of = |price: f64| -> usize {
        let scaled = (top - price) / span * (height - 1) as f64;
        (scaled.round() as usize).min(height - 1)
    };
    (0..height)
        .map(|row| {
            let spans: Vec<Span<'static>> = candles
                .iter()
                .map(|c| {
                    let body_top = row_of(c.open.max(c.close));
                    let body_bottom = row_of(c.open.min(c.close));
                    let glyph = if row >= body_top && row <= body_bottom {
                        "█"
                    } else if row >= row_of(c.high) && row <= row_of(c.low) {
                        "│"
                    } else {
                        " "
                    };
                    let color = if c.is_up() { Color::Green } else { Color::Red };
                    Span::styled(format!("{glyph} "), Style::default().fg(color))
                })
                .collect();
            Line::from(spans)
        })
        .collect()
}

fn draw_cases(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let items: Vec<ListItem> = snap
        .game
        .catalog
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let cur = if i == snap.selected_case { ">" } else { " " };
            let price = if entry.is_free {
                String::from("FREE")
            } else {
                format!("{} {}", entry.price, snap.game.case_currency)
            };
            let style = if i == snap.selected_case {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default()
            };
            ListItem::new(Line::styled(
                format!("{cur} {} {:<18} {price}", entry.icon, entry.name),
                style,
            ))
        })
        .collect();
    f.render_widget(
        List::new(items).block(Block::default().borders(Borders::ALL).title("Cases")),
        area,
    );
}

fn draw_gifts(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let title = format!("Gifts | total {} TON", snap.game.collection_value);
    if snap.game.gifts.is_empty() {
        f.render_widget(
            Paragraph::new("No gifts yet. Open a case!")
                .block(Block::default().borders(Borders::ALL).title(title)),
            area,
        );
        return;
    }
    let items: Vec<ListItem> = snap
        .game
        .gifts
        .iter()
        .enumerate()
        .map(|(i, gift)| {
            let cur = if i == snap.selected_gift { ">" } else { " " };
            ListItem::new(format!(
                "{cur} {} {:<16} {} TON  {}",
                gift.icon, gift.name, gift.value, gift.id
            ))
        })
        .collect();
    f.render_widget(
        List::new(items).block(Block::default().borders(Borders::ALL).title(title)),
        area,
    );
}

fn draw_log(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);
    let activity: Vec<Line> = if snap.activity.is_empty() {
        vec![Line::styled("Nothing yet", Style::default().fg(Color::DarkGray))]
    } else {
        snap.activity.iter().map(|l| Line::from(l.clone())).collect()
    };
    f.render_widget(
        Paragraph::new(activity).block(Block::default().borders(Borders::ALL).title("Activity")),
        cols[0],
    );
    let (lines, color) = if snap.errors.is_empty() {
        (vec![Line::from("No errors")], Color::DarkGray)
    } else {
        (
            snap.errors.iter().map(|e| Line::from(e.clone())).collect(),
            Color::Red,
        )
    };
    f.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .style(Style::default().fg(color))
            .block(Block::default().borders(Borders::ALL).title("Errors")),
        cols[1],
    );
}

fn draw_help(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let keys = match snap.screen {
        Screen::Crash => "b bet | g bet selected gift | c/space cash out",
        Screen::Cases => "↑/↓ select | Enter open",
        Screen::Gifts => "↑/↓ select | s sell | a sell all",
    };
    let help = Paragraph::new(format!(
        "1/2/3/Tab screens | {keys} | x exchange | t top up | q/Esc quit"
    ))
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, area);
}

fn draw_modals(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    if let Some(case_id) = snap.game.case.case_id {
        let area = centered_rect(50, 40, f.area());
        let name = snap
            .game
            .catalog
            .iter()
            .find(|entry| entry.id == case_id)
            .map(|entry| entry.name.as_str())
            .unwrap_or("Case");
        let block = Block::default().borders(Borders::ALL).title(name.to_string());
        let lines = match &snap.game.case.revealed {
            Some(gift) => vec![
                Line::styled(
                    format!("{} {}", gift.icon, gift.name),
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                ),
                Line::from(format!("Worth {} TON", gift.value)),
                Line::from(""),
                Line::from("k keep | s sell | Esc discard"),
            ],
            None => vec![
                Line::from("Spinning..."),
                Line::from(""),
                Line::from("Esc close (prize is lost)"),
            ],
        };
        f.render_widget(Clear, area);
        f.render_widget(block.clone(), area);
        f.render_widget(Paragraph::new(lines), block.inner(area));
    }
    match &state.mode {
        Mode::AmountModal { kind, input } => {
            let area = centered_rect(40, 25, f.area());
            let block = Block::default().borders(Borders::ALL).title(kind.title());
            let p = Paragraph::new(format!(
                "Amount: {input}\nEnter=confirm Esc=cancel digits/. to edit"
            ));
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::QuitModal => {
            let area = centered_rect(40, 20, f.area());
            let block = Block::default().borders(Borders::ALL).title("Confirm Quit");
            let p = Paragraph::new("Quit the game? (Y/N)");
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::Normal => {}
    }
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1])[1]
}
