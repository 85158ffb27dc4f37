use crate::browser;
use crate::fetch::{self, Batch};
use crate::gh::PrSearch;
use crate::session::{Effect, Event, Session};
use anyhow::{Context, Result};
use crossterm::event::{self, Event as TermEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Tabs};
use ratatui::{Frame, Terminal};
use std::io::{self, Stdout};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const INPUT_POLL: Duration = Duration::from_millis(200);

/// Styles for the picker, fixed when the view is built.
#[derive(Debug, Clone)]
pub struct Theme {
    pub tab: Style,
    pub selected_tab: Style,
    pub repo: Style,
    pub title: Style,
    pub author: Style,
    pub muted: Style,
    pub highlight: Style,
    pub status: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            tab: Style::default().fg(Color::Indexed(240)),
            selected_tab: Style::default()
                .fg(Color::Indexed(205))
                .bg(Color::Indexed(236))
                .add_modifier(Modifier::BOLD),
            repo: Style::default().fg(Color::Cyan),
            title: Style::default().add_modifier(Modifier::BOLD),
            author: Style::default().fg(Color::Green),
            muted: Style::default().fg(Color::DarkGray),
            highlight: Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
            status: Style::default().fg(Color::Yellow),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Filter,
}

/// Everything the renderer needs besides the session itself.
pub struct View {
    theme: Theme,
    input_mode: InputMode,
    filter_input: String,
    status_message: Option<String>,
}

impl View {
    pub fn new(theme: Theme) -> Self {
        Self {
            theme,
            input_mode: InputMode::Normal,
            filter_input: String::new(),
            status_message: None,
        }
    }
}

enum Message {
    Key(KeyEvent),
    Resize(u16, u16),
    InputFailed(String),
    Refreshed(Batch),
}

pub fn event_for_key(key: KeyEvent) -> Option<Event> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let event = match key.code {
        KeyCode::Char('c') if ctrl => Event::Quit,
        KeyCode::Char('q') | KeyCode::Esc => Event::Quit,
        KeyCode::Left | KeyCode::Char('h') | KeyCode::BackTab => Event::NavigatePrev,
        KeyCode::Right | KeyCode::Char('l') | KeyCode::Tab => Event::NavigateNext,
        KeyCode::Down | KeyCode::Char('j') => Event::RowNext,
        KeyCode::Up | KeyCode::Char('k') => Event::RowPrev,
        KeyCode::Home | KeyCode::Char('g') => Event::RowFirst,
        KeyCode::End | KeyCode::Char('G') => Event::RowLast,
        KeyCode::Enter => Event::Select,
        KeyCode::Char('c') => Event::RequestCheckout,
        KeyCode::Char('r') => Event::ManualRefresh,
        _ => return None,
    };
    Some(event)
}

/// Route a key through the current input mode. Filter edits are sent to the
/// session as they are typed.
fn handle_key(view: &mut View, session: &Session, key: KeyEvent) -> Option<Event> {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(Event::Quit);
    }

    match view.input_mode {
        InputMode::Normal => match key.code {
            KeyCode::Char('/') => {
                view.input_mode = InputMode::Filter;
                None
            }
            KeyCode::Esc if !session.filter().is_empty() => {
                view.filter_input.clear();
                Some(Event::Filter(String::new()))
            }
            _ => event_for_key(key),
        },
        InputMode::Filter => match key.code {
            KeyCode::Enter => {
                view.input_mode = InputMode::Normal;
                None
            }
            KeyCode::Esc => {
                view.input_mode = InputMode::Normal;
                view.filter_input.clear();
                Some(Event::Filter(String::new()))
            }
            KeyCode::Backspace => {
                view.filter_input.pop();
                Some(Event::Filter(view.filter_input.clone()))
            }
            KeyCode::Char(c) => {
                view.filter_input.push(c);
                Some(Event::Filter(view.filter_input.clone()))
            }
            _ => None,
        },
    }
}

pub fn draw(frame: &mut Frame, session: &mut Session, view: &View) {
    let theme = &view.theme;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(frame.area());

    draw_tabs(frame, session, theme, chunks[0]);
    draw_entries(frame, session, theme, chunks[1]);

    let help = match view.input_mode {
        InputMode::Filter => Paragraph::new(Line::from(vec![
            Span::styled(format!(" /{}▏", view.filter_input), theme.status),
            Span::styled("  Enter: apply | Esc: clear", theme.muted),
        ])),
        InputMode::Normal if !session.filter().is_empty() => Paragraph::new(Line::from(vec![
            Span::styled(format!(" filter: {}", session.filter()), theme.status),
            Span::styled(" | Esc: clear | /: edit | Enter: open | c: checkout | q: quit", theme.muted),
        ])),
        InputMode::Normal => Paragraph::new(
            " ←/→: category | j/k: navigate | Enter: open | c: checkout | r: refresh | /: filter | q: quit",
        )
        .style(theme.muted),
    };
    frame.render_widget(
        help.block(Block::default().borders(Borders::ALL).title(" Help ")),
        chunks[2],
    );

    if let Some(msg) = &view.status_message {
        let area = frame.area();
        let popup_area = Rect {
            x: area.width / 8,
            y: area.height.saturating_sub(4),
            width: area.width * 3 / 4,
            height: area.height.min(3),
        };
        let popup = Paragraph::new(msg.as_str())
            .block(Block::default().borders(Borders::ALL).title(" Status "))
            .style(theme.status);
        frame.render_widget(Clear, popup_area);
        frame.render_widget(popup, popup_area);
    }
}

fn draw_tabs(frame: &mut Frame, session: &Session, theme: &Theme, area: Rect) {
    let titles: Vec<Line> = session
        .categories()
        .iter()
        .enumerate()
        .map(|(i, category)| {
            Line::from(format!("{} ({})", category.label, session.entry_count(i)))
        })
        .collect();

    let status = if session.is_refreshing() {
        "refreshing… ".to_string()
    } else {
        match session.last_refresh() {
            Some(at) => {
                let wait = session
                    .next_refresh()
                    .saturating_duration_since(Instant::now());
                let wait = chrono::Duration::from_std(wait).unwrap_or_else(|_| chrono::Duration::zero());
                let next = chrono::Local::now() + wait;
                format!(
                    "updated {}, next {} ",
                    at.with_timezone(&chrono::Local).format("%H:%M:%S"),
                    next.format("%H:%M:%S")
                )
            }
            None => String::new(),
        }
    };

    let tabs = Tabs::new(titles)
        .select(session.category_index())
        .style(theme.tab)
        .highlight_style(theme.selected_tab)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Pull requests ")
                .title(Line::from(Span::styled(status, theme.muted)).right_aligned()),
        );
    frame.render_widget(tabs, area);
}

fn draw_entries(frame: &mut Frame, session: &mut Session, theme: &Theme, area: Rect) {
    let label = session
        .categories()
        .get(session.category_index())
        .map(|c| c.label.clone())
        .unwrap_or_default();
    let position = match session.highlighted_index() {
        Some(i) => format!(" {}/{} ", i + 1, session.entries().len()),
        None => String::new(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", label))
        .title(Line::from(position).right_aligned());

    if session.entries().is_empty() {
        let text = if session.is_refreshing() && session.last_refresh().is_none() {
            "Loading…".to_string()
        } else if session.entry_count(session.category_index()) > 0 {
            format!("No matches for \"{}\"", session.filter())
        } else {
            "Nothing to see here".to_string()
        };
        let empty = Paragraph::new(Line::from(text))
            .style(theme.muted.add_modifier(Modifier::ITALIC))
            .alignment(Alignment::Center)
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let items: Vec<ListItem> = session
        .entries()
        .iter()
        .map(|entry| {
            let line = Line::from(vec![
                Span::styled(format!("[{}] ", entry.repo_name), theme.repo),
                Span::raw(format!("#{}: ", entry.number)),
                Span::styled(entry.title.clone(), theme.title),
            ]);
            let details = Line::from(vec![
                Span::styled(format!("  @{}", entry.author), theme.author),
                Span::raw(" | "),
                Span::styled(format!("age {}", entry.age), theme.muted),
                Span::raw(" | "),
                Span::styled(format!("updated {} ago", entry.since_update), theme.muted),
                Span::raw(" | "),
                Span::styled(format!("{} comments", entry.comments_count), theme.muted),
            ]);
            ListItem::new(vec![line, details])
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(theme.highlight)
        .highlight_symbol("▶ ");

    frame.render_stateful_widget(list, area, session.list_state_mut());
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode().context("Failed to disable raw mode")?;
    terminal.backend_mut().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_input_reader(tx: Sender<Message>, stop: Arc<AtomicBool>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while !stop.load(Ordering::Relaxed) {
            let message = match event::poll(INPUT_POLL) {
                Ok(false) => continue,
                Ok(true) => match event::read() {
                    Ok(TermEvent::Key(key)) if key.kind == KeyEventKind::Press => {
                        Message::Key(key)
                    }
                    Ok(TermEvent::Resize(width, height)) => Message::Resize(width, height),
                    Ok(_) => continue,
                    Err(err) => Message::InputFailed(err.to_string()),
                },
                Err(err) => Message::InputFailed(err.to_string()),
            };
            let failed = matches!(message, Message::InputFailed(_));
            if tx.send(message).is_err() || failed {
                break;
            }
        }
    })
}

fn apply_effect(
    effect: Effect,
    session: &mut Session,
    view: &mut View,
    searcher: &Arc<dyn PrSearch>,
    tx: &Sender<Message>,
) {
    match effect {
        Effect::Refresh => {
            let tx = tx.clone();
            let spawned = fetch::spawn_refresh(
                Arc::clone(searcher),
                session.categories().to_vec(),
                session.refresh_generation(),
                move |batch| {
                    // The loop may already be gone; the batch is simply dropped.
                    let _ = tx.send(Message::Refreshed(batch));
                },
            );
            if let Err(err) = spawned {
                log::error!("{:#}", err);
                view.status_message = Some(format!("Refresh failed: {err}"));
                session.handle(Event::RefreshFailed, Instant::now());
            }
        }
        Effect::OpenUrl(url) => {
            if let Err(err) = browser::open_url(&url) {
                log::warn!("{:#}", err);
                view.status_message = Some(format!("Open manually: {url}"));
            }
        }
    }
}

/// Turn one received message into session transitions.
fn dispatch<B: Backend>(
    terminal: &mut Terminal<B>,
    session: &mut Session,
    view: &mut View,
    searcher: &Arc<dyn PrSearch>,
    tx: &Sender<Message>,
    received: Result<Message, RecvTimeoutError>,
) -> Result<()> {
    // A queue that never drains must not hold back an overdue refresh.
    let now = Instant::now();
    if now >= session.next_refresh() {
        if let Some(effect) = session.handle(Event::Tick, now) {
            apply_effect(effect, session, view, searcher, tx);
        }
    }

    let event = match received {
        Ok(Message::Key(key)) => {
            view.status_message = None;
            match handle_key(view, session, key) {
                Some(event) => event,
                None => return Ok(()),
            }
        }
        Ok(Message::Resize(width, height)) => {
            terminal.autoresize()?;
            Event::Resize { width, height }
        }
        Ok(Message::Refreshed(batch)) => Event::RefreshCompleted(batch),
        Ok(Message::InputFailed(err)) => anyhow::bail!("Failed to read terminal input: {err}"),
        Err(RecvTimeoutError::Timeout) => Event::Tick,
        Err(RecvTimeoutError::Disconnected) => anyhow::bail!("Event channel closed"),
    };

    if let Some(effect) = session.handle(event, Instant::now()) {
        apply_effect(effect, session, view, searcher, tx);
    }
    Ok(())
}

fn event_loop<B: Backend>(
    terminal: &mut Terminal<B>,
    session: &mut Session,
    view: &mut View,
    searcher: &Arc<dyn PrSearch>,
    rx: &Receiver<Message>,
    tx: &Sender<Message>,
) -> Result<()> {
    let effect = session.start(Instant::now());
    apply_effect(effect, session, view, searcher, tx);

    loop {
        terminal.draw(|frame| draw(frame, session, view))?;
        if session.is_finished() {
            return Ok(());
        }

        // Block until input, a finished refresh, or the refresh deadline.
        let received = rx.recv_timeout(session.time_until_refresh(Instant::now()));
        dispatch(terminal, session, view, searcher, tx, received)?;
    }
}

/// Run the picker until the session reaches a terminal state. The terminal is
/// restored before returning, whatever the outcome.
pub fn run(mut session: Session, searcher: Arc<dyn PrSearch>, theme: Theme) -> Result<Session> {
    let mut terminal = setup_terminal()?;
    let (tx, rx) = mpsc::channel();
    let stop = Arc::new(AtomicBool::new(false));
    let reader = spawn_input_reader(tx.clone(), Arc::clone(&stop));
    let mut view = View::new(theme);

    let result = event_loop(&mut terminal, &mut session, &mut view, &searcher, &rx, &tx);

    // Stop reading stdin before anything after the TUI needs it.
    stop.store(true, Ordering::Relaxed);
    if reader.join().is_err() {
        log::error!("input reader panicked");
    }
    restore_terminal(&mut terminal)?;

    result.map(|()| session)
}
