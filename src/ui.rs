use crate::{
    client::DashboardView,
    status::StatusLine,
    summary::{
        TicketSummary,
        format_amount,
    },
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use crossterm::{
    event::{
        self,
        Event,
        KeyCode,
        KeyEvent,
        KeyEventKind,
        KeyModifiers,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use ratatui::{
    prelude::*,
    widgets::*,
};
use std::{
    borrow::Cow,
    io::stdout,
};
use tokio::sync::mpsc;
use unicode_width::UnicodeWidthStr;

const MAX_ADDRESS_WIDTH: usize = 52;
const HELP_TEXT: &str = "q/Esc quit | r refresh now | Tab switch table | ↑/↓ scroll";

pub enum UserEvent {
    Quit,
    Refresh,
    Redraw,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TableFocus {
    #[default]
    Regular,
    Hodl,
}

#[derive(Default)]
pub struct UiState {
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
    focus: TableFocus,
    regular_table: TableState,
    hodl_table: TableState,
    // row counts of the last drawn view, used to clamp scrolling
    regular_rows: usize,
    hodl_rows: usize,
}

impl UiState {
    pub fn focus(&self) -> TableFocus {
        self.focus
    }

    pub fn selected(&self, table: TableFocus) -> Option<usize> {
        match table {
            TableFocus::Regular => self.regular_table.selected(),
            TableFocus::Hodl => self.hodl_table.selected(),
        }
    }

    fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            TableFocus::Regular => TableFocus::Hodl,
            TableFocus::Hodl => TableFocus::Regular,
        };
    }

    fn focused_table(&mut self) -> (&mut TableState, usize) {
        match self.focus {
            TableFocus::Regular => (&mut self.regular_table, self.regular_rows),
            TableFocus::Hodl => (&mut self.hodl_table, self.hodl_rows),
        }
    }

    fn scroll_down(&mut self) {
        let (table, rows) = self.focused_table();
        if rows == 0 {
            table.select(None);
            return;
        }
        let next = table.selected().map_or(0, |i| (i + 1).min(rows - 1));
        table.select(Some(next));
    }

    fn scroll_up(&mut self) {
        let (table, rows) = self.focused_table();
        if rows == 0 {
            table.select(None);
            return;
        }
        let prev = table.selected().map_or(0, |i| i.saturating_sub(1));
        table.select(Some(prev));
    }

    fn sync_rows(&mut self, summary: Option<&TicketSummary>) {
        self.regular_rows = summary.map_or(0, |s| s.regular.len());
        self.hodl_rows = summary.map_or(0, |s| s.hodl.len());
        clamp_selection(&mut self.regular_table, self.regular_rows);
        clamp_selection(&mut self.hodl_table, self.hodl_rows);
    }
}

fn clamp_selection(table: &mut TableState, rows: usize) {
    match table.selected() {
        Some(_) if rows == 0 => table.select(None),
        Some(i) if i >= rows => table.select(Some(rows - 1)),
        _ => {}
    }
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    let entered = crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)
        .and_then(|_| Terminal::new(CrosstermBackend::new(stdout())));
    match entered {
        Ok(terminal) => {
            state.terminal = Some(terminal);
            Ok(())
        }
        Err(err) => {
            let _ = terminal_exit();
            Err(err).wrap_err("failed to set up terminal")
        }
    }
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

pub fn draw(state: &mut UiState, view: &DashboardView) -> Result<()> {
    if let Some(mut term) = state.terminal.take() {
        let res = term.draw(|f| render(f, state, view)).map(|_| ());
        state.terminal = Some(term);
        res.wrap_err("failed to draw dashboard")?;
    }
    Ok(())
}

pub type InputEventReceiver = mpsc::UnboundedReceiver<std::io::Result<Event>>;

/// Terminal events read on a dedicated thread, since `event::read` blocks.
pub fn input_event_stream() -> InputEventReceiver {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        loop {
            let ev = event::read();
            let failed = ev.is_err();
            if tx.send(ev).is_err() || failed {
                break;
            }
        }
    });
    rx
}

pub async fn next_raw_event(input_events: &mut InputEventReceiver) -> Result<Event> {
    match input_events.recv().await {
        Some(ev) => ev.wrap_err("failed to read terminal event"),
        None => Err(eyre!("terminal input stream closed")),
    }
}

pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    match event {
        Event::Key(k) if k.kind == KeyEventKind::Press => interpret_key(state, k),
        Event::Resize(_, _) => Some(UserEvent::Redraw),
        _ => None,
    }
}

fn interpret_key(state: &mut UiState, k: KeyEvent) -> Option<UserEvent> {
    // raw mode swallows SIGINT
    if k.modifiers.contains(KeyModifiers::CONTROL) && k.code == KeyCode::Char('c') {
        return Some(UserEvent::Quit);
    }
    Some(match k.code {
        KeyCode::Char('q') | KeyCode::Esc => UserEvent::Quit,
        KeyCode::Char('r') => UserEvent::Refresh,
        KeyCode::Tab => {
            state.toggle_focus();
            UserEvent::Redraw
        }
        KeyCode::Down | KeyCode::Char('j') => {
            state.scroll_down();
            UserEvent::Redraw
        }
        KeyCode::Up | KeyCode::Char('k') => {
            state.scroll_up();
            UserEvent::Redraw
        }
        _ => return None,
    })
}

/// Draws the whole board. Every call rebuilds all widgets from `view`.
pub fn render(f: &mut Frame, state: &mut UiState, view: &DashboardView) {
    let summary = view.summary.as_ref();
    state.sync_rows(summary);

    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // totals
            Constraint::Min(5),    // tables
            Constraint::Length(3), // status
            Constraint::Length(3), // help
        ])
        .split(f.area());

    draw_totals(f, chunks[0], summary);
    draw_tables(f, state, chunks[1], summary);
    draw_status(f, chunks[2], &view.status);
    let help = Paragraph::new(HELP_TEXT)
        .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, chunks[3]);
}

fn totals_text(summary: Option<&TicketSummary>) -> (String, String) {
    match summary {
        Some(s) => (s.regular_total_text(), s.hodl_total_text()),
        None => (String::from("-"), String::from("-")),
    }
}

fn draw_totals(f: &mut Frame, area: Rect, summary: Option<&TicketSummary>) {
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);
    let (regular_total, hodl_total) = totals_text(summary);
    let bold = Style::default().add_modifier(Modifier::BOLD);

    let regular = Paragraph::new(Span::styled(regular_total, bold)).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Regular tickets total"),
    );
    f.render_widget(regular, halves[0]);

    let hodl = Paragraph::new(Span::styled(hodl_total, bold))
        .block(Block::default().borders(Borders::ALL).title("HODL tickets total"));
    f.render_widget(hodl, halves[1]);
}

fn draw_tables(
    f: &mut Frame,
    state: &mut UiState,
    area: Rect,
    summary: Option<&TicketSummary>,
) {
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);
    let regular = summary.map_or(&[][..], |s| s.regular.as_slice());
    let hodl = summary.map_or(&[][..], |s| s.hodl.as_slice());

    let regular_table = ticket_table(
        "Regular tickets",
        "Sender",
        regular,
        state.focus == TableFocus::Regular,
    );
    f.render_stateful_widget(regular_table, halves[0], &mut state.regular_table);

    let hodl_table = ticket_table(
        "HODL tickets",
        "Address",
        hodl,
        state.focus == TableFocus::Hodl,
    );
    f.render_stateful_widget(hodl_table, halves[1], &mut state.hodl_table);
}

fn ticket_table<'a>(
    title: &str,
    key_header: &'a str,
    rows: &'a [(String, f64)],
    focused: bool,
) -> Table<'a> {
    let keys: Vec<Cow<'a, str>> = rows.iter().map(|(key, _)| sanitize_cell(key)).collect();
    let key_width = keys
        .iter()
        .map(|k| k.width())
        .max()
        .unwrap_or(0)
        .max(key_header.width())
        .min(MAX_ADDRESS_WIDTH) as u16;

    let body: Vec<Row<'a>> = keys
        .into_iter()
        .zip(rows)
        .map(|(key, (_, value))| {
            Row::new(vec![Cell::from(key), Cell::from(format_amount(*value))])
        })
        .collect();

    let border_style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };

    Table::new(body, [Constraint::Length(key_width), Constraint::Min(8)])
        .header(
            Row::new(vec![key_header, "Tickets"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title(format!("{title} ({})", rows.len())),
        )
        .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
}

fn draw_status(f: &mut Frame, area: Rect, status: &StatusLine) {
    let style = match status {
        StatusLine::Loading => Style::default(),
        StatusLine::Updated(_) => Style::default().fg(Color::Green),
        StatusLine::Failed { .. } => Style::default().fg(Color::Red),
    };
    let widget = Paragraph::new(status.to_string())
        .style(style)
        .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(widget, area);
}

/// Addresses come straight from the server; control characters would reach
/// the terminal as escape sequences, so they are replaced before display.
pub fn sanitize_cell(text: &str) -> Cow<'_, str> {
    if text.chars().any(char::is_control) {
        Cow::Owned(
            text.chars()
                .map(|c| if c.is_control() { '\u{FFFD}' } else { c })
                .collect(),
        )
    } else {
        Cow::Borrowed(text)
    }
}

/// Plain-text rendering of the board, used by `--once`.
pub fn render_plain(view: &DashboardView) -> String {
    let summary = view.summary.as_ref();
    let (regular_total, hodl_total) = totals_text(summary);
    let mut out = String::new();
    out.push_str(&format!("Regular tickets total: {regular_total}\n"));
    out.push_str(&format!("HODL tickets total: {hodl_total}\n"));
    plain_table(
        &mut out,
        "Regular tickets",
        summary.map_or(&[][..], |s| s.regular.as_slice()),
    );
    plain_table(
        &mut out,
        "HODL tickets",
        summary.map_or(&[][..], |s| s.hodl.as_slice()),
    );
    out.push('\n');
    out.push_str(&view.status.to_string());
    out
}

fn plain_table(out: &mut String, title: &str, rows: &[(String, f64)]) {
    out.push_str(&format!("\n{title} ({})\n", rows.len()));
    let keys: Vec<Cow<'_, str>> = rows.iter().map(|(key, _)| sanitize_cell(key)).collect();
    let width = keys.iter().map(|k| k.width()).max().unwrap_or(0);
    for (key, (_, value)) in keys.iter().zip(rows) {
        let pad = " ".repeat(width - key.width());
        out.push_str(&format!("  {key}{pad}  {}\n", format_amount(*value)));
    }
}
