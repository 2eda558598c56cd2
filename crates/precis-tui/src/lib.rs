// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use precis_app::{AppCommand, AppState, AttemptStart, FormCommand, FormEvent, RequestPhase};
use precis_llm::{GenerateRequest, TransportError};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use serde_json::Value;
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

const POLL_INTERVAL: Duration = Duration::from_millis(120);
const STATUS_TTL: Duration = Duration::from_secs(4);
const CURSOR: &str = "█";
const PENDING_TEXT: &str = "summarizing…";
const EMPTY_RESULT_TEXT: &str = "press ctrl+s to summarize the text above";

pub trait AppRuntime {
    /// Short description of where requests go, shown in the title bar.
    fn provider_label(&self) -> String;
    fn generate(&mut self, request: &GenerateRequest) -> Result<Value, TransportError>;
    fn spawn_generate(
        &mut self,
        request_id: u64,
        request: GenerateRequest,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let response = self.generate(&request);
        tx.send(InternalEvent::Settled {
            request_id,
            response,
        })
        .map_err(|_| anyhow::anyhow!("summary event channel closed"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus {
        token: u64,
    },
    Settled {
        request_id: u64,
        response: Result<Value, TransportError>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct ViewData {
    provider_label: String,
    in_flight: Option<u64>,
    next_request_id: u64,
    status_token: u64,
}

enum TerminalInput {
    Key(KeyEvent),
    Paste(String),
}

pub fn run_app<R: AppRuntime>(state: &mut AppState, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen, EnableBracketedPaste)
        .context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData {
        provider_label: runtime.provider_label(),
        ..ViewData::default()
    };
    let (internal_tx, internal_rx) = mpsc::channel();
    info!(provider = %view_data.provider_label, "summary form opened");

    let mut result = Ok(());
    loop {
        process_internal_events(state, &mut view_data, &internal_tx, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        match next_input() {
            Ok(Some(TerminalInput::Key(key))) => {
                if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                    break;
                }
            }
            Ok(Some(TerminalInput::Paste(text))) => {
                handle_paste(state, &text);
            }
            Ok(None) => {}
            Err(error) => {
                result = Err(error);
                break;
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(
        io::stdout(),
        DisableBracketedPaste,
        terminal::LeaveAlternateScreen
    )
    .context("leave alternate screen")?;
    result
}

fn next_input() -> Result<Option<TerminalInput>> {
    if !event::poll(POLL_INTERVAL).context("poll event")? {
        return Ok(None);
    }
    let input = match event::read().context("read event")? {
        Event::Key(key) if key.kind == KeyEventKind::Press => Some(TerminalInput::Key(key)),
        Event::Paste(text) => Some(TerminalInput::Paste(text)),
        _ => None,
    };
    Ok(input)
}

fn process_internal_events(
    state: &mut AppState,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::Settled {
                request_id,
                response,
            } => handle_settled(state, view_data, tx, request_id, response),
        }
    }
}

fn handle_settled(
    state: &mut AppState,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    request_id: u64,
    response: Result<Value, TransportError>,
) {
    if view_data.in_flight != Some(request_id) {
        debug!(request_id, "ignoring result for a request that is not in flight");
        return;
    }
    view_data.in_flight = None;

    let events = state.form.settle(response);
    let succeeded = events
        .iter()
        .any(|event| matches!(event, FormEvent::SummaryReady(_)));
    emit_status(
        state,
        view_data,
        tx,
        if succeeded {
            "summary ready"
        } else {
            "summary failed"
        },
    );
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(STATUS_TTL);
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.dispatch(AppCommand::SetStatus(message.into()));
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => return true,
        KeyCode::Char('q' | 'c') if ctrl => return true,
        KeyCode::Char('s') if ctrl => {
            submit_summarization(state, runtime, view_data, internal_tx);
        }
        KeyCode::Char('u') if ctrl => {
            state.dispatch(AppCommand::Edit(FormCommand::ClearInput));
        }
        KeyCode::Enter => {
            state.dispatch(AppCommand::Edit(FormCommand::Newline));
        }
        KeyCode::Backspace => {
            state.dispatch(AppCommand::Edit(FormCommand::Backspace));
        }
        KeyCode::Char(ch) if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT => {
            state.dispatch(AppCommand::Edit(FormCommand::Insert(ch)));
        }
        _ => {}
    }
    false
}

fn handle_paste(state: &mut AppState, text: &str) {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    state.dispatch(AppCommand::Edit(FormCommand::InsertText(normalized)));
}

fn submit_summarization<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if state.form.is_loading() {
        emit_status(state, view_data, internal_tx, "summary already in progress");
        return;
    }
    if !state.form.can_submit() {
        emit_status(
            state,
            view_data,
            internal_tx,
            "type or paste some text first",
        );
        return;
    }

    let (start, _) = state.form.begin_attempt();
    let AttemptStart::Ready(request) = start else {
        return;
    };

    let request_id = next_request_id(view_data);
    view_data.in_flight = Some(request_id);
    info!(request_id, "summary requested");

    if let Err(error) = runtime.spawn_generate(request_id, request, internal_tx.clone()) {
        view_data.in_flight = None;
        state
            .form
            .settle(Err(TransportError::new(format!("{error:#}"))));
        emit_status(state, view_data, internal_tx, "summary failed");
    }
}

fn next_request_id(view_data: &mut ViewData) -> u64 {
    view_data.next_request_id = view_data.next_request_id.saturating_add(1);
    view_data.next_request_id
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let error = state.form.error();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Percentage(40),
            Constraint::Length(if error.is_some() { 4 } else { 0 }),
            Constraint::Min(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let title = Paragraph::new(view_data.provider_label.clone()).block(
        Block::default()
            .title("precis")
            .borders(Borders::ALL)
            .style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(title, layout[0]);

    let input_area = layout[1];
    let input_text = render_input_text(&state.form);
    let scroll = input_scroll_offset(
        &input_text,
        input_area.width.saturating_sub(2),
        input_area.height.saturating_sub(2),
    );
    let input = Paragraph::new(input_text)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0))
        .block(
            Block::default()
                .title(input_title(&state.form))
                .borders(Borders::ALL),
        );
    frame.render_widget(input, input_area);

    if let Some(error) = error {
        let widget = Paragraph::new(error.to_owned())
            .style(Style::default().fg(Color::Red))
            .wrap(Wrap { trim: false })
            .block(Block::default().title("error").borders(Borders::ALL));
        frame.render_widget(widget, layout[2]);
    }

    let mut result_style = Style::default();
    if state.form.summary().is_none() {
        result_style = result_style.add_modifier(Modifier::DIM);
    }
    let result = Paragraph::new(render_result_text(&state.form))
        .style(result_style)
        .wrap(Wrap { trim: false })
        .block(Block::default().title("summary").borders(Borders::ALL));
    frame.render_widget(result, layout[3]);

    let status = Paragraph::new(status_text(state))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, layout[4]);
}

fn input_title(form: &precis_app::SummaryForm) -> String {
    format!("text ({} chars)", form.input().chars().count())
}

fn render_input_text(form: &precis_app::SummaryForm) -> String {
    format!("{}{CURSOR}", form.input())
}

fn render_result_text(form: &precis_app::SummaryForm) -> String {
    if form.is_loading() {
        return PENDING_TEXT.to_owned();
    }
    form.summary().unwrap_or(EMPTY_RESULT_TEXT).to_owned()
}

/// Rows to scroll so the last wrapped line of `text` stays visible.
fn input_scroll_offset(text: &str, width: u16, height: u16) -> u16 {
    if width == 0 {
        return 0;
    }
    let width = usize::from(width);
    let rows: usize = text
        .split('\n')
        .map(|line| line.chars().count().div_ceil(width).max(1))
        .sum();
    u16::try_from(rows.saturating_sub(usize::from(height))).unwrap_or(u16::MAX)
}

fn phase_label(phase: RequestPhase) -> &'static str {
    match phase {
        RequestPhase::Idle => "READY",
        RequestPhase::Pending => "PENDING",
        RequestPhase::Settled => "DONE",
    }
}

fn status_text(state: &AppState) -> String {
    let phase = phase_label(state.form.phase());
    let trigger = if state.form.can_submit() {
        "ctrl+s summarize"
    } else {
        "ctrl+s summarize (disabled)"
    };
    let keys = format!("{trigger} | enter newline | ctrl+u clear | esc quit");
    match &state.status_line {
        Some(status) => format!("{phase} | {status} | {keys}"),
        None => format!("{phase} | {keys}"),
    }
}
