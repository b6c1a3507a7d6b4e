//! TUI layer using ratatui and crossterm
//!
//! Interactive revision browsing: move a cursor over the catalog, mark
//! revisions good or bad, sync a candidate into the workspace.

use crate::catalog::{Catalog, Status};
use crate::config::Config;
use crate::engine::{BisectEngine, Verdict};
use crate::p4::{Backend, QueryMode, RangeQuery};
use crate::sync::SyncCoordinator;
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io::{self, Stdout};

/// Application state
pub struct App {
    backend: Box<dyn Backend>,
    config: Config,
    query: RangeQuery,

    // Bisection state
    engine: BisectEngine,
    coordinator: SyncCoordinator,

    // UI state
    cursor: usize,
    message: Option<String>,
    show_help: bool,
}

impl App {
    pub fn new(
        backend: Box<dyn Backend>,
        config: Config,
        query: RangeQuery,
        engine: BisectEngine,
    ) -> Self {
        let cursor = engine.candidate();
        Self {
            backend,
            config,
            query,
            engine,
            coordinator: SyncCoordinator::new(),
            cursor,
            message: None,
            show_help: false,
        }
    }

    fn move_cursor(&mut self, delta: isize) {
        let newest = self.engine.count() - 1; // catalog is never empty once a session is live
        self.cursor = self.cursor.saturating_add_signed(delta).min(newest);
    }

    fn jump_to_candidate(&mut self) {
        self.cursor = self.engine.candidate();
    }

    fn mark_cursor(&mut self, verdict: Verdict) {
        let index = self.cursor;
        match self.engine.mark(index, verdict) {
            Ok(()) => {
                self.cursor = self.engine.candidate();
                self.message = match self.engine.culprit() {
                    Some(culprit) => Some(format!("Regression isolated at revision {}", culprit)),
                    None => Some(format!(
                        "Marked revision {} {}; next candidate is {}",
                        index,
                        verdict.as_str(),
                        self.engine.candidate()
                    )),
                };
            }
            Err(err) => self.message = Some(err.to_string()),
        }
    }

    fn sync_cursor(&mut self) {
        let index = self.cursor;
        let mut lines: Vec<String> = Vec::new();
        let mut sink = |line: &str| lines.push(line.to_string());

        let result = self.coordinator.sync_revision(
            self.backend.as_ref(),
            self.engine.catalog(),
            &self.query.path,
            index,
            &mut sink,
        );

        self.message = match result {
            Ok(()) => match lines.last() {
                Some(last) => Some(last.clone()),
                None => Some(format!("Workspace synced to revision {}", index)),
            },
            Err(err) => Some(format!("Sync failed: {}", err)),
        };
    }

    fn switch_mode(&mut self) {
        let mode = match self.query.mode {
            QueryMode::Labels => QueryMode::Changes,
            QueryMode::Changes => QueryMode::Labels,
        };

        match self.restart(mode) {
            Ok(()) => {
                self.message = Some(format!(
                    "Mode: {} ({} revisions)",
                    mode.as_str(),
                    self.engine.count()
                ));
            }
            Err(err) => self.message = Some(format!("Mode switch failed: {}", err)),
        }
    }

    /// Refetch the catalog in the given mode and open a fresh window.
    /// The running session is replaced only when the whole rebuild succeeds.
    fn restart(&mut self, mode: QueryMode) -> Result<()> {
        let mut query = self.query.clone();
        query.mode = mode;

        let catalog = Catalog::fetch(self.backend.as_ref(), &query, self.config.undated)?;
        let engine = BisectEngine::start(catalog)?;

        self.engine = engine;
        self.query = query;
        self.coordinator.reset();
        self.cursor = self.engine.candidate();
        Ok(())
    }

    fn handle_input(&mut self, key: KeyEvent) -> Result<bool> {
        // Clear message on any input
        self.message = None;

        match key.code {
            KeyCode::Char('q') => return Ok(true), // Quit
            KeyCode::Char('?') => self.show_help = !self.show_help,

            // Navigation
            KeyCode::Char('j') | KeyCode::Down => self.move_cursor(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_cursor(-1),
            KeyCode::Char('c') => self.jump_to_candidate(),

            // Verdicts
            KeyCode::Char('g') => self.mark_cursor(Verdict::Good),
            KeyCode::Char('b') => self.mark_cursor(Verdict::Bad),

            // Backend actions
            KeyCode::Char('s') => self.sync_cursor(),
            KeyCode::Char('m') => self.switch_mode(),

            _ => {}
        }

        Ok(false)
    }
}

/// Runs the TUI application
pub fn run(
    backend: Box<dyn Backend>,
    config: Config,
    query: RangeQuery,
    engine: BisectEngine,
) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let term_backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(term_backend)?;

    let mut app = App::new(backend, config, query, engine);

    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;

    result
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if app.handle_input(key)? {
                return Ok(());
            }
        }
    }
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Revision list
            Constraint::Length(3), // Status bar
        ])
        .split(f.area());

    // Header
    render_header(f, app, chunks[0]);

    // Revision list
    render_revisions(f, app, chunks[1]);

    // Status bar
    render_status(f, app, chunks[2]);

    // Help overlay
    if app.show_help {
        render_help(f);
    }
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let catalog = app.engine.catalog();
    let mut info = format!(
        " {} @{},@{} [{}] {} revisions, window {}..{}",
        app.query.path,
        app.query.good,
        app.query.bad,
        app.query.mode.as_str(),
        catalog.count(),
        app.engine.last_good(),
        app.engine.first_bad()
    );
    if catalog.undated_count() > 0 {
        info.push_str(&format!(" ({} undated)", catalog.undated_count()));
    }

    let header = Paragraph::new(info)
        .style(Style::default().fg(Color::Cyan))
        .block(Block::default().borders(Borders::ALL).title(" p4bisect "));

    f.render_widget(header, area);
}

fn render_revisions(f: &mut Frame, app: &App, area: Rect) {
    let catalog = app.engine.catalog();
    let candidate = app.engine.candidate();
    let synced = app.coordinator.synced_index();
    let visible_height = (area.height as usize).saturating_sub(2); // Account for borders

    // Calculate scroll offset
    let scroll_offset = if app.cursor >= visible_height {
        app.cursor - visible_height + 1
    } else {
        0
    };

    let items: Vec<ListItem> = (0..catalog.count())
        .skip(scroll_offset)
        .take(visible_height)
        .map(|idx| {
            let content = catalog.formatted_line(idx, synced).unwrap_or_default();

            let style = match catalog.status(idx) {
                Some(Status::Good) => Style::default().fg(Color::Green),
                Some(Status::Bad) => Style::default().fg(Color::Red),
                _ => Style::default(),
            };

            // Highlight the candidate, then the cursor on top
            let style = if idx == candidate {
                Style::default()
                    .fg(Color::White)
                    .bg(Color::Green)
                    .add_modifier(Modifier::BOLD)
            } else {
                style
            };
            let style = if idx == app.cursor {
                style.add_modifier(Modifier::REVERSED)
            } else {
                style
            };

            ListItem::new(Line::from(vec![Span::styled(content, style)]))
        })
        .collect();

    let list = List::new(items).block(Block::default().borders(Borders::ALL));

    f.render_widget(list, area);
}

fn render_status(f: &mut Frame, app: &App, area: Rect) {
    let content = if let Some(msg) = &app.message {
        format!(" {}", msg)
    } else if let Some(culprit) = app.engine.culprit() {
        let descriptor = app
            .engine
            .catalog()
            .record(culprit)
            .map(|record| record.descriptor.as_str())
            .unwrap_or("<unknown>");
        format!(" Regression isolated at: {}", descriptor)
    } else {
        " j/k: move | c: candidate | g: good | b: bad | s: sync | m: mode | ?: help | q: quit"
            .to_string()
    };

    let status = Paragraph::new(content)
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));

    f.render_widget(status, area);
}

fn render_help(f: &mut Frame) {
    let area = centered_rect(60, 70, f.area());

    let help_text = vec![
        "",
        "  Navigation:",
        "    j / ↓     Move down",
        "    k / ↑     Move up",
        "    c         Jump to the current candidate",
        "",
        "  Verdicts:",
        "    g         Mark the selected revision good",
        "    b         Mark the selected revision bad",
        "",
        "  Workspace:",
        "    s         Sync the selected revision",
        "    m         Switch between labels and changes",
        "",
        "  Other:",
        "    ?         Toggle this help",
        "    q         Quit",
        "",
    ];

    let help = Paragraph::new(help_text.join("\n"))
        .style(Style::default())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Help ")
                .style(Style::default().bg(Color::DarkGray)),
        )
        .wrap(Wrap { trim: false });

    f.render_widget(Clear, area);
    f.render_widget(help, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
