use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use pricebook::{FormField, PriceApi, QuoteForm, QuoteOutcome};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};
use std::io;

pub struct App<'a> {
    pub form: QuoteForm,
    pub state: TableState,
    api: &'a dyn PriceApi,
    source: String,
}

impl<'a> App<'a> {
    pub fn new(form: QuoteForm, api: &'a dyn PriceApi, source: String) -> Self {
        let mut state = TableState::default();
        state.select(Some(0));

        Self {
            form,
            state,
            api,
            source,
        }
    }

    fn sync_selection(&mut self) {
        let idx = FormField::ALL
            .iter()
            .position(|field| *field == self.form.focus)
            .unwrap_or(0);
        self.state.select(Some(idx));
    }

    pub fn next_field(&mut self) {
        self.form.focus_next();
        self.sync_selection();
    }

    pub fn previous_field(&mut self) {
        self.form.focus_previous();
        self.sync_selection();
    }

    pub fn submit(&mut self) {
        self.form.submit(self.api);
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res?;
    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Enter => app.submit(),
                KeyCode::Down | KeyCode::Char('j') | KeyCode::Tab => app.next_field(),
                KeyCode::Up | KeyCode::Char('k') | KeyCode::BackTab => app.previous_field(),
                KeyCode::Right | KeyCode::Char('l') => app.form.cycle_focused(true),
                KeyCode::Left | KeyCode::Char('h') => app.form.cycle_focused(false),
                KeyCode::Char(' ') => app.form.toggle_backfill(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Form + result
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    let content_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(55), // Form
            Constraint::Percentage(45), // Result
        ])
        .split(chunks[1]);

    render_form(f, content_chunks[0], app);
    render_result(f, content_chunks[1], app);
    render_status_bar(f, chunks[2]);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let spans = vec![
        Span::styled(
            "Pricebook Quote",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("Regions: {}", app.form.options().regions.len()),
            Style::default().fg(Color::White),
        ),
        Span::raw("  |  "),
        Span::styled(app.source.clone(), Style::default().fg(Color::DarkGray)),
    ];

    let header = Paragraph::new(vec![Line::from(spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_form(f: &mut Frame, area: Rect, app: &mut App) {
    let rows = FormField::ALL.iter().map(|field| {
        let disabled = *field == FormField::WithBackfill && !app.form.backfill_enabled();
        let value_style = if disabled {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default().fg(Color::White)
        };

        let value = if disabled {
            "n/a (yearly only)".to_string()
        } else {
            format!("< {} >", app.form.value(*field))
        };

        Row::new(vec![
            Cell::from(field.label()).style(Style::default().fg(Color::Cyan)),
            Cell::from(value).style(value_style),
        ])
        .height(1)
    });

    let table = Table::new(rows, [Constraint::Length(16), Constraint::Min(20)])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(" Selection "),
        )
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_result(f: &mut Frame, area: Rect, app: &App) {
    let lines = match &app.form.outcome {
        None => vec![Line::from(Span::styled(
            "Press Enter to get a quote",
            Style::default().fg(Color::DarkGray),
        ))],
        Some(QuoteOutcome::Quoted(quote)) => {
            let b = &quote.breakdown;
            vec![
                Line::from(Span::styled(
                    format!("{} {:.2}", quote.currency, quote.amount),
                    Style::default()
                        .fg(Color::Green)
                        .add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                Line::from(format!("{} / {}", b.region, b.country)),
                Line::from(format!("Supplier: {}", b.supplier)),
                Line::from(format!("Payment terms: {}", b.payment_terms)),
                Line::from(format!("Service level: {}", b.service_level)),
                Line::from(format!(
                    "Engagement: {}{}",
                    b.engagement_type,
                    if b.with_backfill { " (with backfill)" } else { "" }
                )),
            ]
        }
        Some(QuoteOutcome::Failed(message)) => vec![Line::from(Span::styled(
            message.clone(),
            Style::default().fg(Color::Red),
        ))],
    };

    let result = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title(" Quote "));

    f.render_widget(result, area);
}

fn render_status_bar(f: &mut Frame, area: Rect) {
    let mut spans = Vec::new();
    for (key, action) in [
        ("↑/↓", " Field | "),
        ("←/→", " Change | "),
        ("Space", " Backfill | "),
        ("Enter", " Quote | "),
        ("q", " Quit"),
    ] {
        spans.push(Span::styled(key, Style::default().fg(Color::Yellow)));
        spans.push(Span::raw(action));
    }

    let status = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL));

    f.render_widget(status, area);
}
