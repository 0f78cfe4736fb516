use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::path::Path;
use std::time::Duration;

use crate::config::Config;
use crate::ledger::{format_currency, Confirmation};
use crate::offline::AgentHandle;
use crate::ui::app::{App, InputMode};
use crate::ui::commands;
use crate::ui::util::{is_amount_char, scroll_down, scroll_to_bottom, scroll_to_top, scroll_up};

const TICK: Duration = Duration::from_millis(250);

pub(crate) fn as_tui(config: &Config, db_path: &Path) -> Result<()> {
    let ledger = super::open_ledger(config, db_path, true);
    let agent = if config.cache.enabled {
        match AgentHandle::spawn(config.cache.clone(), db_path.to_path_buf(), 1) {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "offline cache not started");
                None
            }
        }
    } else {
        None
    };
    let mut app = App::new(ledger, agent);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(ref e) = result {
        eprintln!("Error: {e:?}");
    }

    result
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    while app.running {
        terminal.draw(|f| {
            // title + form + status + command bars, table borders and header
            let content_height = f.area().height.saturating_sub(9) as usize;
            app.visible_rows = content_height.max(1);
            crate::ui::render::render(f, app);
        })?;

        app.poll_background();
        if !event::poll(TICK)? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if app.show_help {
                app.show_help = false;
                continue;
            }
            match app.input_mode {
                InputMode::Normal => handle_normal_input(key, app),
                InputMode::Editing => handle_editing_input(key, app),
                InputMode::Command => handle_command_input(key, app),
                InputMode::Confirm => handle_confirm_input(key, app),
            }
        }
    }
    Ok(())
}

// ── Input handlers ───────────────────────────────────────────

fn handle_normal_input(key: KeyEvent, app: &mut App) {
    let len = app.ledger.items().len();
    let page = app.visible_rows.max(1);
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('c')
            if key.modifiers.contains(KeyModifiers::CONTROL) =>
        {
            app.running = false;
        }
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            for _ in 0..page / 2 {
                scroll_down(&mut app.item_index, &mut app.item_scroll, len, page);
            }
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            for _ in 0..page / 2 {
                scroll_up(&mut app.item_index, &mut app.item_scroll);
            }
        }
        KeyCode::Char('q') => app.running = false,
        KeyCode::Char(':') => {
            app.input_mode = InputMode::Command;
            app.command_input.clear();
        }
        KeyCode::Char('a') | KeyCode::Char('i') => {
            app.input_mode = InputMode::Editing;
            app.status_message.clear();
        }
        KeyCode::Char('j') | KeyCode::Down => {
            scroll_down(&mut app.item_index, &mut app.item_scroll, len, page);
        }
        KeyCode::Char('k') | KeyCode::Up => scroll_up(&mut app.item_index, &mut app.item_scroll),
        KeyCode::Char('g') => scroll_to_top(&mut app.item_index, &mut app.item_scroll),
        KeyCode::Char('G') => {
            scroll_to_bottom(&mut app.item_index, &mut app.item_scroll, len, page);
        }
        KeyCode::Tab => {
            app.ledger.cycle_category(1);
        }
        KeyCode::BackTab => {
            app.ledger.cycle_category(-1);
        }
        KeyCode::Char('d') | KeyCode::Delete => run_command("delete", app),
        KeyCode::Char('R') => app.request_reset(),
        KeyCode::Char('?') => app.show_help = true,
        KeyCode::Esc => app.status_message.clear(),
        _ => {}
    }
}

fn handle_editing_input(key: KeyEvent, app: &mut App) {
    match key.code {
        KeyCode::Enter => {
            if app.submit_item() {
                let msg = app
                    .ledger
                    .items()
                    .first()
                    .map(|item| format!("Added {} {}", format_currency(item.value), item.category))
                    .unwrap_or_default();
                app.set_status(msg);
            } else {
                app.set_status("Enter a number, e.g. 12.50 or -4");
            }
        }
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Tab => {
            app.ledger.cycle_category(1);
        }
        KeyCode::BackTab => {
            app.ledger.cycle_category(-1);
        }
        KeyCode::Backspace => {
            let mut value = app.ledger.state().new_item_value.clone();
            value.pop();
            app.ledger.set_new_item_value(value);
        }
        KeyCode::Char(c) if is_amount_char(c) => {
            let mut value = app.ledger.state().new_item_value.clone();
            value.push(c);
            app.ledger.set_new_item_value(value);
        }
        _ => {}
    }
}

fn handle_command_input(key: KeyEvent, app: &mut App) {
    match key.code {
        KeyCode::Enter => {
            let input = app.command_input.clone();
            app.input_mode = InputMode::Normal;
            app.command_input.clear();
            run_command(&input, app);
        }
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
            app.command_input.clear();
        }
        KeyCode::Backspace => {
            app.command_input.pop();
            if app.command_input.is_empty() {
                app.input_mode = InputMode::Normal;
            }
        }
        KeyCode::Char(c) => {
            app.command_input.push(c);
        }
        _ => {}
    }
}

fn handle_confirm_input(key: KeyEvent, app: &mut App) {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => app.resolve_pending(Confirmation::Confirmed),
        // Any other key = cancel
        _ => app.resolve_pending(Confirmation::Cancelled),
    }
}

fn run_command(input: &str, app: &mut App) {
    if let Err(e) = commands::handle_command(input, app) {
        tracing::warn!(command = input, error = %format!("{e:#}"), "command failed");
        app.set_status(format!("Error: {e:#}"));
    }
}
