//! Full-screen chart for the `watch` and `history` commands.

mod ui;

use std::io::{self, Stdout};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use netusage_core::{ChartFrame, DeviceReading, Renderer};
use ratatui::Terminal;
use ratatui::backend::{Backend, CrosstermBackend};
use tokio_util::sync::CancellationToken;

pub type StdoutTerminal = Terminal<CrosstermBackend<Stdout>>;

const KEY_POLL: Duration = Duration::from_millis(100);

/// Restores the terminal when dropped.
pub struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = std::panic::take_hook();
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, crossterm::cursor::Show);
    }
}

/// Switch to raw mode on the alternate screen.
pub fn enter() -> io::Result<(StdoutTerminal, TerminalGuard)> {
    enable_raw_mode()?;
    let guard = TerminalGuard;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;

    // Restore the terminal before printing a panic.
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, crossterm::cursor::Show);
        original_hook(info);
    }));

    let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
    Ok((terminal, guard))
}

fn is_quit(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => true,
        // raw mode swallows SIGINT
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

/// Cancel `cancel` on `q`, Esc or Ctrl+C. The task ends once `cancel` fires.
pub fn spawn_quit_listener(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        while !cancel.is_cancelled() {
            match event::poll(KEY_POLL) {
                Ok(true) => match event::read() {
                    Ok(Event::Key(key)) if is_quit(&key) => cancel.cancel(),
                    Ok(_) => {}
                    Err(e) => {
                        log::debug!("reading terminal event: {e}");
                        break;
                    }
                },
                Ok(false) => {}
                Err(e) => {
                    log::debug!("polling terminal events: {e}");
                    break;
                }
            }
        }
    })
}

/// What the chart screen shows.
#[derive(Debug, Default)]
pub struct ChartView {
    pub title: String,
    pub frame: ChartFrame,
    pub devices: Vec<DeviceReading>,
    /// Replaces the rate summary in the status bar.
    pub notice: Option<String>,
}

/// [`Renderer`] drawing the combined, up and down traces on a ratatui terminal.
pub struct ChartRenderer<B: Backend> {
    terminal: Terminal<B>,
    view: ChartView,
    full_draws: u64,
    draws: u64,
}

impl<B: Backend> ChartRenderer<B> {
    pub fn new(terminal: Terminal<B>, title: impl Into<String>) -> Self {
        Self {
            terminal,
            view: ChartView {
                title: title.into(),
                ..ChartView::default()
            },
            full_draws: 0,
            draws: 0,
        }
    }

    pub fn set_devices(&mut self, devices: Vec<DeviceReading>) {
        self.view.devices = devices;
    }

    pub fn set_notice(&mut self, notice: Option<String>) {
        self.view.notice = notice;
    }

    /// Draw the current view again.
    pub fn redraw(&mut self) {
        let view = &self.view;
        match self.terminal.draw(|f| ui::draw(f, view)) {
            Ok(_) => self.draws += 1,
            Err(e) => log::debug!("chart draw failed: {e}"),
        }
    }

    #[cfg(test)]
    pub fn view(&self) -> &ChartView {
        &self.view
    }

    #[cfg(test)]
    pub fn counts(&self) -> (u64, u64) {
        (self.full_draws, self.draws)
    }
}

#[cfg(test)]
impl ChartRenderer<ratatui::backend::TestBackend> {
    /// Visible text, one line per terminal row.
    pub fn screen(&self) -> String {
        let buffer = self.terminal.backend().buffer();
        let width = buffer.area.width as usize;
        buffer
            .content()
            .chunks(width)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl<B: Backend> Renderer for ChartRenderer<B> {
    fn replace_all(&mut self, frame: &ChartFrame) {
        self.view.frame = frame.clone();
        if let Err(e) = self.terminal.clear() {
            log::debug!("clearing terminal: {e}");
        }
        self.full_draws += 1;
        self.redraw();
    }

    fn update(&mut self, frame: &ChartFrame) {
        self.view.frame = frame.clone();
        self.redraw();
    }
}
