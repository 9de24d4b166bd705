use std::io::{self, Stdout};

use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use fm_search::error::{AppError, Result};

use crate::app::App;
use crate::theme::ThemeColors;
use crate::ui;

fn terminal_error(action: &'static str) -> impl Fn(io::Error) -> AppError {
    move |e| AppError::Terminal(format!("{}: {}", action, e))
}

/// Raw-mode alternate screen owned for the lifetime of the app.
///
/// Mouse capture follows [`App::mouse_enabled`] on every draw, and the
/// terminal is put back on drop so an early `?` in the event loop leaves
/// a usable shell behind.
pub struct Tui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    mouse_captured: bool,
    restored: bool,
}

impl Tui {
    pub fn new(capture_mouse: bool) -> Result<Self> {
        let mut stdout = io::stdout();
        terminal::enable_raw_mode().map_err(terminal_error("enable raw mode"))?;
        execute!(stdout, EnterAlternateScreen).map_err(terminal_error("enter alternate screen"))?;
        if capture_mouse {
            execute!(stdout, EnableMouseCapture).map_err(terminal_error("capture mouse"))?;
        }
        let terminal = Terminal::new(CrosstermBackend::new(stdout))
            .map_err(terminal_error("create terminal"))?;
        tracing::debug!(capture_mouse, "terminal ready");
        Ok(Self {
            terminal,
            mouse_captured: capture_mouse,
            restored: false,
        })
    }

    /// Render one frame of `app`.
    pub fn draw(&mut self, app: &mut App, theme: &ThemeColors) -> Result<()> {
        self.capture_mouse(app.mouse_enabled)?;
        self.terminal
            .draw(|frame| ui::render(app, theme, frame))
            .map_err(terminal_error("draw"))?;
        Ok(())
    }

    fn capture_mouse(&mut self, wanted: bool) -> Result<()> {
        if wanted == self.mouse_captured {
            return Ok(());
        }
        let backend = self.terminal.backend_mut();
        if wanted {
            execute!(backend, EnableMouseCapture).map_err(terminal_error("capture mouse"))?;
        } else {
            execute!(backend, DisableMouseCapture).map_err(terminal_error("release mouse"))?;
        }
        self.mouse_captured = wanted;
        Ok(())
    }

    /// Leave the alternate screen. Safe to call more than once.
    pub fn restore(&mut self) -> Result<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        if self.mouse_captured {
            execute!(self.terminal.backend_mut(), DisableMouseCapture)
                .map_err(terminal_error("release mouse"))?;
        }
        terminal::disable_raw_mode().map_err(terminal_error("disable raw mode"))?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)
            .map_err(terminal_error("leave alternate screen"))?;
        self.terminal
            .show_cursor()
            .map_err(terminal_error("show cursor"))?;
        Ok(())
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            tracing::warn!(error = %e, "terminal not restored");
        }
    }
}

/// Put the terminal back before the default hook prints the panic.
pub fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let mut stdout = io::stdout();
        let _ = terminal::disable_raw_mode();
        let _ = execute!(stdout, DisableMouseCapture, LeaveAlternateScreen);
        tracing::error!(%panic_info, "panic");
        original_hook(panic_info);
    }));
}
