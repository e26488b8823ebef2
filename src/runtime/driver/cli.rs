use std::io::{self, Write};
use std::time::Duration;

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent};
use crossterm::execute;
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use thiserror::Error;

use crate::error::ShellError;
use crate::runtime::{ShellEvent, ShellRuntime};

pub type DriverResult<T> = std::result::Result<T, CliDriverError>;

#[derive(Debug, Error)]
pub enum CliDriverError {
    #[error("shell error: {0}")]
    Shell(#[from] ShellError),
    #[error("terminal error: {0}")]
    Terminal(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// What a keystroke asks the driver to do. Separated from the event loop so
/// the mapping stays testable without a terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverAction {
    /// Forward a shell event as-is.
    Forward(ForwardEvent),
    /// Click the nth mobile rail button (0-based).
    RailClick(usize),
    /// Click the mobile close button.
    CloseClick,
    Exit,
}

/// Keyboard-reachable shell events. `Click` needs a node lookup and is
/// resolved by the driver, not the mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardEvent {
    ShowMain,
    HideMain,
}

/// Digits 1-9 press rail buttons, `x` presses close, `m`/`h` toggle the
/// main pane, `q` or Esc quits.
pub fn map_key(code: KeyCode) -> Option<DriverAction> {
    match code {
        KeyCode::Char(c @ '1'..='9') => {
            Some(DriverAction::RailClick(c as usize - '1' as usize))
        }
        KeyCode::Char('x') => Some(DriverAction::CloseClick),
        KeyCode::Char('m') => Some(DriverAction::Forward(ForwardEvent::ShowMain)),
        KeyCode::Char('h') => Some(DriverAction::Forward(ForwardEvent::HideMain)),
        KeyCode::Char('q') | KeyCode::Esc => Some(DriverAction::Exit),
        _ => None,
    }
}

/// Minimal terminal driver that owns a `ShellRuntime` and manages raw mode +
/// alternate screen transitions. After every handled event it redraws the
/// document outline so transitions are visible as tree changes.
pub struct CliDriver {
    runtime: ShellRuntime,
}

impl CliDriver {
    pub fn new(runtime: ShellRuntime) -> Self {
        Self { runtime }
    }

    pub fn run(mut self) -> DriverResult<()> {
        let mut stdout = io::stdout();
        self.enter(&mut stdout)?;
        let result = self.run_inner(&mut stdout);
        self.exit(&mut stdout);
        result
    }

    fn run_inner(&mut self, stdout: &mut impl Write) -> DriverResult<()> {
        let (width, _) = terminal::size()?;
        self.runtime.initialize_layout(u32::from(width) * 10);
        self.redraw(stdout)?;
        loop {
            if !event::poll(Duration::from_millis(200))? {
                self.runtime.handle_event(ShellEvent::Tick);
                continue;
            }
            match event::read()? {
                Event::Resize(width, _) => {
                    // Terminal columns stand in for css pixels; scale so a
                    // typical 80-column window can cross the breakpoint.
                    self.runtime.handle_event(ShellEvent::Viewport {
                        width: u32::from(width) * 10,
                    });
                }
                Event::Key(KeyEvent { code, .. }) => match map_key(code) {
                    Some(DriverAction::Exit) => break,
                    Some(action) => self.apply(action),
                    None => continue,
                },
                _ => continue,
            }
            self.redraw(stdout)?;
        }
        Ok(())
    }

    fn apply(&mut self, action: DriverAction) {
        match action {
            DriverAction::Forward(ForwardEvent::ShowMain) => {
                self.runtime.handle_event(ShellEvent::ShowMain);
            }
            DriverAction::Forward(ForwardEvent::HideMain) => {
                self.runtime.handle_event(ShellEvent::HideMain);
            }
            DriverAction::RailClick(index) => {
                if let Some(target) = self.runtime.rail_button(index) {
                    self.runtime.handle_event(ShellEvent::Click { target });
                }
            }
            DriverAction::CloseClick => {
                if let Some(target) = self.runtime.close_button() {
                    self.runtime.handle_event(ShellEvent::Click { target });
                }
            }
            DriverAction::Exit => {}
        }
    }

    fn redraw(&mut self, stdout: &mut impl Write) -> DriverResult<()> {
        execute!(stdout, Clear(ClearType::All), MoveTo(0, 0))?;
        let outline = {
            let document = self.runtime.document();
            let doc = document
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            doc.snapshot(doc.body())
        };
        for line in outline.lines() {
            write!(stdout, "{line}\r\n")?;
        }
        write!(
            stdout,
            "\r\n[{:?}] 1-9 tabs  x close  m/h main  q quit\r\n",
            self.runtime.state()
        )?;
        stdout.flush()?;
        Ok(())
    }

    fn enter(&self, stdout: &mut impl Write) -> DriverResult<()> {
        terminal::enable_raw_mode().map_err(|err| CliDriverError::Terminal(err.to_string()))?;
        execute!(stdout, EnterAlternateScreen, Hide, Clear(ClearType::All))?;
        Ok(())
    }

    fn exit(&self, stdout: &mut impl Write) {
        execute!(stdout, Show, LeaveAlternateScreen).ok();
        terminal::disable_raw_mode().ok();
    }
}
