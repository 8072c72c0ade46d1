use std::io::{self, IsTerminal, Write};

use crossterm::{
    cursor::MoveTo,
    queue,
    style::{Attribute, SetAttribute},
    terminal::{Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};

/// Runs the menu on the alternate screen and puts the terminal back when dropped.
#[derive(Debug)]
pub struct TerminalGuard {
    alternate: bool,
}

impl TerminalGuard {
    pub fn enter() -> Self {
        let alternate = cfg!(unix) && io::stdout().is_terminal();

        if alternate {
            let mut stdout = io::stdout();
            if let Err(e) = enter_alternate(&mut stdout).and_then(|_| stdout.flush()) {
                tracing::debug!("Could not switch to the alternate screen: {}", e);
            }
        }

        Self { alternate }
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let mut stdout = io::stdout();
        let _ = leave(&mut stdout, self.alternate).and_then(|_| stdout.flush());
    }
}

fn enter_alternate(out: &mut impl Write) -> io::Result<()> {
    queue!(out, EnterAlternateScreen, MoveTo(0, 0))
}

fn leave(out: &mut impl Write, alternate: bool) -> io::Result<()> {
    queue!(out, SetAttribute(Attribute::Reset))?;
    if alternate {
        queue!(out, LeaveAlternateScreen)?;
    }
    Ok(())
}

fn clear(out: &mut impl Write) -> io::Result<()> {
    queue!(out, Clear(ClearType::All), MoveTo(0, 0))
}

pub fn clear_screen() {
    let mut stdout = io::stdout();
    if stdout.is_terminal() {
        let _ = clear(&mut stdout).and_then(|_| stdout.flush());
    }
}
