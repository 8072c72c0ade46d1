use std::fmt::Display;

use anyhow::Result;
use colored::Colorize;
use inquire::{Confirm, InquireError, Select, Text, validator::Validation};

/// Ctrl+C at any prompt.
#[derive(Debug, thiserror::Error)]
#[error("Interrupted")]
pub struct Interrupted;

/// `Ok(None)` when the prompt was dismissed with ESC.
pub fn answer<T>(result: Result<T, InquireError>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(InquireError::OperationCanceled) => Ok(None),
        Err(InquireError::OperationInterrupted) => Err(Interrupted.into()),
        Err(e) => Err(e.into()),
    }
}

pub fn select<T: Display>(message: &str, options: Vec<T>) -> Result<Option<T>> {
    if options.is_empty() {
        return Ok(None);
    }

    answer(Select::new(message, options).with_page_size(12).prompt())
}

pub fn select_from<T: Display + PartialEq>(
    message: &str,
    options: Vec<T>,
    current: &T,
) -> Result<Option<T>> {
    let cursor = options.iter().position(|o| o == current).unwrap_or(0);

    answer(
        Select::new(message, options)
            .with_starting_cursor(cursor)
            .with_page_size(12)
            .prompt(),
    )
}

/// ESC counts as "no".
pub fn confirm(message: &str, default: bool) -> Result<bool> {
    Ok(answer(Confirm::new(message).with_default(default).prompt())?.unwrap_or(false))
}

/// Free text checked by `check`, which returns the message to show for bad input.
pub fn text_with(
    message: &str,
    default: Option<&str>,
    check: impl Fn(&str) -> Result<(), String> + Clone + 'static,
) -> Result<Option<String>> {
    let mut prompt = Text::new(message).with_validator(move |input: &str| {
        Ok(match check(input.trim()) {
            Ok(()) => Validation::Valid,
            Err(reason) => Validation::Invalid(reason.into()),
        })
    });
    if let Some(default) = default {
        prompt = prompt.with_default(default);
    }

    Ok(answer(prompt.prompt())?.map(|s| s.trim().to_string()))
}

pub fn pause() -> Result<()> {
    answer(Text::new("Press Enter to continue...").prompt())?;
    Ok(())
}

pub fn title(text: &str) {
    println!("\n{}\n", text.cyan().bold());
}

pub fn success(text: &str) {
    println!("{} {}", "✔".green().bold(), text.green());
}

pub fn warn(text: &str) {
    println!("{} {}", "!".yellow().bold(), text.yellow());
}

pub fn hint(text: &str) {
    println!("  {}", text.dimmed());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn esc_and_ctrl_c_are_distinguished() {
        assert_eq!(answer(Ok::<_, InquireError>(3)).unwrap(), Some(3));
        assert_eq!(
            answer::<u8>(Err(InquireError::OperationCanceled)).unwrap(),
            None
        );

        let err = answer::<u8>(Err(InquireError::OperationInterrupted)).unwrap_err();
        assert!(err.is::<Interrupted>());
    }
}
