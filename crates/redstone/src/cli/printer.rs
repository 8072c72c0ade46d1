use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Printer {
    Quiet,
    Default,
}

impl Printer {
    pub fn target(&self) -> ProgressDrawTarget {
        match self {
            Printer::Quiet => ProgressDrawTarget::hidden(),
            Printer::Default => ProgressDrawTarget::stdout(),
        }
    }

    pub fn spinner(&self, message: impl Into<String>) -> ProgressBar {
        let spinner = ProgressBar::with_draw_target(None, self.target());
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.red} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(message.into());
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner
    }

    /// Byte progress bar; switches to a spinner style when the size is unknown.
    pub fn download_bar(&self, message: impl Into<String>) -> ProgressBar {
        let bar = ProgressBar::with_draw_target(None, self.target());
        bar.set_style(
            ProgressStyle::with_template(
                "{msg} [{bar:30.red/white}] {bytes}/{total_bytes} ({bytes_per_sec})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
        );
        bar.set_message(message.into());
        bar
    }
}

/// How summary screens are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Boxed,
    Compact,
}

impl Layout {
    pub fn render(&self, title: &str, rows: &[(&str, String)]) -> String {
        match self {
            Layout::Boxed => boxed(title, rows),
            Layout::Compact => compact(title, rows),
        }
    }
}

fn boxed(title: &str, rows: &[(&str, String)]) -> String {
    let label_width = rows.iter().map(|(k, _)| k.chars().count()).max().unwrap_or(0);
    let lines: Vec<String> = rows
        .iter()
        .map(|(k, v)| format!("{k:<label_width$} : {v}"))
        .collect();

    let inner = lines
        .iter()
        .map(|l| l.chars().count())
        .chain(std::iter::once(title.chars().count()))
        .max()
        .unwrap_or(0)
        + 2;

    let mut out = String::new();
    out.push_str(&format!("╔{}╗\n", "═".repeat(inner)));
    out.push_str(&format!("║ {title:<width$} ║\n", width = inner - 2));
    out.push_str(&format!("╠{}╣\n", "═".repeat(inner)));
    for line in lines {
        out.push_str(&format!("║ {line:<width$} ║\n", width = inner - 2));
    }
    out.push_str(&format!("╚{}╝\n", "═".repeat(inner)));
    out
}

fn compact(title: &str, rows: &[(&str, String)]) -> String {
    let mut out = format!("== {title} ==\n");
    for (k, v) in rows {
        out.push_str(&format!("{k}: {v}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boxed_rows_share_width() {
        let rendered = Layout::Boxed.render(
            "test1",
            &[("Type", "Vanilla".into()), ("Local address", "localhost:25565".into())],
        );
        let widths: Vec<_> = rendered.lines().map(|l| l.chars().count()).collect();

        assert!(widths.windows(2).all(|w| w[0] == w[1]));
        assert!(rendered.contains("Local address : localhost:25565"));
    }

    #[test]
    fn compact_is_one_row_per_line() {
        let rendered = Layout::Compact.render("test1", &[("Port", "25565".into())]);

        assert_eq!(rendered, "== test1 ==\nPort: 25565\n");
    }
}
