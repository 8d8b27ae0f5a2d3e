use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

impl UiMode {
    pub fn parse(flag: Option<&str>) -> Self {
        match flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        }
    }

    /// `Auto` backs off to plain output when stdout is redirected; `Pretty`
    /// only needs stderr to be a terminal.
    pub fn use_pretty(self, is_tty: bool, disable_pretty: bool) -> bool {
        is_tty
            && match self {
                UiMode::Pretty => true,
                UiMode::Auto => !disable_pretty,
                UiMode::Plain => false,
            }
    }
}

/// Live status line for a replay: a spinner on a terminal, periodic plain
/// lines on stderr otherwise.
pub struct ReplayProgress {
    spinner: Option<ProgressBar>,
    start: Instant,
    last_plain: Instant,
    ticks: u64,
    batches: u64,
}

const PLAIN_INTERVAL: Duration = Duration::from_secs(5);

impl ReplayProgress {
    pub fn new(mode: UiMode, is_tty: bool, disable_pretty: bool, source: &str) -> Self {
        let spinner = if mode.use_pretty(is_tty, disable_pretty) {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("replaying {source}…"));
            Some(spinner)
        } else {
            eprintln!("==> replaying {}", source);
            None
        };
        let now = Instant::now();
        Self {
            spinner,
            start: now,
            last_plain: now,
            ticks: 0,
            batches: 0,
        }
    }

    pub fn on_tick(&mut self, time_s: f64, active: usize, open: usize, closed_now: usize) {
        self.ticks += 1;
        self.batches += closed_now as u64;
        let message = format!(
            "t={:.2}s ticks={} active={} open={} batches={}",
            time_s, self.ticks, active, open, self.batches
        );
        match &self.spinner {
            Some(spinner) => spinner.set_message(message),
            None => {
                if self.last_plain.elapsed() >= PLAIN_INTERVAL {
                    self.last_plain = Instant::now();
                    eprintln!("    {message}");
                }
            }
        }
    }

    pub fn suspend<F: FnOnce()>(&self, f: F) {
        match &self.spinner {
            Some(spinner) => spinner.suspend(f),
            None => f(),
        }
    }

    pub fn finish(self, batches: u64) {
        let message = format!(
            "✔ replay done: {} ticks, {} batches ({})",
            self.ticks,
            batches,
            format_duration(self.start.elapsed())
        );
        match self.spinner {
            Some(spinner) => spinner.finish_with_message(message),
            None => eprintln!("{message}"),
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pretty_overrides_redirected_stdout() {
        assert!(UiMode::Pretty.use_pretty(true, true));
        assert!(!UiMode::Auto.use_pretty(true, true));
        assert!(UiMode::Auto.use_pretty(true, false));
    }

    #[test]
    fn never_pretty_without_a_terminal() {
        for mode in [UiMode::Auto, UiMode::Plain, UiMode::Pretty] {
            assert!(!mode.use_pretty(false, false));
        }
        assert!(!UiMode::Plain.use_pretty(true, false));
    }

    #[test]
    fn parses_flag_values() {
        assert_eq!(UiMode::parse(Some("pretty")), UiMode::Pretty);
        assert_eq!(UiMode::parse(Some("plain")), UiMode::Plain);
        assert_eq!(UiMode::parse(Some("fancy")), UiMode::Auto);
        assert_eq!(UiMode::parse(None), UiMode::Auto);
    }
}
