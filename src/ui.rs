//! Terminal status output for the `road_scene` binary.
//!
//! Startup stages (model load, camera init) get a spinner that resolves into a
//! check mark with elapsed time. While detection runs, a single live line
//! shows the dashboard status and the latest object counts.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    no_color: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool, no_color: bool) -> Self {
        Self {
            mode,
            is_tty,
            no_color,
        }
    }

    /// Honours `NO_COLOR` in auto mode and checks whether stderr is a terminal.
    pub fn detect(mode: UiMode) -> Self {
        use std::io::IsTerminal;
        let no_color = std::env::var_os("NO_COLOR").is_some();
        Self::new(mode, std::io::stderr().is_terminal(), no_color)
    }

    fn use_pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.no_color,
                UiMode::Plain => false,
            }
    }

    fn spinner(&self, template: &str) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        spinner.set_draw_target(ProgressDrawTarget::stderr());
        spinner.enable_steady_tick(Duration::from_millis(120));
        let style = ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.use_pretty() {
            let spinner = self.spinner("{spinner} {msg}");
            spinner.set_message(name.to_string());
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    /// Status line updated while the loop runs.
    pub fn live(&self, status: &str) -> LiveLine {
        let spinner = self.use_pretty().then(|| {
            let spinner = self.spinner("{spinner} [{elapsed}] {msg}");
            spinner.set_message(status.to_string());
            spinner
        });
        if spinner.is_none() {
            eprintln!("==> {}", status);
        }
        LiveLine {
            spinner,
            status: status.to_string(),
            last_plain: None,
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
    failed: bool,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
            failed: false,
        }
    }

    /// Mark the stage as failed; the guard reports it when dropped.
    pub fn fail(mut self, reason: &str) {
        self.failed = true;
        self.name = format!("{} ({})", self.name, reason);
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let mark = if self.failed { "✘" } else { "✔" };
        let message = format!("{} {} ({})", mark, self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

/// Counts shown on the live line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SceneCounts {
    pub detections: usize,
    pub people: usize,
    pub vehicles: usize,
}

pub struct LiveLine {
    spinner: Option<ProgressBar>,
    status: String,
    last_plain: Option<Instant>,
}

impl LiveLine {
    pub fn update(&mut self, counts: SceneCounts) {
        let message = format_counts(&self.status, counts);
        match &self.spinner {
            Some(spinner) => spinner.set_message(message),
            None => {
                // Plain output is rate limited to one line per second.
                let due = self
                    .last_plain
                    .map(|at| at.elapsed() >= Duration::from_secs(1))
                    .unwrap_or(true);
                if due {
                    eprintln!("    {}", message);
                    self.last_plain = Some(Instant::now());
                }
            }
        }
    }

    pub fn finish(self, summary: &str) {
        match &self.spinner {
            Some(spinner) => spinner.finish_with_message(summary.to_string()),
            None => eprintln!("{}", summary),
        }
    }
}

fn format_counts(status: &str, counts: SceneCounts) -> String {
    format!(
        "{} | {} detections, {} people, {} vehicles",
        status, counts.detections, counts.people, counts.vehicles
    )
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
