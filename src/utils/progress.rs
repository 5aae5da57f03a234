//! Progress reporting for install runs.
//!
//! A thin wrapper around `indicatif` that the orchestrator ticks once per
//! component. Progress output is hidden when `CREW_NO_PROGRESS` is set or the
//! bar is created with [`InstallProgress::hidden`], which is what tests and
//! `--quiet` use.

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};

fn is_progress_disabled() -> bool {
    std::env::var("CREW_NO_PROGRESS").is_ok()
}

/// Per-run progress bar counting components.
#[derive(Debug, Clone)]
pub struct InstallProgress {
    inner: IndicatifBar,
}

impl InstallProgress {
    /// Visible bar of `len` components (hidden if progress is disabled).
    pub fn new(len: u64) -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new(len);
            bar.set_style(default_style());
            bar
        };
        Self {
            inner: bar,
        }
    }

    pub fn hidden() -> Self {
        Self {
            inner: IndicatifBar::hidden(),
        }
    }

    pub fn set_length(&self, len: u64) {
        self.inner.set_length(len);
    }

    pub fn set_message(&self, msg: impl Into<String>) {
        self.inner.set_message(msg.into());
    }

    pub fn inc(&self, delta: u64) {
        self.inner.inc(delta);
    }

    pub fn position(&self) -> u64 {
        self.inner.position()
    }

    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }
}

impl Default for InstallProgress {
    fn default() -> Self {
        Self::hidden()
    }
}

fn default_style() -> IndicatifStyle {
    IndicatifStyle::default_bar()
        .template("{prefix:.bold} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| IndicatifStyle::default_bar())
        .progress_chars("━╸━")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_progress_counts() {
        let progress = InstallProgress::hidden();
        progress.set_length(3);
        progress.inc(1);
        progress.inc(1);
        assert_eq!(progress.position(), 2);
        progress.finish_and_clear();
    }
}
