// file: src/pipeline/progress.rs
// description: progress tracking and statistics reporting for multi-site report runs
// reference: uses indicatif for progress bars and tracks processing metrics

use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub sites_processed: usize,
    pub sites_failed: usize,
    pub sample_fallbacks: usize,
    pub months_covered: usize,
    pub duration_ms: u64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.sites_processed + self.sites_failed;
        if total == 0 {
            return 0.0;
        }
        (self.sites_processed as f64 / total as f64) * 100.0
    }

    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} sites processed, {} failed ({:.0}% ok), {} months covered in {} ms",
            self.sites_processed,
            self.sites_failed,
            self.success_rate(),
            self.months_covered,
            self.duration_ms
        );
        if self.sample_fallbacks > 0 {
            line.push_str(&format!(
                " ({})",
                format!("{} using sample data", self.sample_fallbacks).yellow()
            ));
        }
        line
    }
}

pub struct ProgressTracker {
    main_bar: ProgressBar,
    detail_bar: ProgressBar,
    sites_processed: AtomicUsize,
    sites_failed: AtomicUsize,
    sample_fallbacks: AtomicUsize,
    months_covered: AtomicUsize,
    start_time: Instant,
}

impl ProgressTracker {
    pub fn with_color(total_sites: usize, colored: bool) -> Self {
        Self::build(MultiProgress::new(), total_sites, colored)
    }

    /// Tracker that counts but never draws.
    pub fn hidden(total_sites: usize) -> Self {
        Self::build(
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
            total_sites,
            false,
        )
    }

    fn build(multi_progress: MultiProgress, total_sites: usize, colored: bool) -> Self {
        let main_bar = create_progress_bar(&multi_progress, total_sites as u64, colored);
        let detail_bar = create_detail_bar(&multi_progress);

        Self {
            main_bar,
            detail_bar,
            sites_processed: AtomicUsize::new(0),
            sites_failed: AtomicUsize::new(0),
            sample_fallbacks: AtomicUsize::new(0),
            months_covered: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn inc_sites_processed(&self, months: usize) {
        self.sites_processed.fetch_add(1, Ordering::SeqCst);
        self.months_covered.fetch_max(months, Ordering::SeqCst);
        self.main_bar.inc(1);
        self.update_detail_bar();
    }

    pub fn inc_sites_failed(&self) {
        self.sites_failed.fetch_add(1, Ordering::SeqCst);
        self.main_bar.inc(1);
        self.update_detail_bar();
    }

    pub fn add_sample_fallback(&self) {
        self.sample_fallbacks.fetch_add(1, Ordering::SeqCst);
        self.update_detail_bar();
    }

    pub fn set_message(&self, message: String) {
        self.main_bar.set_message(message);
    }

    pub fn finish(&self) {
        self.main_bar.finish_with_message("Report complete");
        self.detail_bar.finish_and_clear();
    }

    pub fn get_stats(&self) -> RunStats {
        RunStats {
            sites_processed: self.sites_processed.load(Ordering::SeqCst),
            sites_failed: self.sites_failed.load(Ordering::SeqCst),
            sample_fallbacks: self.sample_fallbacks.load(Ordering::SeqCst),
            months_covered: self.months_covered.load(Ordering::SeqCst),
            duration_ms: self.start_time.elapsed().as_millis() as u64,
        }
    }

    fn update_detail_bar(&self) {
        let failed = self.sites_failed.load(Ordering::SeqCst);
        let samples = self.sample_fallbacks.load(Ordering::SeqCst);

        let message = format!("Failed: {} | Sample fallbacks: {}", failed, samples);

        self.detail_bar.set_message(message);
    }
}

impl Drop for ProgressTracker {
    fn drop(&mut self) {
        self.finish();
    }
}

fn create_progress_bar(multi_progress: &MultiProgress, total: u64, colored: bool) -> ProgressBar {
    let bar = multi_progress.add(ProgressBar::new(total));
    if colored {
        bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} sites {msg}",
                )
                .expect("Failed to create progress bar template")
                .progress_chars("█▓▒░"),
        );
    } else {
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} sites {msg}")
                .expect("Failed to create progress bar template")
                .progress_chars("=>-"),
        );
    }
    bar
}

fn create_detail_bar(multi_progress: &MultiProgress) -> ProgressBar {
    let bar = multi_progress.add(ProgressBar::new(0));
    let style = ProgressStyle::default_bar()
        .template("{msg}")
        .expect("Failed to create detail bar template");
    bar.set_style(style);
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_stats_success_rate() {
        let mut stats = RunStats::new();
        stats.sites_processed = 3;
        stats.sites_failed = 1;

        assert!((stats.success_rate() - 75.0).abs() < 0.01);
        assert_eq!(RunStats::new().success_rate(), 0.0);
    }

    #[test]
    fn test_summary_mentions_sample_data() {
        let mut stats = RunStats::new();
        stats.sites_processed = 2;
        assert!(!stats.summary().contains("sample"));
        assert!(stats.summary().contains("(100% ok)"));

        stats.sample_fallbacks = 1;
        assert!(stats.summary().contains("1 using sample data"));
    }

    #[test]
    fn test_progress_tracker_counts() {
        let tracker = ProgressTracker::hidden(3);

        tracker.inc_sites_processed(7);
        tracker.inc_sites_processed(5);
        tracker.add_sample_fallback();
        tracker.inc_sites_failed();

        let stats = tracker.get_stats();
        assert_eq!(stats.sites_processed, 2);
        assert_eq!(stats.sites_failed, 1);
        assert_eq!(stats.sample_fallbacks, 1);
        assert_eq!(stats.months_covered, 7);
    }
}
