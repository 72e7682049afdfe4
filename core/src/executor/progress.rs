use std::collections::HashMap;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

const SPINNER_TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Terminal bars for one execute pass: an overall bar plus one spinner per
/// task in flight.
///
/// A hidden monitor accepts every call and draws nothing.
pub struct ProgressMonitor {
    bars: Option<Bars>,
    failed: usize,
    layer: Option<(usize, usize)>,
}

struct Bars {
    multi: MultiProgress,
    overall: ProgressBar,
    in_flight: HashMap<String, ProgressBar>,
}

impl ProgressMonitor {
    /// `total_tasks` is the number of tasks this pass will run.
    pub fn new(total_tasks: usize, enabled: bool) -> Self {
        if !enabled {
            return Self::hidden();
        }

        let multi = MultiProgress::new();
        let overall = multi.add(ProgressBar::new(total_tasks as u64));
        overall.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} tasks {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓▒░  "),
        );

        Self {
            bars: Some(Bars {
                multi,
                overall,
                in_flight: HashMap::new(),
            }),
            failed: 0,
            layer: None,
        }
    }

    pub fn hidden() -> Self {
        Self {
            bars: None,
            failed: 0,
            layer: None,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.bars.is_some()
    }

    pub fn add_task(&mut self, task_id: &str, worker: &str) {
        let Some(bars) = self.bars.as_mut() else {
            return;
        };

        let spinner = bars.multi.add(ProgressBar::new_spinner());
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(SPINNER_TICKS),
        );
        spinner.set_message(format!("{task_id} on {worker}"));
        spinner.enable_steady_tick(Duration::from_millis(100));
        bars.in_flight.insert(task_id.to_string(), spinner);
    }

    pub fn complete_task(&mut self, task_id: &str, success: bool, duration_ms: u64) {
        if !success {
            self.failed += 1;
        }
        let summary = self.summary();
        let Some(bars) = self.bars.as_mut() else {
            return;
        };

        // Tasks that failed before a worker was acquired have no spinner
        if let Some(spinner) = bars.in_flight.remove(task_id) {
            let mark = if success { "✔" } else { "✘" };
            spinner.finish_with_message(format!("{mark} {task_id} ({duration_ms}ms)"));
        }
        bars.overall.inc(1);
        bars.overall.set_message(summary);
    }

    pub fn update_layer(&mut self, layer_id: usize, total_layers: usize) {
        self.layer = Some((layer_id + 1, total_layers));
        let summary = self.summary();
        if let Some(bars) = &self.bars {
            bars.overall.set_message(summary);
        }
    }

    pub fn finish(&self, success: bool) {
        if let Some(bars) = &self.bars {
            let msg = if success {
                "all tasks completed".to_string()
            } else {
                format!("finished, {} failed", self.failed)
            };
            bars.overall.finish_with_message(msg);
        }
    }

    fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some((current, total)) = self.layer {
            parts.push(format!("layer {current}/{total}"));
        }
        if self.failed > 0 {
            parts.push(format!("{} failed", self.failed));
        }
        parts.join(" · ")
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        if let Some(bars) = self.bars.as_mut() {
            for (_, spinner) in bars.in_flight.drain() {
                spinner.finish_and_clear();
            }
        }
    }
}
