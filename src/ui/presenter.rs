//! Terminal presentation of transfer lifecycle events.
//!
//! Owns `TaskMeta` (per-transfer running totals, start time, rolling speed
//! samples) — presentation-only state the coordination core never reads.
//! Progress redraws overwrite the current line with `\r`; reports go on
//! their own lines. In dev mode a process resource monitor runs while
//! transfers are active and the completion report grows peak-speed,
//! stability and resource sections.

use crate::core::config::SPEED_SAMPLE_INTERVAL;
use crate::core::registry::PendingRequest;
use crate::utils::format::{format_bytes, format_rate, truncate_filename};
use crate::utils::monitor::{ResourceMonitor, ResourceStats};
use std::collections::HashMap;
use std::io::Write;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Completed,
    Failed,
}

/// Presentation boundary consumed by the control loop. Implementations run
/// on the cooperative loop only.
pub trait Presenter: Send {
    fn on_task_added(&mut self, task_id: &str, filename: &str);
    fn on_start(&mut self, task_id: &str, filename: &str);
    fn on_progress(&mut self, task_id: &str, current: u64, total: u64);
    fn on_status_change(&mut self, task_id: &str, status: TransferStatus, message: &str);
    fn on_error(&mut self, task_id: &str, message: &str);
    fn on_reject(&mut self, task_id: &str, reason: &str);
    fn handle_incoming_request(&mut self, request: &PendingRequest);
}

/// Running totals for one active transfer.
struct TaskMeta {
    filename: String,
    started: Instant,
    total: u64,
    last_update: Instant,
    last_bytes: u64,
    peak_speed: f64,
    speed_samples: Vec<f64>,
}

#[derive(Default)]
pub struct TerminalPresenter {
    tasks: HashMap<String, TaskMeta>,
    dev_mode: bool,
    monitor: Option<ResourceMonitor>,
}

impl TerminalPresenter {
    pub fn new(dev_mode: bool) -> Self {
        Self {
            dev_mode,
            ..Self::default()
        }
    }

    fn clear_progress_line(&self) {
        print!("\r{:width$}\r", "", width = 100);
        let _ = std::io::stdout().flush();
    }

    fn print_simple_report(meta: &TaskMeta, elapsed: f64, avg: f64) {
        println!("v completed {}", meta.filename);
        println!("   size:  {}", format_bytes(meta.total));
        println!("   time:  {:.2}s", elapsed);
        println!("   speed: {}", format_rate(avg));
    }

    fn print_engineering_report(
        meta: &TaskMeta,
        elapsed: f64,
        avg: f64,
        stats: Option<&ResourceStats>,
    ) {
        // A transfer too short to collect samples falls back to the average.
        let peak = if meta.speed_samples.is_empty() || meta.peak_speed == 0.0 {
            avg
        } else {
            meta.peak_speed
        };
        let stability = match stability(&meta.speed_samples) {
            Some(s) => format!("{s:.1}%"),
            None => "n/a".to_string(),
        };
        let resource = match stats {
            Some(s) => format!("cpu {:.1}% | ram {}", s.avg_cpu, format_bytes(s.avg_mem)),
            None => "n/a".to_string(),
        };

        println!("v completed {}", meta.filename);
        println!("   size:      {}", format_bytes(meta.total));
        println!("   time:      {:.4}s", elapsed);
        println!(
            "   speed:     {} (peak: {})",
            format_rate(avg),
            format_rate(peak)
        );
        println!("   stability: {stability}");
        println!("   resource:  {resource}");
        println!("   diagnosis: {}", diagnose(stats, avg));
    }
}

impl Presenter for TerminalPresenter {
    fn on_task_added(&mut self, _task_id: &str, filename: &str) {
        println!("[queue] added {}", truncate_filename(filename, 40));
    }

    fn on_start(&mut self, task_id: &str, filename: &str) {
        let short = truncate_filename(filename, 40);
        println!("--> starting {short}");
        if self.dev_mode && self.monitor.is_none() {
            self.monitor = Some(ResourceMonitor::start());
        }
        let now = Instant::now();
        self.tasks.insert(
            task_id.to_string(),
            TaskMeta {
                filename: short,
                started: now,
                total: 0,
                last_update: now,
                last_bytes: 0,
                peak_speed: 0.0,
                speed_samples: Vec::new(),
            },
        );
    }

    fn on_progress(&mut self, task_id: &str, current: u64, total: u64) {
        let Some(meta) = self.tasks.get_mut(task_id) else {
            return;
        };
        meta.total = total;
        let now = Instant::now();
        let dt = now.duration_since(meta.last_update);
        if dt >= SPEED_SAMPLE_INTERVAL {
            let delta = current.saturating_sub(meta.last_bytes) as f64;
            let inst = delta / dt.as_secs_f64();
            meta.speed_samples.push(inst);
            meta.peak_speed = meta.peak_speed.max(inst);
            meta.last_update = now;
            meta.last_bytes = current;
        }
        let elapsed = now.duration_since(meta.started).as_secs_f64();
        let avg = if elapsed > 0.0 {
            current as f64 / elapsed
        } else {
            0.0
        };
        let percent = if total > 0 {
            current as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        print!(
            "\r   {}: {:5.1}% | {} / {} | {}   ",
            meta.filename,
            percent,
            format_bytes(current),
            format_bytes(total),
            format_rate(avg)
        );
        let _ = std::io::stdout().flush();
    }

    fn on_status_change(&mut self, task_id: &str, status: TransferStatus, message: &str) {
        self.clear_progress_line();
        match status {
            TransferStatus::Completed => {
                let meta = self.tasks.remove(task_id);
                // Stop sampling once the last transfer finishes.
                let stats = if self.tasks.is_empty() {
                    self.monitor
                        .take()
                        .map(|mut m| {
                            m.stop();
                            m.stats()
                        })
                        .flatten()
                } else {
                    None
                };
                if let Some(meta) = meta {
                    let elapsed = meta.started.elapsed().as_secs_f64();
                    let avg = if elapsed > 0.0 {
                        meta.total as f64 / elapsed
                    } else {
                        0.0
                    };
                    if self.dev_mode {
                        Self::print_engineering_report(&meta, elapsed, avg, stats.as_ref());
                    } else {
                        Self::print_simple_report(&meta, elapsed, avg);
                    }
                } else {
                    println!("v completed {task_id}");
                }
            }
            TransferStatus::Failed => {
                println!("x failed {task_id}: {message}");
                self.tasks.remove(task_id);
            }
        }
    }

    fn on_error(&mut self, task_id: &str, message: &str) {
        self.clear_progress_line();
        println!("! error ({task_id}): {message}");
        self.tasks.remove(task_id);
    }

    fn on_reject(&mut self, task_id: &str, reason: &str) {
        self.clear_progress_line();
        println!("x rejected ({task_id}): {reason}");
        self.tasks.remove(task_id);
    }

    fn handle_incoming_request(&mut self, request: &PendingRequest) {
        println!();
        println!(">> incoming request <<");
        println!(
            "   from: {} ({})",
            request.sender_name, request.sender_device
        );
        println!("   file: {}", request.filename);
        println!("   size: {}", format_bytes(request.filesize));
        println!(
            "   type 'accept {id}' or 'reject {id}' to answer",
            id = request.task_id
        );
    }
}

/// Engine failure strings are opaque; the common deadline wording is the
/// one case worth translating for the operator.
pub fn normalize_engine_error(message: &str) -> String {
    if message.contains("deadline") || message.to_lowercase().contains("time") {
        "Timeout / No Response".to_string()
    } else {
        message.to_string()
    }
}

/// Throughput stability as a percentage: 100 means perfectly steady,
/// computed as `(1 - cv) * 100` where `cv` is the coefficient of variation
/// of the instantaneous speed samples. Needs at least two samples.
pub fn stability(samples: &[f64]) -> Option<f64> {
    if samples.len() < 2 {
        return None;
    }
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return None;
    }
    let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let cv = variance.sqrt() / mean;
    Some(((1.0 - cv) * 100.0).max(0.0))
}

/// Rough bottleneck verdict from the resource samples and the achieved
/// average speed.
pub fn diagnose(stats: Option<&ResourceStats>, avg_speed: f64) -> &'static str {
    match stats {
        Some(s) if s.avg_cpu > 90.0 => "cpu bound",
        Some(s) if s.avg_cpu < 10.0 && avg_speed < 1_000_000.0 => "io/net bound",
        _ => "healthy",
    }
}
