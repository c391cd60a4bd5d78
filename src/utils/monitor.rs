//! Dev-mode process resource monitor.
//!
//! Samples this process's CPU share and resident memory on a background
//! thread while a transfer runs, so the engineering report can say whether
//! a slow transfer was compute-bound or waiting on the network. Only
//! started when dev mode is enabled.

use crate::core::config::RESOURCE_SAMPLE_INTERVAL;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::debug;

/// Aggregated samples over one monitoring window.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceStats {
    pub avg_cpu: f64,
    pub max_cpu: f64,
    /// Bytes of resident memory.
    pub avg_mem: u64,
    pub max_mem: u64,
}

pub struct ResourceMonitor {
    running: Arc<AtomicBool>,
    samples: Arc<Mutex<Vec<(f32, u64)>>>,
    worker: Option<JoinHandle<()>>,
}

impl ResourceMonitor {
    /// Spawn the sampling thread for the current process.
    pub fn start() -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let samples: Arc<Mutex<Vec<(f32, u64)>>> = Arc::new(Mutex::new(Vec::new()));

        let running_flag = running.clone();
        let sample_sink = samples.clone();
        let worker = std::thread::Builder::new()
            .name("resmon".to_string())
            .spawn(move || {
                let pid = Pid::from_u32(std::process::id());
                let mut sys = System::new();
                // First refresh only primes the CPU counters.
                sys.refresh_processes(ProcessesToUpdate::Some(&[pid]));
                while running_flag.load(Ordering::Acquire) {
                    std::thread::sleep(RESOURCE_SAMPLE_INTERVAL);
                    sys.refresh_processes(ProcessesToUpdate::Some(&[pid]));
                    if let Some(proc_info) = sys.process(pid) {
                        sample_sink
                            .lock()
                            .unwrap()
                            .push((proc_info.cpu_usage(), proc_info.memory()));
                    }
                }
                debug!(event = "resource_monitor_stopped", "Sampling thread exited");
            })
            .ok();

        Self {
            running,
            samples,
            worker,
        }
    }

    /// Stop sampling and join the thread.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }

    /// Aggregate collected samples. `None` until at least one sample landed.
    pub fn stats(&self) -> Option<ResourceStats> {
        let samples = self.samples.lock().unwrap();
        if samples.is_empty() {
            return None;
        }
        let count = samples.len() as f64;
        let cpu_sum: f64 = samples.iter().map(|(cpu, _)| *cpu as f64).sum();
        let mem_sum: u64 = samples.iter().map(|(_, mem)| mem).sum();
        Some(ResourceStats {
            avg_cpu: cpu_sum / count,
            max_cpu: samples
                .iter()
                .map(|(cpu, _)| *cpu as f64)
                .fold(0.0, f64::max),
            avg_mem: mem_sum / samples.len() as u64,
            max_mem: samples.iter().map(|(_, mem)| *mem).max().unwrap_or(0),
        })
    }
}

impl Drop for ResourceMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
