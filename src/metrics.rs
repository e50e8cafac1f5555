//! Performance metrics and statistics tracking for the prediction service.

use crate::types::label::RiskLabel;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for the serving layer
pub struct ServiceMetrics {
    /// Total analyses completed
    pub analyses_processed: AtomicU64,
    /// Analyses flagged low-confidence for presentation
    pub low_confidence_count: AtomicU64,
    /// Analyses by predicted risk level
    analyses_by_level: RwLock<HashMap<String, u64>>,
    /// End-to-end processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl ServiceMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            analyses_processed: AtomicU64::new(0),
            low_confidence_count: AtomicU64::new(0),
            analyses_by_level: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    /// Record a completed analysis
    pub fn record_analysis(&self, processing_time: Duration, label: RiskLabel, low_confidence: bool) {
        self.analyses_processed.fetch_add(1, Ordering::Relaxed);
        if low_confidence {
            self.low_confidence_count.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut by_level) = self.analyses_by_level.write() {
            *by_level.entry(label.as_str().to_string()).or_insert(0) += 1;
        }

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only the recent window for memory efficiency
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let times = match self.processing_times.read() {
            Ok(times) => times,
            Err(_) => return ProcessingStats::default(),
        };
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: *sorted.last().unwrap_or(&0),
        }
    }

    /// Get current throughput (analyses per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.analyses_processed.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get analyses by risk level
    pub fn get_analyses_by_level(&self) -> HashMap<String, u64> {
        self.analyses_by_level
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let count = self.analyses_processed.load(Ordering::Relaxed);
        let low_confidence = self.low_confidence_count.load(Ordering::Relaxed);
        let processing = self.get_processing_stats();
        let by_level = self.get_analyses_by_level();

        info!(
            analyses = count,
            throughput = format!("{:.1}/s", self.get_throughput()),
            low_confidence = low_confidence,
            "service metrics summary"
        );
        info!(
            mean_us = processing.mean_us,
            p50_us = processing.p50_us,
            p95_us = processing.p95_us,
            p99_us = processing.p99_us,
            "processing time (μs)"
        );
        for (level, level_count) in &by_level {
            let pct = if count > 0 {
                (*level_count as f64 / count as f64) * 100.0
            } else {
                0.0
            };
            info!(level = %level, count = level_count, pct = format!("{pct:.1}%"), "risk level distribution");
        }
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Real-time metrics reporter that prints periodic summaries
pub struct MetricsReporter {
    metrics: std::sync::Arc<ServiceMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: std::sync::Arc<ServiceMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = ServiceMetrics::new();

        metrics.record_analysis(Duration::from_micros(100), RiskLabel::Low, false);
        metrics.record_analysis(Duration::from_micros(200), RiskLabel::High, true);

        assert_eq!(metrics.analyses_processed.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.low_confidence_count.load(Ordering::Relaxed), 1);

        let by_level = metrics.get_analyses_by_level();
        assert_eq!(by_level.get("low"), Some(&1));
        assert_eq!(by_level.get("high"), Some(&1));
    }

    #[test]
    fn test_processing_stats() {
        let metrics = ServiceMetrics::new();
        for us in [100, 200, 300, 400] {
            metrics.record_analysis(Duration::from_micros(us), RiskLabel::Moderate, false);
        }

        let stats = metrics.get_processing_stats();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean_us, 250);
        assert_eq!(stats.max_us, 400);
    }
}
