//! Text parsing for ping-style utility output (iputils, BSD/macOS, Windows).

use crate::models::RttSource;
use regex::Regex;
use std::sync::LazyLock;

static UNIX_LOSS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+) packets transmitted, (\d+) (?:packets )?received(?:, \+\d+ (?:errors|duplicates))*, ([\d.]+)% packet loss")
        .expect("unix loss pattern")
});
static WINDOWS_LOSS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Sent = (\d+), Received = (\d+), Lost = \d+ \((\d+)% loss\)").expect("windows loss pattern")
});
static UNIX_RTT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:rtt|round-trip) min/avg/max/(?:mdev|stddev) = ([\d.]+)/([\d.]+)/([\d.]+)/[\d.]+ ms")
        .expect("unix rtt pattern")
});
static WINDOWS_RTT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Minimum = (\d+)ms, Maximum = (\d+)ms, Average = (\d+)ms").expect("windows rtt pattern")
});
static REPLY_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"time[=<]\s*([\d.]+)\s*ms").expect("reply time pattern"));

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RttSummary {
    pub min_ms: f64,
    pub avg_ms: f64,
    pub max_ms: f64,
}

/// Everything recognisable in one run's output. Fields stay `None` when the
/// corresponding line is missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PingReport {
    pub transmitted: Option<u32>,
    pub received: Option<u32>,
    pub loss_percent: Option<f64>,
    pub summary: Option<RttSummary>,
    pub samples: Vec<f64>,
}

impl PingReport {
    /// Summary average when present, otherwise the mean of the reply samples.
    pub fn rtt(&self) -> Option<(f64, RttSource)> {
        if let Some(summary) = self.summary {
            return Some((summary.avg_ms, RttSource::Summary));
        }
        if self.samples.is_empty() {
            return None;
        }
        let sum: f64 = self.samples.iter().sum();
        Some((sum / self.samples.len() as f64, RttSource::Samples))
    }
}

pub fn parse_ping_output(output: &str) -> PingReport {
    let mut report = PingReport::default();

    for line in output.lines() {
        if report.transmitted.is_none() {
            if let Some(caps) = UNIX_LOSS.captures(line).or_else(|| WINDOWS_LOSS.captures(line)) {
                report.transmitted = caps[1].parse().ok();
                report.received = caps[2].parse().ok();
                report.loss_percent = caps[3].parse().ok();
                continue;
            }
        }

        if report.summary.is_none() {
            if let Some(caps) = UNIX_RTT.captures(line) {
                report.summary = summary(&caps[1], &caps[2], &caps[3]);
                continue;
            }
            // Windows prints Minimum, Maximum, Average in that order
            if let Some(caps) = WINDOWS_RTT.captures(line) {
                report.summary = summary(&caps[1], &caps[3], &caps[2]);
                continue;
            }
        }

        if let Some(caps) = REPLY_TIME.captures(line) {
            if let Ok(ms) = caps[1].parse::<f64>() {
                report.samples.push(ms);
            }
        }
    }

    report
}

fn summary(min: &str, avg: &str, max: &str) -> Option<RttSummary> {
    Some(RttSummary {
        min_ms: min.parse().ok()?,
        avg_ms: avg.parse().ok()?,
        max_ms: max.parse().ok()?,
    })
}
