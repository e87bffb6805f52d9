//! Prometheus text exposition (format 0.0.4) for the `/metrics` scrape.
//!
//! The service exports a fixed set of families, so there is no registry:
//! callers take a snapshot and render it. Every family is written as
//! `# HELP`, `# TYPE`, then its sample, with a blank line between families.

use std::fmt::Write;

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Exported in place of the counter when the store read fails.
pub const COUNTER_UNAVAILABLE: i64 = -1;

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
}

impl MetricKind {
    fn as_str(self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
        }
    }
}

#[derive(Default)]
pub struct Exposition {
    out: String,
}

impl Exposition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one single-sample family.
    pub fn family(
        &mut self,
        name: &str,
        help: &str,
        kind: MetricKind,
        labels: &[(&str, &str)],
        value: i64,
    ) -> &mut Self {
        if !self.out.is_empty() {
            self.out.push('\n');
        }
        let _ = writeln!(self.out, "# HELP {name} {help}");
        let _ = writeln!(self.out, "# TYPE {name} {}", kind.as_str());

        if labels.is_empty() {
            let _ = writeln!(self.out, "{name} {value}");
        } else {
            let label_str = labels
                .iter()
                .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
                .collect::<Vec<_>>()
                .join(",");
            let _ = writeln!(self.out, "{name}{{{label_str}}} {value}");
        }
        self
    }

    pub fn finish(self) -> String {
        self.out
    }
}

/// Point-in-time view of what `/metrics` reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot<'a> {
    /// Counter value, `COUNTER_UNAVAILABLE` when it could not be read.
    pub counter_total: i64,
    pub store_connected: bool,
    pub version: &'a str,
    pub service: &'a str,
}

impl Snapshot<'_> {
    pub fn render(&self) -> String {
        let mut exp = Exposition::new();
        exp.family(
            "tikky_counter_total",
            "Total counter value",
            MetricKind::Counter,
            &[],
            self.counter_total,
        )
        .family(
            "tikky_redis_connected",
            "Redis connection status (1=connected, 0=disconnected)",
            MetricKind::Gauge,
            &[],
            i64::from(self.store_connected),
        )
        .family(
            "tikky_build_info",
            "Build information",
            MetricKind::Gauge,
            &[("version", self.version), ("service", self.service)],
            1,
        );
        exp.finish()
    }
}
