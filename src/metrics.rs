use std::fmt;

use tracing::debug;

/// Per-rule line counts across one or more denoise/reconstruct passes.
#[derive(Debug, Default, Clone)]
pub struct RuleTracker {
    metrics: Vec<RuleMetric>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleMetric {
    pub rule: &'static str,
    pub runs: usize,
    pub lines_before: usize,
    pub lines_after: usize,
    pub touched: usize,
}

impl RuleTracker {
    pub fn new() -> Self {
        RuleTracker::default()
    }

    pub fn record(&mut self, rule: &'static str, before: usize, after: usize, touched: usize) {
        debug!(rule, before, after, touched, "rule applied");
        match self.metrics.iter_mut().find(|m| m.rule == rule) {
            Some(m) => {
                m.runs += 1;
                m.lines_before += before;
                m.lines_after += after;
                m.touched += touched;
            }
            None => self.metrics.push(RuleMetric {
                rule,
                runs: 1,
                lines_before: before,
                lines_after: after,
                touched,
            }),
        }
    }

    pub fn merge(&mut self, other: &RuleTracker) {
        for m in &other.metrics {
            match self.metrics.iter_mut().find(|x| x.rule == m.rule) {
                Some(x) => {
                    x.runs += m.runs;
                    x.lines_before += m.lines_before;
                    x.lines_after += m.lines_after;
                    x.touched += m.touched;
                }
                None => self.metrics.push(m.clone()),
            }
        }
    }

    pub fn get(&self, rule: &str) -> Option<&RuleMetric> {
        self.metrics.iter().find(|m| m.rule == rule)
    }

    pub fn metrics(&self) -> &[RuleMetric] {
        &self.metrics
    }
}

impl fmt::Display for RuleTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for m in &self.metrics {
            writeln!(
                f,
                "  {:<24} lines {:>6} -> {:>6} (touched {})",
                m.rule, m.lines_before, m.lines_after, m.touched
            )?;
        }
        Ok(())
    }
}
