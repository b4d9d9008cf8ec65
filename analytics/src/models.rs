use std::fmt;

use polars::prelude::*;
use serde::Serialize;

use crate::figure::Figure;

/// Wrap any error into the polars error type used across the engine.
pub fn polars_err(e: Box<dyn std::error::Error>) -> PolarsError {
    PolarsError::ComputeError(format!("{}", e).into())
}

/// A single scalar shown next to a chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Integer(i64),
    Text(String),
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Number(v) => Some(*v),
            MetricValue::Integer(v) => Some(*v as f64),
            MetricValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetricValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Number(v) => write!(f, "{:.2}", v),
            MetricValue::Integer(v) => write!(f, "{}", v),
            MetricValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Number(v)
    }
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        MetricValue::Integer(v)
    }
}

impl From<usize> for MetricValue {
    fn from(v: usize) -> Self {
        MetricValue::Integer(v as i64)
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        MetricValue::Text(v)
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        MetricValue::Text(v.to_string())
    }
}

/// Metric label → value, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metrics(Vec<(String, MetricValue)>);

impl Metrics {
    pub fn new() -> Self {
        Metrics::default()
    }

    /// Insert or replace a metric, keeping the original position on replace.
    pub fn insert(&mut self, label: impl Into<String>, value: impl Into<MetricValue>) {
        let label = label.into();
        let value = value.into();
        match self.0.iter_mut().find(|(l, _)| *l == label) {
            Some(slot) => slot.1 = value,
            None => self.0.push((label, value)),
        }
    }

    pub fn get(&self, label: &str) -> Option<&MetricValue> {
        self.0.iter().find(|(l, _)| l == label).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricValue)> {
        self.0.iter().map(|(l, v)| (l.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What every analyzer hands back to the front end.
#[derive(Debug, Clone, Default)]
pub struct VisualizationResult {
    pub figure: Option<Figure>,
    pub metrics: Metrics,
    pub insights: Vec<String>,
    pub extra_data: Option<DataFrame>,
}

impl VisualizationResult {
    /// The "not applicable" result: no figure, no metrics, no insights.
    pub fn empty() -> Self {
        VisualizationResult::default()
    }

    pub fn new(figure: Figure, metrics: Metrics, insights: Vec<String>) -> Self {
        VisualizationResult {
            figure: Some(figure),
            metrics,
            insights,
            extra_data: None,
        }
    }

    pub fn with_extra_data(mut self, extra: DataFrame) -> Self {
        self.extra_data = Some(extra);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.figure.is_none()
            && self.metrics.is_empty()
            && self.insights.is_empty()
            && self.extra_data.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_keep_insertion_order_and_replace_in_place() {
        let mut m = Metrics::new();
        m.insert("b", 1i64);
        m.insert("a", "x");
        m.insert("b", 2.5);
        let labels: Vec<&str> = m.iter().map(|(l, _)| l).collect();
        assert_eq!(labels, vec!["b", "a"]);
        assert_eq!(m.get("b").and_then(|v| v.as_f64()), Some(2.5));
        assert_eq!(m.get("a").and_then(|v| v.as_str()), Some("x"));
    }

    #[test]
    fn empty_result_is_empty() {
        assert!(VisualizationResult::empty().is_empty());
        let r = VisualizationResult {
            insights: vec!["only text".into()],
            ..VisualizationResult::default()
        };
        assert!(!r.is_empty());
        assert!(r.figure.is_none());
    }

    #[test]
    fn metric_display() {
        assert_eq!(MetricValue::from(0.8765).to_string(), "0.88");
        assert_eq!(MetricValue::from(12usize).to_string(), "12");
    }
}
