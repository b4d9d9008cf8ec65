//! Chart specifications produced by the analyzers.
//!
//! A [`Figure`] is plain data: the analyzers fill it in, the renderer in
//! [`crate::render`] draws it, and the binary also dumps it as JSON so any
//! other front end can pick it up.

use serde::{Deserialize, Serialize};

/// Plotly's default qualitative palette, used for multi-series charts.
pub const PALETTE: [&str; 10] = [
    "#636EFA", "#EF553B", "#00CC96", "#AB63FA", "#FFA15A",
    "#19D3F3", "#FF6692", "#B6E880", "#FF97FF", "#FECB52",
];

/// Styling knobs shared by every analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartStyle {
    pub template: String,
    pub font_family: String,
    pub font_size: u32,
    pub width: u32,
    pub height: u32,
    pub base_color: String,
    pub highlight_color: String,
}

impl Default for ChartStyle {
    fn default() -> Self {
        ChartStyle {
            template: "plotly_white".to_string(),
            font_family: "Arial".to_string(),
            font_size: 12,
            width: 1200,
            height: 800,
            base_color: PALETTE[0].to_string(),
            highlight_color: PALETTE[1].to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScatterMode {
    Markers,
    Lines,
    LinesMarkers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextPosition {
    Inside,
    Outside,
}

/// One data series of a figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trace {
    Pie {
        labels: Vec<String>,
        values: Vec<f64>,
        hole: f64,
    },
    Bar {
        name: String,
        categories: Vec<String>,
        values: Vec<f64>,
        /// Per-bar colours; empty means the style's base colour.
        colors: Vec<String>,
        text: Vec<String>,
        text_position: TextPosition,
    },
    Scatter {
        name: String,
        x: Vec<f64>,
        y: Vec<f64>,
        mode: ScatterMode,
        color: Option<String>,
        hover: Vec<String>,
    },
    Scatter3d {
        name: String,
        x: Vec<f64>,
        y: Vec<f64>,
        z: Vec<f64>,
        color: Option<String>,
        hover: Vec<String>,
    },
}

impl Trace {
    pub fn name(&self) -> &str {
        match self {
            Trace::Pie { .. } => "",
            Trace::Bar { name, .. } | Trace::Scatter { name, .. } | Trace::Scatter3d { name, .. } => name,
        }
    }

    /// Number of plotted points (or slices/bars).
    pub fn len(&self) -> usize {
        match self {
            Trace::Pie { values, .. } | Trace::Bar { values, .. } => values.len(),
            Trace::Scatter { x, .. } | Trace::Scatter3d { x, .. } => x.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Free text placed on the chart in paper coordinates (0..1 on both axes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub font_size: u32,
    pub color: String,
    pub bold: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub title: String,
    pub range: Option<(f64, f64)>,
    pub log: bool,
    pub tick_angle: Option<i32>,
    pub visible: bool,
}

impl Axis {
    pub fn titled(title: impl Into<String>) -> Self {
        Axis {
            title: title.into(),
            visible: true,
            ..Axis::default()
        }
    }

    pub fn hidden() -> Self {
        Axis::default()
    }

    pub fn with_range(mut self, lo: f64, hi: f64) -> Self {
        self.range = Some((lo, hi));
        self
    }

    pub fn log_scale(mut self) -> Self {
        self.log = true;
        self
    }

    pub fn with_tick_angle(mut self, angle: i32) -> Self {
        self.tick_angle = Some(angle);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Figure {
    pub title: String,
    pub traces: Vec<Trace>,
    pub annotations: Vec<Annotation>,
    pub x_axis: Axis,
    pub y_axis: Axis,
    pub z_axis: Option<Axis>,
    pub legend_title: Option<String>,
    pub style: ChartStyle,
}

impl Figure {
    pub fn new(title: impl Into<String>, style: &ChartStyle) -> Self {
        Figure {
            title: title.into(),
            traces: Vec::new(),
            annotations: Vec::new(),
            x_axis: Axis::titled(""),
            y_axis: Axis::titled(""),
            z_axis: None,
            legend_title: None,
            style: style.clone(),
        }
    }

    pub fn with_trace(mut self, trace: Trace) -> Self {
        self.traces.push(trace);
        self
    }

    pub fn with_axes(mut self, x_axis: Axis, y_axis: Axis) -> Self {
        self.x_axis = x_axis;
        self.y_axis = y_axis;
        self
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn is_3d(&self) -> bool {
        self.traces.iter().any(|t| matches!(t, Trace::Scatter3d { .. }))
    }
}

/// `[0, max * (1 + margin)]`, or `[0, 1]` when there is nothing positive to show.
pub fn padded_range(values: &[f64], margin: f64) -> (f64, f64) {
    let max = values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);
    if max.is_finite() && max > 0.0 {
        (0.0, max * (1.0 + margin))
    } else {
        (0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padded_range_adds_margin_above_max() {
        let (lo, hi) = padded_range(&[2.0, 10.0, 4.0], 0.1);
        assert_eq!(lo, 0.0);
        assert!((hi - 11.0).abs() < 1e-9);
    }

    #[test]
    fn padded_range_ignores_nan_and_empty() {
        assert_eq!(padded_range(&[], 0.1), (0.0, 1.0));
        assert_eq!(padded_range(&[f64::NAN], 0.2), (0.0, 1.0));
    }

    #[test]
    fn figure_serializes_trace_tag() {
        let fig = Figure::new("t", &ChartStyle::default()).with_trace(Trace::Pie {
            labels: vec!["a".into()],
            values: vec![1.0],
            hole: 0.3,
        });
        let json = serde_json::to_value(&fig).unwrap();
        assert_eq!(json["traces"][0]["type"], "pie");
        assert!(!fig.is_3d());
    }
}
