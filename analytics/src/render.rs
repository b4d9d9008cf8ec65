//! Static PNG rendering of [`Figure`]s with plotters.

use std::path::Path;

use anyhow::{anyhow, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use tracing::{debug, info};

use crate::figure::{Annotation, Figure, ScatterMode, TextPosition, Trace, PALETTE};

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

fn draw_err<E: std::fmt::Display>(e: E) -> anyhow::Error {
    anyhow!("drawing failed: {}", e)
}

/// `#RRGGBB` or a handful of CSS names; anything else is black.
pub fn parse_color(spec: &str) -> RGBColor {
    let hex = spec.trim().trim_start_matches('#');
    if hex.len() == 6 {
        if let Ok(v) = u32::from_str_radix(hex, 16) {
            return RGBColor((v >> 16) as u8, (v >> 8) as u8, v as u8);
        }
    }
    match spec.trim().to_lowercase().as_str() {
        "red" => RGBColor(255, 0, 0),
        "green" => RGBColor(0, 128, 0),
        "blue" => RGBColor(0, 0, 255),
        "white" => RGBColor(255, 255, 255),
        "gray" | "grey" => RGBColor(128, 128, 128),
        "lightgray" | "lightgrey" => RGBColor(211, 211, 211),
        _ => RGBColor(0, 0, 0),
    }
}

fn palette_color(i: usize) -> RGBColor {
    parse_color(PALETTE[i % PALETTE.len()])
}

/// `(min, max)` of the finite values, widened so the range is never empty.
pub fn data_range<'a>(values: impl IntoIterator<Item = &'a f64>) -> (f64, f64) {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    if !lo.is_finite() {
        return (0.0, 1.0);
    }
    if hi - lo < f64::EPSILON {
        return (lo - 1.0, hi + 1.0);
    }
    let pad = (hi - lo) * 0.05;
    (lo - pad, hi + pad)
}

fn log10_values(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .map(|v| if *v > 0.0 { v.log10() } else { f64::NAN })
        .collect()
}

/// Draw `figure` to a PNG at `path`.
pub fn render_figure(figure: &Figure, path: &Path) -> Result<()> {
    let size = (figure.style.width.max(200), figure.style.height.max(200));
    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE).map_err(draw_err)?;

    let family = figure.style.font_family.as_str();
    match figure.traces.first() {
        None => draw_card(&root, figure, family)?,
        Some(Trace::Pie { .. }) => draw_pie(&root, figure, family)?,
        Some(Trace::Bar { .. }) => draw_bars(&root, figure, family)?,
        Some(Trace::Scatter3d { .. }) => draw_3d(&root, figure, family)?,
        Some(Trace::Scatter { .. }) => draw_xy(&root, figure, family)?,
    }
    if !figure.traces.is_empty() {
        for annotation in &figure.annotations {
            draw_annotation(&root, annotation, family)?;
        }
    }

    root.present().map_err(draw_err)?;
    info!("Saved chart to {}", path.display());
    Ok(())
}

fn draw_annotation(root: &Area, annotation: &Annotation, family: &str) -> Result<()> {
    let (w, h) = root.dim_in_pixel();
    let style = if annotation.bold { FontStyle::Bold } else { FontStyle::Normal };
    let font = FontDesc::new(FontFamily::Name(family), annotation.font_size as f64, style)
        .color(&parse_color(&annotation.color))
        .pos(Pos::new(HPos::Center, VPos::Center));
    let at = (
        (annotation.x * w as f64) as i32,
        ((1.0 - annotation.y) * h as f64) as i32,
    );
    root.draw(&Text::new(annotation.text.clone(), at, font))
        .map_err(draw_err)
}

fn draw_card(root: &Area, figure: &Figure, family: &str) -> Result<()> {
    root.fill(&parse_color("lightgray")).map_err(draw_err)?;
    let (w, _) = root.dim_in_pixel();
    let title = FontDesc::new(FontFamily::Name(family), 20.0, FontStyle::Normal)
        .color(&parse_color("green"))
        .pos(Pos::new(HPos::Center, VPos::Top));
    root.draw(&Text::new(figure.title.clone(), ((w / 2) as i32, 15), title))
        .map_err(draw_err)?;
    for annotation in &figure.annotations {
        draw_annotation(root, annotation, family)?;
    }
    Ok(())
}

fn draw_pie(root: &Area, figure: &Figure, family: &str) -> Result<()> {
    let Some(Trace::Pie { labels, values, hole }) = figure.traces.first() else {
        return Ok(());
    };
    let area = root
        .titled(&figure.title, (family, 26))
        .map_err(draw_err)?;
    let (w, h) = area.dim_in_pixel();
    let center = ((w / 2) as i32, (h / 2) as i32);
    let radius = (w.min(h) as f64) * 0.38;
    let total: f64 = values.iter().filter(|v| **v > 0.0).sum();
    if total <= 0.0 {
        return Ok(());
    }

    let label_font = (family, 16).into_font().color(&BLACK);
    let mut start = -std::f64::consts::FRAC_PI_2;
    for (i, (label, value)) in labels.iter().zip(values).enumerate() {
        if *value <= 0.0 {
            continue;
        }
        let sweep = value / total * std::f64::consts::TAU;
        let steps = ((sweep / 0.02).ceil() as usize).max(2);
        let mut points = vec![center];
        points.extend((0..=steps).map(|s| {
            let angle = start + sweep * s as f64 / steps as f64;
            (
                center.0 + (radius * angle.cos()) as i32,
                center.1 + (radius * angle.sin()) as i32,
            )
        }));
        area.draw(&Polygon::new(points, palette_color(i).filled()))
            .map_err(draw_err)?;

        let mid = start + sweep / 2.0;
        let at = (
            center.0 + (radius * 1.12 * mid.cos()) as i32,
            center.1 + (radius * 1.12 * mid.sin()) as i32,
        );
        let text = format!("{} ({:.1}%)", label, value / total * 100.0);
        area.draw(&Text::new(text, at, label_font.clone()))
            .map_err(draw_err)?;
        start += sweep;
    }
    if *hole > 0.0 {
        let hole_radius = (radius * hole) as i32;
        area.draw(&Circle::new(center, hole_radius, WHITE.filled()))
            .map_err(draw_err)?;
    }
    Ok(())
}

fn draw_bars(root: &Area, figure: &Figure, family: &str) -> Result<()> {
    let Some(Trace::Bar {
        name,
        categories,
        values,
        colors,
        text,
        text_position,
    }) = figure.traces.first()
    else {
        return Ok(());
    };
    let (y_lo, y_hi) = figure
        .y_axis
        .range
        .unwrap_or_else(|| crate::figure::padded_range(values, 0.1));
    let n = categories.len().max(1);

    let mut chart = ChartBuilder::on(root)
        .caption(&figure.title, (family, 26))
        .margin(15)
        .x_label_area_size(90)
        .y_label_area_size(80)
        .build_cartesian_2d((0..n).into_segmented(), y_lo..y_hi)
        .map_err(draw_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n)
        .x_label_formatter(&|v| match v {
            SegmentValue::CenterOf(i) => categories.get(*i).cloned().unwrap_or_default(),
            _ => String::new(),
        })
        .x_desc(figure.x_axis.title.as_str())
        .y_desc(figure.y_axis.title.as_str())
        .label_style((family, 14))
        .axis_desc_style((family, 18))
        .draw()
        .map_err(draw_err)?;

    let base = parse_color(&figure.style.base_color);
    chart
        .draw_series(values.iter().enumerate().map(|(i, v)| {
            let color = colors.get(i).map(|c| parse_color(c)).unwrap_or(base);
            let mut bar = Rectangle::new(
                [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), *v)],
                color.filled(),
            );
            bar.set_margin(0, 0, 6, 6);
            bar
        }))
        .map_err(draw_err)?
        .label(name.as_str());

    if !text.is_empty() {
        let offset = match text_position {
            TextPosition::Outside => (y_hi - y_lo) * 0.03,
            TextPosition::Inside => -(y_hi - y_lo) * 0.05,
        };
        let font = (family, 15).into_font().color(&BLACK).pos(Pos::new(HPos::Center, VPos::Bottom));
        chart
            .draw_series(text.iter().zip(values).enumerate().map(|(i, (t, v))| {
                Text::new(t.clone(), (SegmentValue::CenterOf(i), v + offset), font.clone())
            }))
            .map_err(draw_err)?;
    }
    Ok(())
}

fn draw_xy(root: &Area, figure: &Figure, family: &str) -> Result<()> {
    let transform = |values: &[f64], log: bool| {
        if log {
            log10_values(values)
        } else {
            values.to_vec()
        }
    };
    let series: Vec<(&str, Vec<f64>, Vec<f64>, ScatterMode, Option<&String>)> = figure
        .traces
        .iter()
        .filter_map(|t| match t {
            Trace::Scatter {
                name,
                x,
                y,
                mode,
                color,
                ..
            } => Some((
                name.as_str(),
                transform(x, figure.x_axis.log),
                transform(y, figure.y_axis.log),
                *mode,
                color.as_ref(),
            )),
            _ => None,
        })
        .collect();

    let (x_lo, x_hi) = match figure.x_axis.range {
        Some(r) if !figure.x_axis.log => r,
        _ => data_range(series.iter().flat_map(|s| s.1.iter())),
    };
    let (y_lo, y_hi) = match figure.y_axis.range {
        Some(r) if !figure.y_axis.log => r,
        _ => data_range(series.iter().flat_map(|s| s.2.iter())),
    };

    let mut chart = ChartBuilder::on(root)
        .caption(&figure.title, (family, 26))
        .margin(15)
        .x_label_area_size(60)
        .y_label_area_size(90)
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)
        .map_err(draw_err)?;

    let x_log = figure.x_axis.log;
    let y_log = figure.y_axis.log;
    let x_fmt = move |v: &f64| if x_log { format!("1e{:.1}", v) } else { format!("{}", v) };
    let y_fmt = move |v: &f64| if y_log { format!("1e{:.1}", v) } else { format!("{:.1}", v) };
    chart
        .configure_mesh()
        .x_desc(figure.x_axis.title.as_str())
        .y_desc(figure.y_axis.title.as_str())
        .x_label_formatter(&x_fmt)
        .y_label_formatter(&y_fmt)
        .label_style((family, 14))
        .axis_desc_style((family, 18))
        .draw()
        .map_err(draw_err)?;

    for (i, (name, xs, ys, mode, color)) in series.iter().enumerate() {
        let color = color.map(|c| parse_color(c)).unwrap_or_else(|| palette_color(i));
        let points: Vec<(f64, f64)> = xs
            .iter()
            .zip(ys)
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .map(|(x, y)| (*x, *y))
            .collect();
        debug!("Drawing series {} with {} points", name, points.len());

        if matches!(mode, ScatterMode::Lines | ScatterMode::LinesMarkers) {
            chart
                .draw_series(LineSeries::new(points.clone(), color.stroke_width(2)))
                .map_err(draw_err)?
                .label(*name)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        }
        if matches!(mode, ScatterMode::Markers | ScatterMode::LinesMarkers) {
            let drawn = chart
                .draw_series(points.iter().map(|p| Circle::new(*p, 4, color.filled())))
                .map_err(draw_err)?;
            if matches!(mode, ScatterMode::Markers) {
                drawn
                    .label(*name)
                    .legend(move |(x, y)| Circle::new((x + 10, y), 4, color.filled()));
            }
        }
    }

    if series.len() > 1 {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(&BLACK)
            .label_font((family, 14))
            .position(SeriesLabelPosition::UpperLeft)
            .draw()
            .map_err(draw_err)?;
    }
    Ok(())
}

fn draw_3d(root: &Area, figure: &Figure, family: &str) -> Result<()> {
    let series: Vec<(&String, &Vec<f64>, &Vec<f64>, &Vec<f64>, Option<&String>)> = figure
        .traces
        .iter()
        .filter_map(|t| match t {
            Trace::Scatter3d {
                name,
                x,
                y,
                z,
                color,
                ..
            } => Some((name, x, y, z, color.as_ref())),
            _ => None,
        })
        .collect();
    let x_range = data_range(series.iter().flat_map(|s| s.1.iter()));
    let y_range = data_range(series.iter().flat_map(|s| s.2.iter()));
    let z_range = data_range(series.iter().flat_map(|s| s.3.iter()));

    let mut chart = ChartBuilder::on(root)
        .caption(&figure.title, (family, 26))
        .margin(20)
        .build_cartesian_3d(
            x_range.0..x_range.1,
            y_range.0..y_range.1,
            z_range.0..z_range.1,
        )
        .map_err(draw_err)?;
    chart.with_projection(|mut pb| {
        pb.yaw = 0.6;
        pb.pitch = 0.3;
        pb.scale = 0.85;
        pb.into_matrix()
    });
    chart
        .configure_axes()
        .label_style((family, 12))
        .draw()
        .map_err(draw_err)?;

    for (i, (name, xs, ys, zs, color)) in series.iter().enumerate() {
        let color = color.map(|c| parse_color(c)).unwrap_or_else(|| palette_color(i));
        chart
            .draw_series(
                xs.iter()
                    .zip(ys.iter())
                    .zip(zs.iter())
                    .map(|((x, y), z)| Circle::new((*x, *y, *z), 4, color.filled())),
            )
            .map_err(draw_err)?
            .label(name.as_str())
            .legend(move |(x, y)| Circle::new((x + 10, y), 4, color.filled()));
    }
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(&BLACK)
        .label_font((family, 12))
        .position(SeriesLabelPosition::UpperLeft)
        .draw()
        .map_err(draw_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_parse_hex_and_names() {
        assert_eq!(parse_color("#636EFA"), RGBColor(0x63, 0x6E, 0xFA));
        assert_eq!(parse_color("red"), RGBColor(255, 0, 0));
        assert_eq!(parse_color("not a colour"), RGBColor(0, 0, 0));
    }

    #[test]
    fn ranges_are_padded_and_never_empty() {
        assert_eq!(data_range(&[]), (0.0, 1.0));
        assert_eq!(data_range(&[3.0, 3.0]), (2.0, 4.0));
        let (lo, hi) = data_range(&[0.0, 10.0, f64::NAN]);
        assert!((lo + 0.5).abs() < 1e-12 && (hi - 10.5).abs() < 1e-12);
    }

    #[test]
    fn log_transform_drops_non_positive() {
        let v = log10_values(&[100.0, 0.0, -1.0]);
        assert_eq!(v[0], 2.0);
        assert!(v[1].is_nan() && v[2].is_nan());
    }
}
