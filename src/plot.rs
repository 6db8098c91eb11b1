//! SVG charts for summary tables.
//!
//! Three chart shapes cover every report: horizontal bars (antibiotic
//! frequencies, enrichment barplot), vertical bars (virulence factor
//! categories) and a dot plot (enrichment dotplot).

use crate::error::{Error, Result};
use plotters::prelude::*;
use std::path::Path;

type Rgb = (u8, u8, u8);

fn plot_err<E: std::fmt::Display>(e: E) -> Error {
    Error::Plot(e.to_string())
}

fn axis_max(values: impl Iterator<Item = f64>) -> f64 {
    let max = values.fold(0.0, f64::max);
    if max > 0.0 { max * 1.1 } else { 1.0 }
}

fn check_non_empty<T>(data: &[T]) -> Result<()> {
    if data.is_empty() {
        return Err(Error::validation("nothing to plot: data is empty"));
    }
    Ok(())
}

/// Label of the segment centred at `v`; blank elsewhere.
fn segment_label(labels: &[String], v: &SegmentValue<usize>) -> String {
    match v {
        SegmentValue::CenterOf(i) => labels.get(*i).cloned().unwrap_or_default(),
        _ => String::new(),
    }
}

/// Horizontal bar chart; the first bar is drawn at the top.
pub fn horizontal_bars(
    path: &Path,
    title: &str,
    x_desc: &str,
    bars: &[(String, f64)],
    color: Rgb,
) -> Result<()> {
    check_non_empty(bars)?;
    let n = bars.len();
    // Segment 0 is the bottom row.
    let labels: Vec<String> = bars.iter().rev().map(|(l, _)| l.clone()).collect();
    let x_max = axis_max(bars.iter().map(|(_, v)| *v));

    let root = SVGBackend::new(path, (1000, 120 + 30 * n as u32)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(240)
        .build_cartesian_2d(0f64..x_max, (0..n).into_segmented())
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(n)
        .y_label_formatter(&|v| segment_label(&labels, v))
        .x_desc(x_desc)
        .draw()
        .map_err(plot_err)?;

    let (r, g, b) = color;
    chart
        .draw_series(bars.iter().enumerate().map(|(i, (_, value))| {
            let row = n - 1 - i;
            let mut bar = Rectangle::new(
                [(0.0, SegmentValue::Exact(row)), (*value, SegmentValue::Exact(row + 1))],
                RGBColor(r, g, b).filled(),
            );
            bar.set_margin(4, 4, 0, 0);
            bar
        }))
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    log::info!("Plot saved: {}", path.display());
    Ok(())
}

/// Vertical bar chart with one labelled bar per category.
pub fn vertical_bars(
    path: &Path,
    title: &str,
    y_desc: &str,
    bars: &[(String, f64)],
    color: Rgb,
) -> Result<()> {
    check_non_empty(bars)?;
    let n = bars.len();
    let labels: Vec<String> = bars.iter().map(|(l, _)| l.clone()).collect();
    let y_max = axis_max(bars.iter().map(|(_, v)| *v)).max(10.0);

    let root = SVGBackend::new(path, (1400, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(120)
        .y_label_area_size(60)
        .build_cartesian_2d((0..n).into_segmented(), 0f64..y_max)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n)
        .x_label_formatter(&|v| segment_label(&labels, v))
        .y_desc(y_desc)
        .draw()
        .map_err(plot_err)?;

    let (r, g, b) = color;
    chart
        .draw_series(bars.iter().enumerate().map(|(i, (_, value))| {
            let mut bar = Rectangle::new(
                [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), *value)],
                RGBColor(r, g, b).filled(),
            );
            bar.set_margin(0, 0, 6, 6);
            bar
        }))
        .map_err(plot_err)?;

    chart
        .draw_series(bars.iter().enumerate().map(|(i, (_, value))| {
            Text::new(
                format!("{:.1}%", value),
                (SegmentValue::CenterOf(i), *value),
                ("sans-serif", 12),
            )
        }))
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    log::info!("Plot saved: {}", path.display());
    Ok(())
}

/// Dot plot: x is the value, dot radius scales with `size`.
///
/// Points are `(label, value, size)`; the first point is drawn at the top.
pub fn dot_plot(path: &Path, title: &str, x_desc: &str, points: &[(String, f64, f64)]) -> Result<()> {
    check_non_empty(points)?;
    let n = points.len();
    let labels: Vec<String> = points.iter().rev().map(|(l, _, _)| l.clone()).collect();
    let x_max = axis_max(points.iter().map(|(_, v, _)| *v));
    let size_max = points.iter().map(|(_, _, s)| *s).fold(0.0, f64::max).max(1.0);
    let value_max = points.iter().map(|(_, v, _)| *v).fold(0.0, f64::max).max(f64::EPSILON);

    let root = SVGBackend::new(path, (1000, 120 + 40 * n as u32)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(240)
        .build_cartesian_2d(0f64..x_max, (0..n).into_segmented())
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .y_labels(n)
        .y_label_formatter(&|v| segment_label(&labels, v))
        .x_desc(x_desc)
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(points.iter().enumerate().map(|(i, (_, value, size))| {
            let radius = (4.0 + 12.0 * size / size_max) as i32;
            let t = value / value_max;
            // Blue (low) to yellow (high).
            let color = RGBColor(
                (68.0 + t * (253.0 - 68.0)) as u8,
                (1.0 + t * (231.0 - 1.0)) as u8,
                (84.0 + t * (37.0 - 84.0)) as u8,
            );
            Circle::new((*value, SegmentValue::CenterOf(n - 1 - i)), radius, color.filled())
        }))
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    log::info!("Plot saved: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bars() -> Vec<(String, f64)> {
        vec![("Penicillin".to_string(), 66.7), ("Tetracycline".to_string(), 33.3)]
    }

    #[test]
    fn test_horizontal_bars_writes_svg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bars.svg");
        horizontal_bars(&path, "Antibiotics", "Frequency (%)", &bars(), (0, 128, 0)).unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Penicillin"));
    }

    #[test]
    fn test_vertical_bars_and_dots() {
        let dir = tempfile::tempdir().unwrap();
        vertical_bars(&dir.path().join("v.svg"), "VF", "Percentage", &bars(), (31, 119, 180)).unwrap();
        let points = vec![("Glycolysis".to_string(), 3.2, 4.0), ("TCA".to_string(), 1.5, 2.0)];
        dot_plot(&dir.path().join("d.svg"), "Enrichment", "-log10(AdjP)", &points).unwrap();
        assert!(dir.path().join("d.svg").exists());
    }

    #[test]
    fn test_empty_data_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = horizontal_bars(&dir.path().join("x.svg"), "t", "x", &[], (0, 0, 0)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
