use std::f64::consts::{FRAC_PI_2, TAU};
use std::fmt::{self, Write as _};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

pub const CHART_FILE: &str = "plot.svg";

const WIDTH: f64 = 1000.0;
const HEIGHT: f64 = 500.0;
const RADIUS: f64 = 200.0;
const CENTER_X: f64 = 260.0;
const CENTER_Y: f64 = 270.0;
const LEGEND_X: f64 = 520.0;
const LEGEND_ROW: f64 = 22.0;

// matplotlib "tab10"
const PALETTE: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSlice {
    pub label: String,
    pub value: f64,
}

/// Draws the proportional cluster chart for a select stage.
pub trait ChartRenderer {
    fn render(&self, title: &str, slices: &[ChartSlice], path: &Path) -> Result<()>;
}

/// Pie chart written as a standalone SVG document.
#[derive(Debug, Clone, Copy, Default)]
pub struct SvgPieChart;

impl ChartRenderer for SvgPieChart {
    fn render(&self, title: &str, slices: &[ChartSlice], path: &Path) -> Result<()> {
        let svg = pie_svg(title, slices).context("failed to format chart")?;
        fs::write(path, svg).with_context(|| format!("failed to write chart: {}", path.display()))
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

fn point(angle: f64) -> (f64, f64) {
    (
        CENTER_X + RADIUS * angle.cos(),
        CENTER_Y + RADIUS * angle.sin(),
    )
}

/// Standalone SVG document for `slices`, each slice proportional to its value.
pub fn pie_svg(title: &str, slices: &[ChartSlice]) -> Result<String, fmt::Error> {
    let total: f64 = slices
        .iter()
        .map(|slice| slice.value.max(0.0))
        .filter(|value| value.is_finite())
        .sum();

    let mut svg = String::new();
    writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}">"#
    )?;
    writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#)?;
    writeln!(
        svg,
        r#"<text x="{}" y="32" font-family="sans-serif" font-size="20" text-anchor="middle">{}</text>"#,
        WIDTH / 2.0,
        escape(title)
    )?;

    if total <= 0.0 {
        writeln!(
            svg,
            r##"<circle cx="{CENTER_X}" cy="{CENTER_Y}" r="{RADIUS}" fill="none" stroke="#999999"/>"##
        )?;
    }

    let mut start = -FRAC_PI_2;
    for (index, slice) in slices.iter().enumerate() {
        let color = PALETTE[index % PALETTE.len()];
        let value = slice.value.max(0.0);
        if total > 0.0 && value.is_finite() && value > 0.0 {
            let fraction = value / total;
            if fraction >= 1.0 - f64::EPSILON {
                writeln!(
                    svg,
                    r#"<circle cx="{CENTER_X}" cy="{CENTER_Y}" r="{RADIUS}" fill="{color}" stroke="white"/>"#
                )?;
            } else {
                let end = start + fraction * TAU;
                let (x0, y0) = point(start);
                let (x1, y1) = point(end);
                let large_arc = u8::from(fraction > 0.5);
                writeln!(
                    svg,
                    r#"<path d="M {CENTER_X} {CENTER_Y} L {x0:.3} {y0:.3} A {RADIUS} {RADIUS} 0 {large_arc} 1 {x1:.3} {y1:.3} Z" fill="{color}" stroke="white"/>"#
                )?;

                let (label_x, label_y) = {
                    let middle = start + fraction * TAU / 2.0;
                    (
                        CENTER_X + RADIUS * 0.6 * middle.cos(),
                        CENTER_Y + RADIUS * 0.6 * middle.sin(),
                    )
                };
                writeln!(
                    svg,
                    r#"<text x="{label_x:.3}" y="{label_y:.3}" font-family="sans-serif" font-size="12" text-anchor="middle">{:.1}%</text>"#,
                    fraction * 100.0
                )?;
                start = end;
            }
        }

        let row_y = 70.0 + index as f64 * LEGEND_ROW;
        writeln!(
            svg,
            r#"<rect x="{LEGEND_X}" y="{:.1}" width="14" height="14" fill="{color}"/>"#,
            row_y - 11.0
        )?;
        writeln!(
            svg,
            r#"<text x="{:.1}" y="{row_y:.1}" font-family="sans-serif" font-size="13">{} ({:.1}%)</text>"#,
            LEGEND_X + 22.0,
            escape(&slice.label),
            slice.value
        )?;
    }

    svg.push_str("</svg>\n");
    Ok(svg)
}
