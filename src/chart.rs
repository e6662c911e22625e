use csv::Reader;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::Path;

const VIEWBOX_WIDTH: f64 = 100.0;
const VIEWBOX_HEIGHT: f64 = 100.0;
/// Fraction of the height kept free above the highest point.
const HEADROOM: f64 = 20.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub date: String,
    pub points: i64,
}

pub fn load_points<P: AsRef<Path>>(path: P) -> Result<Vec<ChartPoint>, Box<dyn Error>> {
    let mut rdr = Reader::from_path(path)?;
    let mut points = Vec::new();
    for result in rdr.deserialize() {
        points.push(result?);
    }
    Ok(points)
}

/// Min-max scale the series into the 100x100 viewbox. A flat series uses a
/// range of 1 so it sits on the baseline instead of dividing by zero.
pub fn scale(data: &[ChartPoint]) -> Vec<(f64, f64)> {
    let Some(max) = data.iter().map(|p| p.points).max() else {
        return Vec::new();
    };
    let min = data.iter().map(|p| p.points).min().unwrap_or(max);
    // i128 so extreme series cannot overflow the subtraction
    let range = match i128::from(max) - i128::from(min) {
        0 => 1.0,
        r => r as f64,
    };
    let steps = data.len().saturating_sub(1).max(1) as f64;

    data.iter()
        .enumerate()
        .map(|(i, p)| {
            let x = i as f64 / steps * VIEWBOX_WIDTH;
            let offset = (i128::from(p.points) - i128::from(min)) as f64;
            let y = VIEWBOX_HEIGHT - offset / range * (VIEWBOX_HEIGHT - HEADROOM);
            (x, y)
        })
        .collect()
}

fn format_points(coords: &[(f64, f64)]) -> String {
    coords
        .iter()
        .map(|(x, y)| format!("{},{}", trim(*x), trim(*y)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn trim(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    format!("{}", rounded)
}

pub fn polyline(data: &[ChartPoint]) -> String {
    format_points(&scale(data))
}

/// Area under the curve, closed along the bottom edge.
pub fn area(data: &[ChartPoint]) -> String {
    format!("0,100 {} 100,100", polyline(data))
}

pub fn render_svg(data: &[ChartPoint]) -> String {
    if data.is_empty() {
        return String::from(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 100 100\">\
             <text x=\"50\" y=\"50\" text-anchor=\"middle\" font-size=\"5\">No progress data available</text>\
             </svg>\n",
        );
    }

    let mut svg = String::from(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 100 100\" preserveAspectRatio=\"none\">\n",
    );
    svg.push_str("  <g opacity=\"0.1\">\n");
    for y in [0, 25, 50, 75, 100] {
        svg.push_str(&format!(
            "    <line x1=\"0\" y1=\"{y}\" x2=\"100\" y2=\"{y}\" stroke=\"currentColor\" stroke-width=\"0.5\"/>\n"
        ));
    }
    svg.push_str("  </g>\n");
    svg.push_str(&format!(
        "  <polygon points=\"{}\" fill=\"#2e7d32\" fill-opacity=\"0.15\"/>\n",
        area(data)
    ));
    svg.push_str(&format!(
        "  <polyline points=\"{}\" fill=\"none\" stroke=\"#2e7d32\" stroke-width=\"2\"/>\n",
        polyline(data)
    ));
    for ((x, y), point) in scale(data).iter().zip(data) {
        svg.push_str(&format!(
            "  <circle cx=\"{}\" cy=\"{}\" r=\"1.5\" fill=\"#2e7d32\"><title>{}: {} pts</title></circle>\n",
            trim(*x),
            trim(*y),
            point.date,
            point.points
        ));
    }
    svg.push_str("</svg>\n");
    svg
}
