//! Time-series charts of material groups
//!
//! One stacked SVG document per run, with a panel per (group, scope): the
//! cross-region total (`for all regions`) and the per-region breakdown
//! (`by region`). Each panel plots `amount` against `start_date`, one line
//! per region, or per region and metric when several metrics were fetched.

use crate::error::Result;
use crate::persist::write_atomic;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use spending_core::aggregation::{
    DEFAULT_MATERIALITY_THRESHOLD, assert_uniform_unit, select_material_groups,
};
use spending_core::types::{Dataset, Observation};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of the rendered document inside the dated output directory
pub const CHART_FILE_NAME: &str = "spending-by-region.svg";

/// Qualitative "Paired" palette, assigned to regions in first-seen order
const PALETTE: [&str; 12] = [
    "#1f78b4", "#33a02c", "#e31a1c", "#ff7f00", "#6a3d9a", "#b15928", "#a6cee3", "#b2df8a",
    "#fb9a99", "#fdbf6f", "#cab2d6", "#ffff99",
];

/// Dash patterns distinguishing metrics within one region color
const DASHES: [&str; 4] = ["", "6 3", "2 2", "8 2 2 2"];

const WIDTH: f64 = 960.0;
const PANEL_HEIGHT: f64 = 300.0;
const MARGIN_LEFT: f64 = 80.0;
const MARGIN_RIGHT: f64 = 180.0;
const MARGIN_TOP: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 80.0;

/// Which rows a panel shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Rows of the `all` sentinel region
    AllRegions,
    /// Rows of every real region
    ByRegion,
}

impl Scope {
    /// Both scopes in panel order
    pub const ALL: [Scope; 2] = [Scope::AllRegions, Scope::ByRegion];

    /// Panel title suffix
    pub fn title(&self) -> &'static str {
        match self {
            Self::AllRegions => "for all regions",
            Self::ByRegion => "by region",
        }
    }

    fn contains(&self, obs: &Observation) -> bool {
        match self {
            Self::AllRegions => obs.is_total(),
            Self::ByRegion => !obs.is_total(),
        }
    }
}

/// One line of a panel
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    /// Legend label
    pub label: String,
    /// Stroke color
    pub color: &'static str,
    /// Stroke dash pattern, empty for solid
    pub dash: &'static str,
    /// `(start_date, amount)` in time order
    pub points: Vec<(NaiveDateTime, f64)>,
}

/// One subplot
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    /// Group shown
    pub group: String,
    /// Rows shown
    pub scope: Scope,
    /// Lines, in first-seen order
    pub series: Vec<Series>,
}

impl Panel {
    /// Title as rendered above the panel
    pub fn title(&self) -> String {
        format!("AWS cost group {} {}", self.group, self.scope.title())
    }
}

/// Build panels for every material group, skipping empty scopes
///
/// Groups appear in first-seen dataset order; within a group the total scope
/// comes before the per-region scope.
pub fn build_panels(dataset: &Dataset, material: &BTreeSet<String>) -> Vec<Panel> {
    let region_colors: HashMap<&str, &'static str> = dataset
        .regions()
        .into_iter()
        .enumerate()
        .map(|(i, region)| (region, PALETTE[i % PALETTE.len()]))
        .collect();
    let metrics = dataset.metrics();
    let metric_dashes: HashMap<&str, &'static str> = metrics
        .iter()
        .enumerate()
        .map(|(i, metric)| (*metric, DASHES[i % DASHES.len()]))
        .collect();
    let label_metrics = metrics.len() > 1;

    let mut panels = Vec::new();
    for group in dataset.groups() {
        if !material.contains(group) {
            continue;
        }
        for scope in Scope::ALL {
            let mut series: Vec<Series> = Vec::new();
            for obs in dataset
                .iter()
                .filter(|o| o.group == group && scope.contains(o))
            {
                let label = if label_metrics {
                    format!("{} / {}", obs.region, obs.metric)
                } else {
                    obs.region.clone()
                };
                let point = (obs.start_date.at(), obs.amount.to_f64().unwrap_or_default());
                match series.iter_mut().find(|s| s.label == label) {
                    Some(existing) => existing.points.push(point),
                    None => series.push(Series {
                        label,
                        color: region_colors.get(obs.region.as_str()).copied().unwrap_or(PALETTE[0]),
                        dash: metric_dashes.get(obs.metric.as_str()).copied().unwrap_or(""),
                        points: vec![point],
                    }),
                }
            }

            if series.is_empty() {
                debug!("No rows for {} {}, skipping panel", group, scope.title());
                continue;
            }
            for s in &mut series {
                s.points.sort_by(|a, b| a.0.cmp(&b.0));
            }
            panels.push(Panel {
                group: group.to_string(),
                scope,
                series,
            });
        }
    }
    panels
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Round a positive span up to a 1/2/5 × 10^n step for `target` ticks
fn nice_step(span: f64, target: f64) -> f64 {
    let raw = span / target;
    let magnitude = 10f64.powf(raw.log10().floor());
    let residual = raw / magnitude;
    let nice = if residual > 5.0 {
        10.0
    } else if residual > 2.0 {
        5.0
    } else if residual > 1.0 {
        2.0
    } else {
        1.0
    };
    nice * magnitude
}

fn render_panel(svg: &mut String, panel: &Panel, unit: &str, top: f64) {
    let plot_w = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_h = PANEL_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let left = MARGIN_LEFT;
    let plot_top = top + MARGIN_TOP;
    let bottom = plot_top + plot_h;

    let points = panel.series.iter().flat_map(|s| s.points.iter());
    let (mut x_min, mut x_max) = (i64::MAX, i64::MIN);
    let (mut y_min, mut y_max) = (0f64, 0f64);
    for (at, amount) in points {
        let ts = at.and_utc().timestamp();
        x_min = x_min.min(ts);
        x_max = x_max.max(ts);
        y_min = y_min.min(*amount);
        y_max = y_max.max(*amount);
    }
    if y_max <= y_min {
        y_max = y_min + 1.0;
    }
    let step = nice_step(y_max - y_min, 5.0);
    let y_lo = (y_min / step).floor() * step;
    let y_hi = (y_max / step).ceil() * step;

    let x_of = |ts: i64| {
        if x_max == x_min {
            left + plot_w / 2.0
        } else {
            left + (ts - x_min) as f64 / (x_max - x_min) as f64 * plot_w
        }
    };
    let y_of = |v: f64| bottom - (v - y_lo) / (y_hi - y_lo) * plot_h;

    svg.push_str(&format!(
        "<text x=\"{:.1}\" y=\"{:.1}\" font-size=\"15\" font-weight=\"bold\">{}</text>\n",
        left,
        top + 24.0,
        escape(&panel.title())
    ));
    svg.push_str(&format!(
        "<rect x=\"{left:.1}\" y=\"{plot_top:.1}\" width=\"{plot_w:.1}\" height=\"{plot_h:.1}\" fill=\"#eaeaf2\"/>\n"
    ));

    let mut tick = y_lo;
    while tick <= y_hi + step / 2.0 {
        let y = y_of(tick);
        svg.push_str(&format!(
            "<line x1=\"{left:.1}\" y1=\"{y:.1}\" x2=\"{:.1}\" y2=\"{y:.1}\" stroke=\"#ffffff\"/>\n\
             <text x=\"{:.1}\" y=\"{:.1}\" font-size=\"11\" text-anchor=\"end\">{}</text>\n",
            left + plot_w,
            left - 6.0,
            y + 4.0,
            format_tick(tick, step)
        ));
        tick += step;
    }
    svg.push_str(&format!(
        "<text x=\"{:.1}\" y=\"{:.1}\" font-size=\"12\" text-anchor=\"middle\" transform=\"rotate(-90 {:.1} {:.1})\">Amount ({})</text>\n",
        left - 56.0,
        plot_top + plot_h / 2.0,
        left - 56.0,
        plot_top + plot_h / 2.0,
        escape(unit)
    ));

    let mut dates: Vec<NaiveDateTime> = panel
        .series
        .iter()
        .flat_map(|s| s.points.iter().map(|(at, _)| *at))
        .collect();
    dates.sort();
    dates.dedup();
    let stride = dates.len().div_ceil(30).max(1);
    for at in dates.iter().step_by(stride) {
        let x = x_of(at.and_utc().timestamp());
        svg.push_str(&format!(
            "<text x=\"{x:.1}\" y=\"{:.1}\" font-size=\"10\" text-anchor=\"end\" transform=\"rotate(-90 {x:.1} {:.1})\">{}</text>\n",
            bottom + 6.0,
            bottom + 6.0,
            at.format("%Y-%m-%d")
        ));
    }

    for (i, series) in panel.series.iter().enumerate() {
        let path: Vec<String> = series
            .points
            .iter()
            .map(|(at, v)| format!("{:.1},{:.1}", x_of(at.and_utc().timestamp()), y_of(*v)))
            .collect();
        let dash = if series.dash.is_empty() {
            String::new()
        } else {
            format!(" stroke-dasharray=\"{}\"", series.dash)
        };
        svg.push_str(&format!(
            "<polyline fill=\"none\" stroke=\"{}\" stroke-width=\"1.5\"{dash} points=\"{}\"/>\n",
            series.color,
            path.join(" ")
        ));
        for point in &path {
            if let Some((x, y)) = point.split_once(',') {
                svg.push_str(&format!(
                    "<circle cx=\"{x}\" cy=\"{y}\" r=\"2.5\" fill=\"{}\"/>\n",
                    series.color
                ));
            }
        }

        let legend_x = left + plot_w + 16.0;
        let legend_y = plot_top + 14.0 + i as f64 * 18.0;
        svg.push_str(&format!(
            "<line x1=\"{legend_x:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" stroke=\"{}\" stroke-width=\"2\"{dash}/>\n\
             <text x=\"{:.1}\" y=\"{legend_y:.1}\" font-size=\"11\">{}</text>\n",
            legend_y - 4.0,
            legend_x + 20.0,
            legend_y - 4.0,
            series.color,
            legend_x + 26.0,
            escape(&series.label)
        ));
    }
}

fn format_tick(value: f64, step: f64) -> String {
    if step >= 1.0 {
        format!("{value:.0}")
    } else {
        let decimals = (-step.log10()).ceil() as usize;
        format!("{value:.decimals$}")
    }
}

/// Render panels into one stacked SVG document
pub fn render_svg(panels: &[Panel], unit: &str) -> String {
    let height = (panels.len().max(1) as f64) * PANEL_HEIGHT;
    let mut svg = format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{WIDTH:.0}\" height=\"{height:.0}\" \
         viewBox=\"0 0 {WIDTH:.0} {height:.0}\" font-family=\"sans-serif\">\n\
         <rect width=\"100%\" height=\"100%\" fill=\"#ffffff\"/>\n"
    );
    for (i, panel) in panels.iter().enumerate() {
        render_panel(&mut svg, panel, unit, i as f64 * PANEL_HEIGHT);
    }
    svg.push_str("</svg>\n");
    svg
}

/// Renders a reloaded dataset into the dated output directory
#[derive(Debug, Clone)]
pub struct ChartRenderer {
    outdir: PathBuf,
    as_of: NaiveDate,
    threshold: Decimal,
}

impl ChartRenderer {
    /// Create a renderer writing under `outdir/<as_of>/`
    pub fn new(outdir: impl Into<PathBuf>, as_of: NaiveDate) -> Self {
        Self {
            outdir: outdir.into(),
            as_of,
            threshold: DEFAULT_MATERIALITY_THRESHOLD,
        }
    }

    /// Override the materiality threshold
    pub fn with_threshold(mut self, threshold: Decimal) -> Self {
        self.threshold = threshold;
        self
    }

    /// Dated directory the document is written to
    pub fn output_dir(&self) -> PathBuf {
        self.outdir.join(self.as_of.format("%Y-%m-%d").to_string())
    }

    /// Check units, select material groups, and write the document
    ///
    /// Returns the path of the written SVG.
    pub fn render(&self, dataset: &Dataset) -> Result<PathBuf> {
        let unit = assert_uniform_unit(dataset)?;
        let material = select_material_groups(dataset, self.threshold)?;
        let panels = build_panels(dataset, &material);
        info!(
            "Plotting {} panels for {} material groups",
            panels.len(),
            material.len()
        );

        let dir = self.output_dir();
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(CHART_FILE_NAME);
        write_atomic(&path, render_svg(&panels, &unit).as_bytes())?;
        info!("Saved chart to {}", path.display());
        Ok(path)
    }

    /// Root output directory
    pub fn outdir(&self) -> &Path {
        &self.outdir
    }
}
