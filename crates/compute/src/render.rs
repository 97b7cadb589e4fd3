//! Chart rendering into in-memory PNGs.
//!
//! Charts are drawn with plotters' bitmap backend into an RGB buffer and
//! PNG-encoded. No text is drawn (the bitmap backend has no font source
//! here); the figure title travels alongside the image instead.

use std::ops::Range;

use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;

use alarmlog_core::config::RenderConfig;
use alarmlog_core::{AlarmLogError, Result};

use crate::algorithms::decomposition::Decomposition;
use crate::outcome::Figure;

type Panel<'a> = DrawingArea<BitMapBackend<'a>, Shift>;
type Chart<'a, 'b> = ChartContext<'a, BitMapBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

const SERIES: RGBColor = RGBColor(31, 119, 180);
const ACCENT: RGBColor = RGBColor(214, 39, 40);
const MUTED: RGBColor = RGBColor(127, 127, 127);
const CLUSTER_COLORS: [RGBColor; 8] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(188, 189, 34),
    RGBColor(23, 190, 207),
];

fn render_err<E: std::fmt::Display>(e: E) -> AlarmLogError {
    AlarmLogError::Render(e.to_string())
}

/// Renders the engines' charts at a fixed pixel size.
#[derive(Debug, Clone)]
pub struct Renderer {
    width: u32,
    height: u32,
}

impl Renderer {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            width: config.width.max(64),
            height: config.height.max(64),
        }
    }

    /// Reconstruction error per window, the threshold line, and flagged windows.
    pub fn error_curve(&self, errors: &[f64], threshold: f64, flags: &[bool]) -> Result<Figure> {
        self.render("Reconstruction error vs threshold", 1, |panels| {
            let ys = errors.iter().copied().chain(std::iter::once(threshold));
            let mut chart = cartesian(&panels[0], index_range(errors.len()), value_range(ys))?;
            frame(&mut chart)?;
            hline(&mut chart, threshold, ACCENT)?;
            chart
                .draw_series(LineSeries::new(indexed(errors), SERIES.stroke_width(2)))
                .map_err(render_err)?;
            chart
                .draw_series(
                    indexed(errors)
                        .zip(flags)
                        .filter(|(_, flag)| **flag)
                        .map(|(p, _)| Circle::new(p, 4, ACCENT.filled())),
                )
                .map_err(render_err)?;
            Ok(())
        })
    }

    /// 2-D embedding coloured by cluster, with a cross at each cluster's mean.
    pub fn cluster_scatter(&self, points: &[[f64; 2]], clusters: &[usize]) -> Result<Figure> {
        self.render("Latent space clusters (t-SNE)", 1, |panels| {
            let x = value_range(points.iter().map(|p| p[0]));
            let y = value_range(points.iter().map(|p| p[1]));
            let mut chart = cartesian(&panels[0], x, y)?;
            frame(&mut chart)?;
            chart
                .draw_series(points.iter().zip(clusters).map(|(p, &c)| {
                    Circle::new((p[0], p[1]), 3, cluster_color(c).mix(0.7).filled())
                }))
                .map_err(render_err)?;

            let k = clusters.iter().copied().max().map_or(0, |m| m + 1);
            let mut sums = vec![(0.0, 0.0, 0usize); k];
            for (p, &c) in points.iter().zip(clusters) {
                sums[c].0 += p[0];
                sums[c].1 += p[1];
                sums[c].2 += 1;
            }
            chart
                .draw_series(sums.iter().filter(|s| s.2 > 0).map(|&(sx, sy, n)| {
                    Cross::new((sx / n as f64, sy / n as f64), 8, BLACK.stroke_width(3))
                }))
                .map_err(render_err)?;
            Ok(())
        })
    }

    pub fn history(&self, values: &[f64]) -> Result<Figure> {
        self.render("Historical daily alarm counts", 1, |panels| {
            let mut chart = cartesian(
                &panels[0],
                index_range(values.len()),
                value_range(values.iter().copied()),
            )?;
            frame(&mut chart)?;
            chart
                .draw_series(LineSeries::new(indexed(values), SERIES.stroke_width(2)))
                .map_err(render_err)?;
            Ok(())
        })
    }

    /// History followed by the forecast mean and its confidence band.
    pub fn forecast(&self, history: &[f64], mean: &[f64], lower: &[f64], upper: &[f64]) -> Result<Figure> {
        self.render("Forecast with confidence interval", 1, |panels| {
            let n = history.len();
            let ys = history.iter().chain(lower).chain(upper).chain(mean).copied();
            let mut chart = cartesian(&panels[0], index_range(n + mean.len()), value_range(ys))?;
            frame(&mut chart)?;

            let band: Vec<(f64, f64)> = offset(upper, n)
                .chain(offset(lower, n).collect::<Vec<_>>().into_iter().rev())
                .collect();
            if band.len() >= 3 {
                chart
                    .draw_series(std::iter::once(Polygon::new(band, ACCENT.mix(0.2).filled())))
                    .map_err(render_err)?;
            }
            chart
                .draw_series(LineSeries::new(indexed(history), SERIES.stroke_width(2)))
                .map_err(render_err)?;
            // Join the forecast to the last observation.
            let joined = history
                .last()
                .map(|&v| ((n - 1) as f64, v))
                .into_iter()
                .chain(offset(mean, n));
            chart
                .draw_series(LineSeries::new(joined, ACCENT.stroke_width(2)))
                .map_err(render_err)?;
            Ok(())
        })
    }

    /// Observed, trend, seasonal and residual panels stacked vertically.
    pub fn decomposition(&self, decomposition: &Decomposition) -> Result<Figure> {
        self.render("Additive seasonal decomposition", 4, |panels| {
            let n = decomposition.observed.len();
            let observed: Vec<Option<f64>> = decomposition.observed.iter().copied().map(Some).collect();
            let seasonal: Vec<Option<f64>> = decomposition.seasonal.iter().copied().map(Some).collect();
            let components = [
                &observed,
                &decomposition.trend,
                &seasonal,
                &decomposition.residual,
            ];
            for (panel, component) in panels.iter().zip(components) {
                let defined: Vec<(f64, f64)> = component
                    .iter()
                    .enumerate()
                    .filter_map(|(i, v)| v.map(|v| (i as f64, v)))
                    .filter(|(_, v)| v.is_finite())
                    .collect();
                let mut chart = cartesian(panel, index_range(n), value_range(defined.iter().map(|p| p.1)))?;
                frame(&mut chart)?;
                chart
                    .draw_series(LineSeries::new(defined, SERIES.stroke_width(1)))
                    .map_err(render_err)?;
            }
            Ok(())
        })
    }

    /// Standardized residuals over time and their autocorrelation bars with
    /// the approximate 95% white-noise band.
    pub fn diagnostics(&self, standardized: &[f64], acf: &[f64]) -> Result<Figure> {
        self.render("Model diagnostics", 2, |panels| {
            let mut chart = cartesian(
                &panels[0],
                index_range(standardized.len()),
                value_range(standardized.iter().copied().chain([-2.0, 2.0])),
            )?;
            frame(&mut chart)?;
            hline(&mut chart, 0.0, MUTED)?;
            chart
                .draw_series(LineSeries::new(indexed(standardized), SERIES.stroke_width(1)))
                .map_err(render_err)?;

            let bound = 1.96 / (standardized.len().max(1) as f64).sqrt();
            let x = -0.5..acf.len() as f64 + 0.5;
            let mut chart = cartesian(&panels[1], x, value_range(acf.iter().copied().chain([-bound, bound, 0.0])))?;
            frame(&mut chart)?;
            hline(&mut chart, bound, ACCENT)?;
            hline(&mut chart, -bound, ACCENT)?;
            hline(&mut chart, 0.0, MUTED)?;
            chart
                .draw_series(acf.iter().enumerate().map(|(i, &v)| {
                    let lag = (i + 1) as f64;
                    Rectangle::new([(lag - 0.3, 0.0), (lag + 0.3, v)], SERIES.filled())
                }))
                .map_err(render_err)?;
            Ok(())
        })
    }

    /// Secondary forecaster: history, in-sample fit, and projection.
    pub fn secondary_forecast(&self, history: &[f64], fitted: &[f64], forecast: &[f64]) -> Result<Figure> {
        self.render("Holt-Winters forecast", 1, |panels| {
            let n = history.len();
            let ys = history.iter().chain(fitted).chain(forecast).copied();
            let mut chart = cartesian(&panels[0], index_range(n + forecast.len()), value_range(ys))?;
            frame(&mut chart)?;
            chart
                .draw_series(LineSeries::new(indexed(history), SERIES.stroke_width(2)))
                .map_err(render_err)?;
            chart
                .draw_series(LineSeries::new(indexed(fitted), MUTED.stroke_width(1)))
                .map_err(render_err)?;
            chart
                .draw_series(LineSeries::new(offset(forecast, n), ACCENT.stroke_width(2)))
                .map_err(render_err)?;
            Ok(())
        })
    }

    /// Draw `panels` stacked rows into one PNG.
    fn render<F>(&self, title: &str, panels: usize, draw: F) -> Result<Figure>
    where
        F: FnOnce(&[Panel<'_>]) -> Result<()>,
    {
        let (w, h) = (self.width, self.height * panels.clamp(1, 2) as u32);
        let mut buf = vec![0u8; w as usize * h as usize * 3];
        {
            let root = BitMapBackend::with_buffer(&mut buf, (w, h)).into_drawing_area();
            root.fill(&WHITE).map_err(render_err)?;
            let areas = root.split_evenly((panels.max(1), 1));
            draw(&areas)?;
            root.present().map_err(render_err)?;
        }
        let png = encode_png(&buf, w, h)?;
        Ok(Figure::from_png(title, &png))
    }
}

fn encode_png(rgb: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut encoder = png::Encoder::new(&mut out, width, height);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header().map_err(render_err)?;
    writer.write_image_data(rgb).map_err(render_err)?;
    writer.finish().map_err(render_err)?;
    Ok(out)
}

fn cartesian<'a, 'b>(panel: &'a Panel<'b>, x: Range<f64>, y: Range<f64>) -> Result<Chart<'a, 'b>> {
    ChartBuilder::on(panel)
        .margin(12)
        .build_cartesian_2d(x, y)
        .map_err(render_err)
}

/// Plot-area border in place of axes.
fn frame(chart: &mut Chart<'_, '_>) -> Result<()> {
    let (x, y) = (chart.x_range(), chart.y_range());
    chart
        .draw_series(std::iter::once(Rectangle::new(
            [(x.start, y.start), (x.end, y.end)],
            MUTED.stroke_width(1),
        )))
        .map_err(render_err)?;
    Ok(())
}

fn hline(chart: &mut Chart<'_, '_>, y: f64, color: RGBColor) -> Result<()> {
    let x = chart.x_range();
    chart
        .draw_series(LineSeries::new([(x.start, y), (x.end, y)], color.stroke_width(1)))
        .map_err(render_err)?;
    Ok(())
}

fn cluster_color(cluster: usize) -> RGBColor {
    CLUSTER_COLORS[cluster % CLUSTER_COLORS.len()]
}

fn indexed(values: &[f64]) -> impl Iterator<Item = (f64, f64)> + '_ {
    offset(values, 0)
}

fn offset(values: &[f64], start: usize) -> impl Iterator<Item = (f64, f64)> + '_ {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .map(move |(i, &v)| ((start + i) as f64, v))
}

fn index_range(len: usize) -> Range<f64> {
    0.0..(len.max(2) - 1) as f64
}

/// Finite min..max of `values`, padded by 5%; never empty.
fn value_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() {
        return 0.0..1.0;
    }
    if hi - lo < 1e-12 {
        return lo - 1.0..hi + 1.0;
    }
    let pad = (hi - lo) * 0.05;
    lo - pad..hi + pad
}
