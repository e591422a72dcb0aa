//! Gaussian kernel density estimation used to compare empirical distributions across algorithms.

use std::collections::BTreeMap;
use std::path::Path;

use log::warn;
use serde::Serialize;

use crate::config::ComparisonConfig;
use crate::error::{ExperimentError, Result};
use crate::metrics::collector::EstimatorWrapper;

/// 1 / sqrt(2 * pi)
const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DensityEstimate {
    /// Strictly increasing support points.
    pub grid: Vec<f64>,
    /// Density at each grid point, same length as `grid`.
    pub density: Vec<f64>,
}

impl DensityEstimate {
    /// Trapezoidal integral of the density over the grid.
    pub fn integral(&self) -> f64 {
        self.grid
            .windows(2)
            .zip(self.density.windows(2))
            .map(|(x, y)| (x[1] - x[0]) * (y[0] + y[1]) / 2.0)
            .sum()
    }

    /// Grid point with the highest density and the density there.
    pub fn peak(&self) -> Option<(f64, f64)> {
        self.grid
            .iter()
            .copied()
            .zip(self.density.iter().copied())
            .fold(None, |best, (x, y)| match best {
                Some((_, best_y)) if best_y >= y => best,
                _ => Some((x, y)),
            })
    }
}

/// Evaluates `(1/n) * sum_i phi((x - s_i) / h) / h` at every grid point.
///
/// Plain summation over all samples for every grid point, O(n * m).
pub fn estimate_density(samples: &[f64], grid: &[f64], bandwidth: f64) -> Result<DensityEstimate> {
    if !(bandwidth > 0.0) || !bandwidth.is_finite() {
        return Err(ExperimentError::InvalidArgument(format!(
            "bandwidth must be a positive number, got {}",
            bandwidth
        )));
    }
    if grid.is_empty() {
        return Err(ExperimentError::InvalidArgument(
            "density grid is empty".to_string(),
        ));
    }
    if grid.windows(2).any(|pair| !(pair[1] > pair[0])) {
        return Err(ExperimentError::InvalidArgument(
            "density grid must be strictly increasing".to_string(),
        ));
    }
    if samples.is_empty() {
        return Err(ExperimentError::InvalidArgument(
            "cannot estimate density of an empty sample".to_string(),
        ));
    }

    let norm = INV_SQRT_2PI / (samples.len() as f64 * bandwidth);
    let density = grid
        .iter()
        .map(|x| {
            let kernel_sum: f64 = samples
                .iter()
                .map(|sample| {
                    let u = (x - sample) / bandwidth;
                    (-0.5 * u * u).exp()
                })
                .sum();
            kernel_sum * norm
        })
        .collect();

    Ok(DensityEstimate {
        grid: grid.to_vec(),
        density,
    })
}

/// Linearly interpolated percentile of sorted values, `p` in [0, 100].
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (rank - lower as f64)
}

/// Silverman's rule of thumb `0.9 * min(sigma, IQR / 1.34) * n^(-1/5)`, floored at `min_bandwidth`.
pub fn silverman_bandwidth(samples: &[f64], min_bandwidth: f64) -> Result<f64> {
    if samples.is_empty() {
        return Err(ExperimentError::InvalidArgument(
            "cannot select bandwidth for an empty sample".to_string(),
        ));
    }
    if !(min_bandwidth > 0.0) {
        return Err(ExperimentError::InvalidArgument(format!(
            "minimal bandwidth must be positive, got {}",
            min_bandwidth
        )));
    }

    let sigma = EstimatorWrapper::from_values(samples).std_dev();
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let iqr = percentile_sorted(&sorted, 75.0) - percentile_sorted(&sorted, 25.0);

    let n = samples.len() as f64;
    let h = 0.9 * sigma.min(iqr / 1.34) * n.powf(-0.2);
    Ok(h.max(min_bandwidth))
}

/// `points` evenly spaced values from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, points: usize) -> Result<Vec<f64>> {
    if points < 2 || !(end > start) || !start.is_finite() || !end.is_finite() {
        return Err(ExperimentError::InvalidArgument(format!(
            "cannot build grid of {} points over [{}, {}]",
            points, start, end
        )));
    }
    let step = (end - start) / (points - 1) as f64;
    let mut grid: Vec<f64> = (0..points).map(|i| start + step * i as f64).collect();
    grid[points - 1] = end;
    Ok(grid)
}

/// Common grid covering every sample of every series.
///
/// The upper bound is the largest sample times `grid_upper_margin`; optional clamps then narrow
/// the range. A range that collapses is widened around the data by three minimal bandwidths.
pub fn common_grid<'a, I>(series: I, config: &ComparisonConfig) -> Result<Vec<f64>>
where
    I: IntoIterator<Item = &'a [f64]>,
{
    let stats = EstimatorWrapper::from_values(
        &series
            .into_iter()
            .flat_map(|values| values.iter().copied())
            .collect::<Vec<f64>>(),
    );
    if stats.count() == 0 {
        return Err(ExperimentError::InvalidArgument(
            "no samples to build a grid from".to_string(),
        ));
    }

    let mut lower = stats.min();
    let mut upper = stats.max() * config.grid_upper_margin;
    if let Some(clamp) = config.grid_lower_clamp {
        lower = lower.max(clamp);
    }
    if let Some(clamp) = config.grid_upper_clamp {
        upper = upper.min(clamp);
    }
    if !(upper > lower) {
        warn!(
            "Grid range [{}, {}] is empty, widening it around the samples",
            lower, upper
        );
        lower = stats.min() - 3.0 * config.min_bandwidth;
        upper = stats.max() + 3.0 * config.min_bandwidth;
    }

    linspace(lower, upper, config.grid_points)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelledDensity {
    pub label: String,
    pub sample_count: usize,
    pub bandwidth: f64,
    pub estimate: DensityEstimate,
}

/// Densities of several labelled series evaluated on one common grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesDensities {
    pub grid: Vec<f64>,
    pub densities: Vec<LabelledDensity>,
}

pub fn estimate_series_densities(
    series: &BTreeMap<String, Vec<f64>>,
    config: &ComparisonConfig,
) -> Result<SeriesDensities> {
    let grid = common_grid(series.values().map(|values| values.as_slice()), config)?;

    let mut densities = vec![];
    for (label, samples) in series.iter() {
        if samples.is_empty() {
            warn!("No data found for {}", label);
            continue;
        }
        let bandwidth = silverman_bandwidth(samples, config.min_bandwidth)?;
        densities.push(LabelledDensity {
            label: label.clone(),
            sample_count: samples.len(),
            bandwidth,
            estimate: estimate_density(samples, &grid, bandwidth)?,
        });
    }

    Ok(SeriesDensities { grid, densities })
}

/// Writes one row per grid point: `x` followed by the density of every series.
pub fn write_densities_csv(densities: &SeriesDensities, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec!["x".to_string()];
    header.extend(densities.densities.iter().map(|d| d.label.clone()));
    writer.write_record(&header)?;

    for (i, x) in densities.grid.iter().enumerate() {
        let mut row = vec![x.to_string()];
        row.extend(
            densities
                .densities
                .iter()
                .map(|d| d.estimate.density[i].to_string()),
        );
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}
