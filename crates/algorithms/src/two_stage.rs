//! Two-stage velocity gridding: extrapolate each picked trace in time, then
//! fill the remaining traces across space.
//!
//! Stage one fits a 1D RBF (time → velocity) to the picks of every trace
//! with at least two of them, evaluates it on the full time axis and floors
//! the profile at a fraction of that trace's slowest pick. Each profile lands
//! in the grid column matched to its trace.
//!
//! Stage two fills the untouched columns, either with one 2D RBF over all
//! filled cells in `(time, trace)` space or by copying the nearest filled
//! column and blurring away the seams.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use velgrid_core::{
    Checkpoint, Error, GridGeometry, InterpolationConfig, ModelOutput, ModelParams, PartialGrid, PickSet, Result,
    VelocityGrid, VelocityModel,
};

use crate::interpolation::{Rbf, RbfParams};
use crate::maybe_rayon::*;
use crate::smoothing::{blur_array, gaussian_blur, kernel_size};

/// How stage two fills columns without picks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillStrategy {
    /// One RBF over every filled cell, evaluated at the unset cells
    #[default]
    Rbf,
    /// Copy the closest filled column, then blur the whole grid
    NearestBlur,
}

impl FillStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FillStrategy::Rbf => "rbf",
            FillStrategy::NearestBlur => "nearest_blur",
        }
    }
}

/// Two-stage engine options
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TwoStageParams {
    pub fill: FillStrategy,
    /// Blur strength applied to the finished grid
    pub smoothing: Option<f64>,
}

/// Two-stage extrapolate-then-fill model
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TwoStage {
    pub params: TwoStageParams,
}

impl TwoStage {
    pub fn new(params: TwoStageParams) -> Self {
        Self { params }
    }
}

/// What stage one produced for one trace
#[derive(Debug)]
enum TraceOutcome {
    Filled { column: usize, profile: Vec<f64> },
    TooFewPicks { count: usize },
    Failed(Error),
}

/// Grid column for each of `traces` (ascending, distinct).
///
/// Walking the grid columns in order, each column claims the closest pick
/// trace if it lies within `tolerance` and that trace has no column yet.
/// Traces left without a column take the nearest one by distance.
pub fn map_traces_to_columns(traces: &[f64], trace_axis: &[f64], tolerance: f64) -> Vec<usize> {
    let mut assigned: Vec<Option<usize>> = vec![None; traces.len()];
    if traces.is_empty() || trace_axis.is_empty() {
        return Vec::new();
    }

    for (column, &x) in trace_axis.iter().enumerate() {
        let (closest, distance) = traces
            .iter()
            .enumerate()
            .map(|(i, &t)| (i, (t - x).abs()))
            .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best });
        if distance <= tolerance && assigned[closest].is_none() {
            assigned[closest] = Some(column);
        }
    }

    traces
        .iter()
        .zip(assigned)
        .map(|(&t, column)| column.unwrap_or_else(|| velgrid_core::geometry::nearest_index(trace_axis, t)))
        .collect()
}

/// Stage one for a single trace
fn extrapolate_trace(
    profile: &[(f64, f64)],
    time_axis: &[[f64; 1]],
    column: usize,
    config: &InterpolationConfig,
) -> TraceOutcome {
    if profile.len() < 2 {
        return TraceOutcome::TooFewPicks { count: profile.len() };
    }

    let centres: Vec<[f64; 1]> = profile.iter().map(|&(t, _)| [t]).collect();
    let values: Vec<f64> = profile.iter().map(|&(_, v)| v).collect();
    let params = RbfParams {
        smoothing: config.rbf_smoothing,
        neighbors: None,
    };

    let fitted = Rbf::fit(&centres, &values, params).and_then(|rbf| rbf.evaluate(time_axis));
    match fitted {
        Ok(mut extrapolated) => {
            let slowest = values.iter().copied().fold(f64::INFINITY, f64::min);
            let floor = slowest * config.trace_floor_fraction;
            for v in &mut extrapolated {
                *v = v.max(floor);
            }
            TraceOutcome::Filled {
                column,
                profile: extrapolated,
            }
        }
        Err(e) => TraceOutcome::Failed(e),
    }
}

impl TwoStage {
    /// Stage one over every distinct trace, in parallel.
    fn extrapolate(
        &self,
        picks: &PickSet,
        geometry: &GridGeometry,
        config: &InterpolationConfig,
        checkpoint: &mut Checkpoint<'_>,
    ) -> Result<(PartialGrid, Vec<String>, usize)> {
        let traces = picks.unique_traces();
        let columns = map_traces_to_columns(&traces, geometry.trace_axis(), config.trace_match_tolerance);
        let time_axis: Vec<[f64; 1]> = geometry.time_axis().iter().map(|&t| [t]).collect();
        let cancel = checkpoint.cancel_source();

        checkpoint.milestone(40, &format!("Extrapolating {} traces", traces.len()))?;

        let outcomes: Vec<TraceOutcome> = traces
            .par_iter()
            .zip(columns.par_iter())
            .map(|(&trace, &column)| {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                Ok(extrapolate_trace(&picks.profile(trace), &time_axis, column, config))
            })
            .collect::<Result<_>>()?;

        let mut grid = PartialGrid::new(geometry.clone());
        let mut warnings = Vec::new();
        let mut skipped = 0;
        let total = outcomes.len();
        for (done, (outcome, &trace)) in outcomes.into_iter().zip(&traces).enumerate() {
            match outcome {
                TraceOutcome::Filled { column, profile } => {
                    debug!(trace, column, "trace extrapolated");
                    grid.set_column(column, &profile)?;
                }
                TraceOutcome::TooFewPicks { count } => {
                    let msg = format!("Trace {trace} has only {count} pick(s); skipped");
                    warn!("{msg}");
                    warnings.push(msg);
                    skipped += 1;
                }
                TraceOutcome::Failed(e) => {
                    let msg = format!("RBF extrapolation failed for trace {trace}: {e}");
                    warn!("{msg}");
                    warnings.push(msg);
                    skipped += 1;
                }
            }
            checkpoint.step(40, 70, done + 1, total, "Extrapolating traces")?;
        }

        Ok((grid, warnings, skipped))
    }

    /// Stage two with a single RBF over the filled cells.
    fn fill_rbf(
        &self,
        grid: &mut PartialGrid,
        config: &InterpolationConfig,
        checkpoint: &Checkpoint<'_>,
    ) -> Result<()> {
        let geometry = grid.geometry().clone();
        let times = geometry.time_axis();
        let traces = geometry.trace_axis();

        let (centres, values): (Vec<[f64; 2]>, Vec<f64>) = grid
            .set_cells()
            .map(|((r, c), v)| ([times[r], traces[c]], v))
            .unzip();
        let unset: Vec<(usize, usize)> = grid.unset_cells().collect();
        if unset.is_empty() {
            return Ok(());
        }
        let queries: Vec<[f64; 2]> = unset.iter().map(|&(r, c)| [times[r], traces[c]]).collect();

        let params = RbfParams::for_config(config, centres.len());
        if params.neighbors.is_some() {
            info!(
                centres = centres.len(),
                neighbors = ?params.neighbors,
                "switching cross-trace fill to local RBF"
            );
        }
        let rbf = Rbf::fit(&centres, &values, params)?;
        let filled = rbf.evaluate_cancellable(&queries, checkpoint.cancel_source())?;

        for (&(r, c), v) in unset.iter().zip(filled) {
            grid.set(r, c, v)?;
        }
        Ok(())
    }

    /// Stage two by nearest-column copy followed by a wide blur.
    fn fill_nearest_blur(&self, mut grid: PartialGrid, config: &InterpolationConfig) -> Result<VelocityGrid> {
        copy_nearest_columns(&mut grid)?;
        let size = kernel_size(config.nearest_fill_blur)?;
        let grid = grid.into_velocity_grid();
        let blurred = blur_array(grid.data(), size)?;
        grid.with_data(blurred)
    }
}

/// Fill every unset column with a copy of the closest filled column.
fn copy_nearest_columns(grid: &mut PartialGrid) -> Result<()> {
    let filled = grid.filled_columns();
    let (_, cols) = grid.shape();
    let sources: Vec<Option<Vec<f64>>> = (0..cols).map(|c| grid.column(c)).collect();

    for c in 0..cols {
        if grid.is_column_filled(c) {
            continue;
        }
        // First minimum: ties go to the lower column
        let nearest = filled
            .iter()
            .copied()
            .min_by_key(|&f| f.abs_diff(c))
            .ok_or_else(|| Error::Interpolation("no filled column to copy from".into()))?;
        if let Some(values) = &sources[nearest] {
            grid.set_column(c, values)?;
        }
    }
    Ok(())
}

impl VelocityModel for TwoStage {
    fn name(&self) -> &'static str {
        "two_stage"
    }

    fn build(
        &self,
        picks: &PickSet,
        geometry: &GridGeometry,
        config: &InterpolationConfig,
        checkpoint: &mut Checkpoint<'_>,
    ) -> Result<ModelOutput> {
        let (mut partial, mut warnings, skipped) = self.extrapolate(picks, geometry, config, checkpoint)?;
        let filled_columns = partial.filled_columns().len();
        let params = ModelParams::TwoStage {
            filled_columns,
            skipped_traces: skipped,
            fill: self.params.fill.as_str().to_string(),
        };

        if filled_columns <= 1 {
            let msg = format!(
                "Only {filled_columns} trace column(s) could be extrapolated; cross-trace fill skipped"
            );
            warn!("{msg}");
            warnings.push(msg);
            return Ok(ModelOutput::new(
                partial.into_velocity_grid(),
                "Two-Stage Interpolation (partial)",
                params,
            )
            .with_warnings(warnings));
        }

        checkpoint.milestone(70, "Filling traces without picks")?;
        let mut grid = match self.params.fill {
            FillStrategy::Rbf => {
                self.fill_rbf(&mut partial, config, checkpoint)?;
                partial.into_velocity_grid()
            }
            FillStrategy::NearestBlur => self.fill_nearest_blur(partial, config)?,
        };
        checkpoint.milestone(90, "Cross-trace fill complete")?;

        if let Some(blur) = self.params.smoothing {
            grid = gaussian_blur(&grid, blur)?;
            checkpoint.milestone(92, "Smoothed two-stage grid")?;
        }

        info!(
            filled_columns,
            skipped,
            fill = self.params.fill.as_str(),
            "two-stage grid built"
        );
        let description = format!(
            "Two-Stage Interpolation ({} traces extrapolated, {} fill)",
            filled_columns,
            self.params.fill.as_str()
        );
        Ok(ModelOutput::new(grid, description, params).with_warnings(warnings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use velgrid_core::geometry::linspace;
    use velgrid_core::{NeverCancel, NoProgress, Pick};

    fn picks(rows: &[(f64, f64, f64)]) -> PickSet {
        PickSet::new(rows.iter().map(|&(x, t, v)| Pick::new(x, t, v)).collect()).unwrap()
    }

    fn build(model: &TwoStage, picks: &PickSet, geometry: &GridGeometry) -> Result<ModelOutput> {
        let mut sink = NoProgress;
        let mut checkpoint = Checkpoint::new(&mut sink, &NeverCancel);
        model.build(picks, geometry, &InterpolationConfig::default(), &mut checkpoint)
    }

    fn geometry(traces: usize, samples: usize) -> GridGeometry {
        GridGeometry::from_axes(
            linspace(0.0, (traces - 1) as f64, traces),
            linspace(0.0, 1000.0, samples),
        )
        .unwrap()
    }

    fn column(grid: &VelocityGrid, c: usize) -> Vec<f64> {
        grid.column(c).unwrap().to_vec()
    }

    #[test]
    fn test_map_exact_and_fractional_traces() {
        let axis = linspace(0.0, 9.0, 10);
        assert_eq!(map_traces_to_columns(&[2.0, 5.0, 9.0], &axis, 0.5), vec![2, 5, 9]);
        // 3.4 is claimed by column 3
        assert_eq!(map_traces_to_columns(&[3.4], &axis, 0.5), vec![3]);
        // Nothing within tolerance on a coarse axis: nearest by distance
        let coarse = vec![0.0, 10.0, 20.0];
        assert_eq!(map_traces_to_columns(&[4.0, 16.0], &coarse, 0.5), vec![0, 2]);
        assert!(map_traces_to_columns(&[], &axis, 0.5).is_empty());
    }

    #[test]
    fn test_map_first_column_wins() {
        // Columns 1.0 and 1.5 are both within 0.5 of trace 1.25; the first claims it
        let axis = vec![0.0, 1.0, 1.5, 3.0];
        assert_eq!(map_traces_to_columns(&[1.25], &axis, 0.5), vec![1]);
    }

    #[test]
    fn test_single_trace_column_floor() {
        // Steeply decreasing picks extrapolate below half the slowest pick
        let out = build(
            &TwoStage::default(),
            &picks(&[(2.0, 100.0, 3000.0), (2.0, 200.0, 2000.0), (4.0, 100.0, 1800.0), (4.0, 200.0, 1900.0)]),
            &geometry(6, 11),
        )
        .unwrap();
        // Trace 2 floor is 1000
        assert!(column(&out.grid, 2).iter().all(|&v| v >= 1000.0 - 1e-9));
        assert!((out.grid.get(10, 2).unwrap() - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_only_one_column_returns_partial() {
        let p = picks(&[(1.0, 100.0, 1500.0), (1.0, 300.0, 1700.0), (3.0, 200.0, 1600.0)]);
        let out = build(&TwoStage::default(), &p, &geometry(5, 6)).unwrap();
        assert_eq!(
            out.params,
            ModelParams::TwoStage {
                filled_columns: 1,
                skipped_traces: 1,
                fill: "rbf".into()
            }
        );
        assert_eq!(out.warnings.len(), 2);
        assert!(column(&out.grid, 1).iter().all(|v| v.is_finite()));
        for c in [0, 2, 3, 4] {
            assert!(column(&out.grid, c).iter().all(|v| v.is_nan()));
        }
    }

    #[test]
    fn test_rbf_fill_completes_grid() {
        let p = picks(&[
            (0.0, 100.0, 1500.0),
            (0.0, 800.0, 2200.0),
            (4.0, 100.0, 1600.0),
            (4.0, 800.0, 2300.0),
        ]);
        let out = build(&TwoStage::default(), &p, &geometry(5, 11)).unwrap();
        assert_eq!(out.grid.nan_count(), 0);
        assert!(out.warnings.is_empty());
        // Filled columns are untouched by the fill
        let first = column(&out.grid, 0);
        assert!((first[1] - 1500.0).abs() < 20.0);
        // The middle trace lies between its neighbours
        for r in 0..11 {
            let mid = out.grid.get(r, 2).unwrap();
            let lo = out.grid.get(r, 0).unwrap().min(out.grid.get(r, 4).unwrap());
            let hi = out.grid.get(r, 0).unwrap().max(out.grid.get(r, 4).unwrap());
            assert!(mid >= lo - 1.0 && mid <= hi + 1.0, "row {r}: {mid} not in [{lo}, {hi}]");
        }
    }

    #[test]
    fn test_nearest_blur_fill() {
        let p = picks(&[
            (0.0, 100.0, 1500.0),
            (0.0, 800.0, 2200.0),
            (5.0, 100.0, 1500.0),
            (5.0, 800.0, 2200.0),
        ]);
        let model = TwoStage::new(TwoStageParams {
            fill: FillStrategy::NearestBlur,
            smoothing: None,
        });
        let out = build(&model, &p, &geometry(6, 11)).unwrap();
        assert_eq!(out.grid.nan_count(), 0);
        // Identical source columns: every column ends up the same
        for r in 0..11 {
            let row = out.grid.row(r).unwrap();
            assert!(row.iter().all(|&v| (v - row[0]).abs() < 1e-6));
        }
        assert!(out.description.contains("nearest_blur"));
    }

    #[test]
    fn test_nearest_column_tie_takes_lower_index() {
        let p = picks(&[
            (0.0, 0.0, 1500.0),
            (0.0, 1000.0, 1500.0),
            (2.0, 0.0, 2500.0),
            (2.0, 1000.0, 2500.0),
        ]);
        let model = TwoStage::default();
        let config = InterpolationConfig {
            nearest_fill_blur: 0.0,
            ..Default::default()
        };
        let mut sink = NoProgress;
        let mut checkpoint = Checkpoint::new(&mut sink, &NeverCancel);
        let (partial, _, _) = model.extrapolate(&p, &geometry(3, 5), &config, &mut checkpoint).unwrap();
        let grid = model.fill_nearest_blur(partial, &config).unwrap();
        // Columns [1500, 1500, 2500] under the 3-tap kernel give 1750 in the
        // middle; copying from the right would give 2250
        for r in 0..5 {
            assert!((grid.get(r, 1).unwrap() - 1750.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_nearest_copy_then_wide_blur() {
        let geometry = geometry(7, 4);
        let mut partial = PartialGrid::new(geometry);
        for (c, v) in [(1, 1500.0), (3, 2000.0), (6, 3000.0)] {
            partial.set_column(c, &[v; 4]).unwrap();
        }

        let mut copied = partial.clone();
        copy_nearest_columns(&mut copied).unwrap();
        assert!(copied.is_complete());
        // Column 2 is equidistant from 1 and 3 and takes the lower one
        let expected = [1500.0, 1500.0, 1500.0, 2000.0, 2000.0, 3000.0, 3000.0];
        for (c, &v) in expected.iter().enumerate() {
            assert_eq!(copied.column(c).unwrap(), vec![v; 4], "column {c}");
        }

        let config = InterpolationConfig::default();
        assert_eq!(kernel_size(config.nearest_fill_blur).unwrap(), 251);
        let grid = TwoStage::new(TwoStageParams {
            fill: FillStrategy::NearestBlur,
            smoothing: None,
        })
        .fill_nearest_blur(partial, &config)
        .unwrap();

        let reference = blur_array(copied.into_velocity_grid().data(), 251).unwrap();
        for ((r, c), &v) in grid.data().indexed_iter() {
            assert!((v - reference[[r, c]]).abs() < 1e-9);
            assert!(v > 1500.0 && v < 3000.0, "({r}, {c}) = {v} not blurred");
        }
        // Seams are smoothed but the lateral trend survives
        assert!(grid.get(0, 0).unwrap() < grid.get(0, 6).unwrap());
    }

    #[test]
    fn test_duplicate_times_skip_trace() {
        // Trace 1 has two picks at the same time: singular 1D system
        let p = picks(&[
            (1.0, 200.0, 1500.0),
            (1.0, 200.0, 1600.0),
            (2.0, 100.0, 1500.0),
            (2.0, 300.0, 1700.0),
            (4.0, 100.0, 1550.0),
            (4.0, 300.0, 1750.0),
        ]);
        let out = build(&TwoStage::default(), &p, &geometry(5, 6)).unwrap();
        match out.params {
            ModelParams::TwoStage {
                filled_columns,
                skipped_traces,
                ..
            } => {
                assert_eq!(filled_columns, 2);
                assert_eq!(skipped_traces, 1);
            }
            ref other => panic!("unexpected params {other:?}"),
        }
        assert!(out.warnings[0].contains("trace 1"));
        assert_eq!(out.grid.nan_count(), 0);
    }

    #[test]
    fn test_post_smoothing() {
        let p = picks(&[
            (0.0, 100.0, 1500.0),
            (0.0, 800.0, 2200.0),
            (4.0, 100.0, 1600.0),
            (4.0, 800.0, 2300.0),
        ]);
        let raw = build(&TwoStage::default(), &p, &geometry(5, 11)).unwrap();
        let smooth = build(
            &TwoStage::new(TwoStageParams {
                fill: FillStrategy::Rbf,
                smoothing: Some(0.0),
            }),
            &p,
            &geometry(5, 11),
        )
        .unwrap();
        assert_eq!(smooth.grid.shape(), raw.grid.shape());
        let expected = gaussian_blur(&raw.grid, 0.0).unwrap();
        for (a, b) in smooth.grid.data().iter().zip(expected.data()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_params_serde() {
        let params: TwoStageParams = serde_json::from_str(r#"{ "fill": "nearest_blur" }"#).unwrap();
        assert_eq!(params.fill, FillStrategy::NearestBlur);
        assert_eq!(params.smoothing, None);
    }

    #[test]
    fn test_cancelled_during_extrapolation() {
        let p = picks(&[(0.0, 100.0, 1500.0), (0.0, 800.0, 2200.0)]);
        let mut sink = NoProgress;
        let cancel = || true;
        let mut checkpoint = Checkpoint::new(&mut sink, &cancel);
        let err = TwoStage::default()
            .build(&p, &geometry(3, 5), &InterpolationConfig::default(), &mut checkpoint)
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
