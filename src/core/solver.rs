use log::info;
use serde::Serialize;
use thiserror::Error;

use super::{ProjectionResult, REPRODUCTIVE_AGES, SimulationParameters, build_schedule, project};

#[derive(Debug, Clone, Copy)]
pub struct FertilitySolveConfig {
    pub target_growth_ratio: f64,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
}

impl Default for FertilitySolveConfig {
    fn default() -> Self {
        Self {
            target_growth_ratio: 1.0,
            search_min: 0.0,
            search_max: 8.0,
            tolerance: 1e-4,
            max_iterations: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FertilitySolveIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_tfr: f64,
    pub growth_ratio: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FertilitySolveResult {
    pub target_growth_ratio: f64,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub solved_tfr: Option<f64>,
    pub achieved_growth_ratio: Option<f64>,
    pub iterations: Vec<FertilitySolveIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum SolveError {
    #[error("target growth ratio must be finite and >= 0")]
    InvalidTarget,
    #[error("search bounds must be finite and >= 0")]
    InvalidBounds,
    #[error("search max must be greater than search min")]
    EmptyRange,
    #[error("tolerance must be > 0")]
    InvalidTolerance,
    #[error("max iterations must be > 0")]
    NoIterations,
    #[error("starting population is empty; growth ratio is undefined")]
    EmptyPopulation,
}

/// Bisects total fertility rate until the projection ends at
/// `target_growth_ratio` times its starting size.
///
/// End population is non-decreasing in TFR, so the bracket stays valid.
pub fn solve_replacement_fertility(
    params: &SimulationParameters,
    config: FertilitySolveConfig,
) -> Result<FertilitySolveResult, SolveError> {
    validate_config(config)?;

    let target = config.target_growth_ratio;
    let low_growth = growth_at(params, config.search_min)?;
    let high_growth = growth_at(params, config.search_max)?;

    let mut iterations = Vec::with_capacity(config.max_iterations as usize);
    let mut solved_tfr = None;
    let mut converged = false;
    let feasible;
    let message;

    if low_growth >= target {
        solved_tfr = Some(config.search_min);
        converged = true;
        feasible = true;
        message = "Already meets target growth at the lower fertility bound.".to_string();
    } else if high_growth < target {
        feasible = false;
        message = "No fertility rate within the search bounds reaches the target growth."
            .to_string();
    } else {
        let mut lo = config.search_min;
        let mut hi = config.search_max;
        let mut it = 0;
        while it < config.max_iterations {
            it += 1;
            let mid = (lo + hi) * 0.5;
            let growth = growth_at(params, mid)?;
            iterations.push(FertilitySolveIteration {
                iteration: it,
                lower_bound: lo,
                upper_bound: hi,
                candidate_tfr: mid,
                growth_ratio: growth,
            });

            if growth >= target {
                hi = mid;
            } else {
                lo = mid;
            }

            if (hi - lo).abs() <= config.tolerance {
                converged = true;
                break;
            }
        }
        solved_tfr = Some((lo + hi) * 0.5);
        feasible = true;
        message = if converged {
            "Solved fertility rate for target growth.".to_string()
        } else {
            "Reached max iterations before tolerance was met; returning best estimate."
                .to_string()
        };
    }

    let achieved_growth_ratio = match solved_tfr {
        Some(tfr) => Some(growth_at(params, tfr)?),
        None => None,
    };
    if let Some(tfr) = solved_tfr {
        info!(
            "fertility solve: tfr {tfr:.4} after {} iterations (converged: {converged})",
            iterations.len()
        );
    } else {
        info!("fertility solve: infeasible within [{}, {}]", config.search_min, config.search_max);
    }

    Ok(FertilitySolveResult {
        target_growth_ratio: target,
        search_min: config.search_min,
        search_max: config.search_max,
        tolerance: config.tolerance,
        solved_tfr,
        achieved_growth_ratio,
        iterations,
        converged,
        feasible,
        message,
    })
}

/// Projects without the extinction warning `run_projection` logs.
fn growth_at(base: &SimulationParameters, tfr: f64) -> Result<f64, SolveError> {
    let mut params = base.clone();
    params.total_fertility_rate = tfr.max(0.0);
    let schedule = build_schedule(
        params.average_birth_age,
        params.total_fertility_rate,
        REPRODUCTIVE_AGES,
    );
    let snapshots = project(&params, &schedule);
    ProjectionResult {
        parameters: params,
        snapshots,
    }
    .growth_ratio()
    .ok_or(SolveError::EmptyPopulation)
}

fn validate_config(config: FertilitySolveConfig) -> Result<(), SolveError> {
    if !config.target_growth_ratio.is_finite() || config.target_growth_ratio < 0.0 {
        return Err(SolveError::InvalidTarget);
    }
    if !config.search_min.is_finite() || !config.search_max.is_finite() || config.search_min < 0.0
    {
        return Err(SolveError::InvalidBounds);
    }
    if config.search_max <= config.search_min {
        return Err(SolveError::EmptyRange);
    }
    if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
        return Err(SolveError::InvalidTolerance);
    }
    if config.max_iterations == 0 {
        return Err(SolveError::NoIterations);
    }
    Ok(())
}
