use std::ops::Range;

use log::{debug, warn};

use super::fertility::build_schedule;
use super::types::{
    Archetype, DIVIDEND_THRESHOLD, FEMALE_SHARE, FertilitySchedule, ProjectionResult,
    ProjectionSummary, REPRODUCTIVE_AGES, SimulationParameters, YearlySnapshot,
};

/// Head count per single year of age, index = completed years.
#[derive(Debug, Clone, PartialEq)]
pub struct AgeDistribution {
    counts: Vec<f64>,
}

impl AgeDistribution {
    pub fn initial(
        archetype: Archetype,
        life_expectancy: u32,
        max_age_horizon: u32,
        initial_population: f64,
    ) -> Self {
        let mut counts = vec![0.0; max_age_horizon as usize];
        let living = life_expectancy.min(max_age_horizon);
        for age in 0..living {
            counts[age as usize] = archetype.relative_weight(age);
        }

        let unscaled: f64 = counts.iter().sum();
        if unscaled > 0.0 {
            let scale = initial_population / unscaled;
            for count in &mut counts {
                *count *= scale;
            }
        }
        Self { counts }
    }

    pub fn counts(&self) -> &[f64] {
        &self.counts
    }

    pub fn count(&self, age: u32) -> f64 {
        self.counts.get(age as usize).copied().unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.counts.iter().sum()
    }

    /// Sum over `ages`, with both ends clamped to the horizon.
    pub fn band_total(&self, ages: Range<u32>) -> f64 {
        let len = self.counts.len();
        let start = (ages.start as usize).min(len);
        let end = (ages.end as usize).min(len).max(start);
        self.counts[start..end].iter().sum()
    }

    /// Everyone gets a year older; the oldest cohort falls off the horizon and
    /// `births` becomes the new age-0 cohort.
    fn age_forward(&mut self, births: f64) {
        if self.counts.is_empty() {
            return;
        }
        self.counts.rotate_right(1);
        self.counts[0] = births;
    }

    fn apply_mortality_cutoff(&mut self, life_expectancy: u32) {
        let cutoff = life_expectancy as usize;
        if cutoff < self.counts.len() {
            self.counts[cutoff..].fill(0.0);
        }
    }
}

#[derive(Debug, Clone)]
pub struct PopulationProjector {
    params: SimulationParameters,
    schedule: FertilitySchedule,
    distribution: AgeDistribution,
    year: u32,
}

impl PopulationProjector {
    pub fn new(params: SimulationParameters, schedule: FertilitySchedule) -> Self {
        let distribution = AgeDistribution::initial(
            params.archetype,
            params.life_expectancy,
            params.max_age_horizon,
            params.initial_population,
        );
        Self {
            params,
            schedule,
            distribution,
            year: 0,
        }
    }

    pub fn distribution(&self) -> &AgeDistribution {
        &self.distribution
    }

    pub fn year(&self) -> u32 {
        self.year
    }

    pub fn is_finished(&self) -> bool {
        self.year >= self.params.years_to_project
    }

    /// Records the current year, then applies births, aging and the mortality
    /// cutoff. Returns `None` once the configured horizon has been run.
    pub fn step(&mut self) -> Option<YearlySnapshot> {
        if self.is_finished() {
            return None;
        }

        let snapshot = YearlySnapshot {
            year: self.year,
            total_population: self.distribution.total(),
            dependency_ratio: dependency_ratio(&self.distribution, &self.params),
        };

        let births = births(&self.distribution, &self.schedule);
        self.distribution.age_forward(births);
        self.distribution
            .apply_mortality_cutoff(self.params.life_expectancy);
        self.year += 1;

        Some(snapshot)
    }
}

pub fn project(
    params: &SimulationParameters,
    schedule: &FertilitySchedule,
) -> Vec<YearlySnapshot> {
    let mut projector = PopulationProjector::new(params.clone(), schedule.clone());
    let mut snapshots = Vec::with_capacity(params.years_to_project as usize);
    while let Some(snapshot) = projector.step() {
        snapshots.push(snapshot);
    }
    debug!(
        "projected {} years, final population {:.3}",
        projector.year(),
        projector.distribution().total()
    );
    snapshots
}

pub fn run_projection(params: &SimulationParameters) -> ProjectionResult {
    let schedule = build_schedule(
        params.average_birth_age,
        params.total_fertility_rate,
        REPRODUCTIVE_AGES,
    );
    debug!(
        "fertility schedule sums to {:.3}, peaking at age {:?}",
        schedule.total(),
        schedule.peak_age()
    );
    let snapshots = project(params, &schedule);
    let result = ProjectionResult {
        parameters: params.clone(),
        snapshots,
    };
    if let Some(year) = result.summary().extinction_year {
        warn!("population reached zero in year {year}");
    }
    result
}

fn births(distribution: &AgeDistribution, schedule: &FertilitySchedule) -> f64 {
    (schedule.start_age()..schedule.end_age())
        .map(|age| FEMALE_SHARE * distribution.count(age) * schedule.rate_at(age))
        .sum()
}

fn dependency_ratio(distribution: &AgeDistribution, params: &SimulationParameters) -> f64 {
    let work_start = params.working_age_lower_bound;
    let retire = params.retirement_age;
    let horizon = params.max_age_horizon;

    let young = distribution.band_total(0..work_start);
    let working = if retire > work_start {
        distribution.band_total(work_start..retire)
    } else {
        0.0
    };
    let old = distribution.band_total(retire..horizon);

    // A residual working band below one person would blow the ratio up.
    if working > 1.0 {
        (young + old) / working * 100.0
    } else {
        0.0
    }
}

impl ProjectionResult {
    pub fn summary(&self) -> ProjectionSummary {
        summarize(&self.snapshots)
    }
}

pub fn summarize(snapshots: &[YearlySnapshot]) -> ProjectionSummary {
    let initial_population = snapshots.first().map_or(0.0, |s| s.total_population);
    let final_population = snapshots.last().map_or(0.0, |s| s.total_population);
    let final_dependency_ratio = snapshots.last().map_or(0.0, |s| s.dependency_ratio);

    let mut peak_population = initial_population;
    let mut peak_population_year = snapshots.first().map_or(0, |s| s.year);
    let mut min_dependency: Option<(f64, u32)> = None;
    let mut dividend_years = 0;
    let mut extinction_year = None;

    for s in snapshots {
        if s.total_population > peak_population {
            peak_population = s.total_population;
            peak_population_year = s.year;
        }
        if s.dependency_ratio > 0.0 {
            if min_dependency.is_none_or(|(ratio, _)| s.dependency_ratio < ratio) {
                min_dependency = Some((s.dependency_ratio, s.year));
            }
            if s.dependency_ratio < DIVIDEND_THRESHOLD {
                dividend_years += 1;
            }
        }
        if extinction_year.is_none() && s.total_population <= 0.0 {
            extinction_year = Some(s.year);
        }
    }

    ProjectionSummary {
        initial_population,
        final_population,
        peak_population,
        peak_population_year,
        final_dependency_ratio,
        min_dependency_ratio: min_dependency.map(|(ratio, _)| ratio),
        min_dependency_ratio_year: min_dependency.map(|(_, year)| year),
        dividend_years,
        extinction_year,
    }
}
