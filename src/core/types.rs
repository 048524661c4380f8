use std::ops::Range;

use serde::Serialize;

pub const YEARS_TO_PROJECT: u32 = 300;
pub const WORKING_AGE_LOWER_BOUND: u32 = 15;
pub const MAX_AGE_HORIZON: u32 = 120;
pub const INITIAL_POPULATION: f64 = 10_000.0;
pub const REPRODUCTIVE_AGES: Range<u32> = 15..50;
pub const FERTILITY_STD_DEV: f64 = 5.0;
pub const FEMALE_SHARE: f64 = 0.5;
/// Dependency ratio (%) below which a population is in its demographic dividend.
pub const DIVIDEND_THRESHOLD: f64 = 50.0;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Archetype {
    Young,
    Balanced,
    Old,
}

impl Archetype {
    /// Unscaled head count at `age` for this starting shape.
    pub fn relative_weight(self, age: u32) -> f64 {
        let age = age as f64;
        match self {
            Archetype::Young => (-0.04 * age).exp(),
            Archetype::Balanced => 1.0,
            Archetype::Old => (0.015 * age).exp(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationParameters {
    pub archetype: Archetype,
    pub total_fertility_rate: f64,
    pub average_birth_age: f64,
    pub retirement_age: u32,
    pub life_expectancy: u32,
    pub years_to_project: u32,
    pub working_age_lower_bound: u32,
    pub max_age_horizon: u32,
    pub initial_population: f64,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            archetype: Archetype::Young,
            total_fertility_rate: 2.4,
            average_birth_age: 28.0,
            retirement_age: 65,
            life_expectancy: 75,
            years_to_project: YEARS_TO_PROJECT,
            working_age_lower_bound: WORKING_AGE_LOWER_BOUND,
            max_age_horizon: MAX_AGE_HORIZON,
            initial_population: INITIAL_POPULATION,
        }
    }
}

/// Per-age birth rates covering `start_age..start_age + rates.len()`.
#[derive(Debug, Clone, PartialEq)]
pub struct FertilitySchedule {
    start_age: u32,
    rates: Vec<f64>,
}

impl FertilitySchedule {
    pub(crate) fn new(start_age: u32, rates: Vec<f64>) -> Self {
        Self { start_age, rates }
    }

    pub fn start_age(&self) -> u32 {
        self.start_age
    }

    pub fn end_age(&self) -> u32 {
        self.start_age + self.rates.len() as u32
    }

    pub fn rates(&self) -> &[f64] {
        &self.rates
    }

    pub fn rate_at(&self, age: u32) -> f64 {
        age.checked_sub(self.start_age)
            .and_then(|offset| self.rates.get(offset as usize))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.rates.iter().sum()
    }

    /// Age with the highest rate; the youngest wins ties.
    pub fn peak_age(&self) -> Option<u32> {
        let mut best: Option<(u32, f64)> = None;
        for (offset, &rate) in self.rates.iter().enumerate() {
            if best.is_none_or(|(_, r)| rate > r) {
                best = Some((self.start_age + offset as u32, rate));
            }
        }
        best.map(|(age, _)| age)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlySnapshot {
    pub year: u32,
    pub total_population: f64,
    pub dependency_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionSummary {
    pub initial_population: f64,
    pub final_population: f64,
    pub peak_population: f64,
    pub peak_population_year: u32,
    pub final_dependency_ratio: f64,
    pub min_dependency_ratio: Option<f64>,
    pub min_dependency_ratio_year: Option<u32>,
    pub dividend_years: u32,
    pub extinction_year: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ProjectionResult {
    pub parameters: SimulationParameters,
    pub snapshots: Vec<YearlySnapshot>,
}

impl ProjectionResult {
    pub fn years(&self) -> Vec<u32> {
        self.snapshots.iter().map(|s| s.year).collect()
    }

    pub fn total_population(&self) -> Vec<f64> {
        self.snapshots.iter().map(|s| s.total_population).collect()
    }

    pub fn dependency_ratio(&self) -> Vec<f64> {
        self.snapshots.iter().map(|s| s.dependency_ratio).collect()
    }

    /// Population after the last step relative to year zero, or `None` when
    /// the run started empty.
    pub fn growth_ratio(&self) -> Option<f64> {
        let first = self.snapshots.first()?.total_population;
        let last = self.snapshots.last()?.total_population;
        if first > 0.0 { Some(last / first) } else { None }
    }
}
