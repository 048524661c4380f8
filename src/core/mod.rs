mod engine;
mod fertility;
mod solver;
mod types;

pub use engine::{AgeDistribution, PopulationProjector, project, run_projection, summarize};
pub use fertility::build_schedule;
pub use solver::{
    FertilitySolveConfig, FertilitySolveIteration, FertilitySolveResult, SolveError,
    solve_replacement_fertility,
};
pub use types::{
    Archetype, DIVIDEND_THRESHOLD, FEMALE_SHARE, FERTILITY_STD_DEV, FertilitySchedule,
    INITIAL_POPULATION, MAX_AGE_HORIZON, ProjectionResult, ProjectionSummary, REPRODUCTIVE_AGES,
    SimulationParameters, WORKING_AGE_LOWER_BOUND, YEARS_TO_PROJECT, YearlySnapshot,
};
