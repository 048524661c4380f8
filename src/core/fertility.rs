use std::ops::Range;

use super::types::{FERTILITY_STD_DEV, FertilitySchedule};

/// Bell-shaped age-specific fertility centred on `average_birth_age`, scaled so
/// the rates over `ages` add up to `total_fertility_rate`.
///
/// When every Gaussian weight underflows to zero the schedule is left at zero
/// instead of being normalised.
pub fn build_schedule(
    average_birth_age: f64,
    total_fertility_rate: f64,
    ages: Range<u32>,
) -> FertilitySchedule {
    let start_age = ages.start;
    let two_var = 2.0 * FERTILITY_STD_DEV * FERTILITY_STD_DEV;
    let mut rates: Vec<f64> = ages
        .map(|age| {
            let d = age as f64 - average_birth_age;
            (-(d * d) / two_var).exp()
        })
        .collect();

    let weight_sum: f64 = rates.iter().sum();
    if weight_sum > 0.0 {
        let scale = total_fertility_rate / weight_sum;
        for rate in &mut rates {
            *rate *= scale;
        }
    }

    FertilitySchedule::new(start_age, rates)
}
