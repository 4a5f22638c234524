//! Projection of a stored estimate onto a scope, time base and unit

use std::ops::RangeInclusive;

use tracing::debug;

use crate::error::{EstimateError, Result};
use crate::models::{AggregateEstimate, Bound, Material, Scope};
use crate::units::{self, TimeBase, Unit};

/// Accepted landfill compaction densities, ton/m³
pub const DENSITY_RANGE: RangeInclusive<f64> = 0.6..=0.8;
pub const PERSONS_RANGE: RangeInclusive<u32> = 1..=10;

/// User choices for one projection. The default is the identity projection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProjectionParameters {
    pub unit: Unit,
    pub time_base: TimeBase,
    pub scope: Scope,
    pub bound: Bound,
    /// Normalize per person with this many persons per household
    pub persons_per_household: Option<u32>,
    /// Estimate landfill volume at this compacted density
    pub landfill_density: Option<f64>,
    pub show_packaging: bool,
}

impl ProjectionParameters {
    pub fn is_per_person(&self) -> bool {
        self.persons_per_household.is_some()
    }

    fn validate(&self, estimate: &AggregateEstimate) -> Result<()> {
        if let Some(persons) = self.persons_per_household {
            if !PERSONS_RANGE.contains(&persons) {
                return Err(EstimateError::invalid_parameter(
                    "persons_per_household",
                    format!("{persons} is outside 1..=10"),
                ));
            }
            if estimate.household_count == 0 {
                return Err(EstimateError::invalid_parameter(
                    "persons_per_household",
                    "the estimate covers no households",
                ));
            }
        }
        if let Some(density) = self.landfill_density {
            if self.unit != Unit::Ton {
                return Err(EstimateError::invalid_parameter(
                    "landfill_density",
                    "landfill volume is only available in tons",
                ));
            }
            if !DENSITY_RANGE.contains(&density) {
                return Err(EstimateError::invalid_parameter(
                    "landfill_density",
                    format!("{density} ton/m³ is outside 0.6..=0.8"),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackagingShare {
    pub packaging: f64,
    pub non_packaging: f64,
}

/// A projected, scoped set of material values
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedVector {
    pub params: ProjectionParameters,
    pub components: Vec<(Material, f64)>,
    /// Sum of `components`, NaN skipped
    pub total: f64,
    pub proportions: Vec<(Material, f64)>,
    pub landfill_volume_m3: Option<f64>,
    pub packaging: Option<PackagingShare>,
}

/// Project `estimate` according to `params`.
///
/// Per-person normalization is applied before time-base scaling, and both
/// before unit conversion. Proportions are taken from the transformed values.
pub fn project(
    estimate: &AggregateEstimate,
    params: &ProjectionParameters,
) -> Result<ProjectedVector> {
    params.validate(estimate)?;

    let source = estimate.bound(params.bound);
    let transform = |grams: f64| {
        let mut value = grams;
        if let Some(persons) = params.persons_per_household {
            value = units::to_per_person(value, estimate.household_count, persons);
        }
        value = units::to_time_base(value, params.time_base);
        units::to_unit(value, params.unit)
    };

    let components: Vec<(Material, f64)> = params
        .scope
        .materials()
        .iter()
        .map(|&m| (m, transform(source.get(m))))
        .collect();

    let total = components
        .iter()
        .map(|(_, v)| *v)
        .filter(|v| !v.is_nan())
        .fold(0.0, |acc, v| acc + v);

    let proportions = components
        .iter()
        .map(|&(m, v)| {
            let share = if total == 0.0 { 0.0 } else { v / total };
            (m, share)
        })
        .collect();

    let landfill_volume_m3 = params.landfill_density.map(|density| {
        let total_tons = units::to_unit(units::from_unit(total, params.unit), Unit::Ton);
        total_tons / density
    });

    let packaging = params.show_packaging.then(|| {
        let ratio = estimate.packaging;
        let sum = ratio.packaging + ratio.non_packaging;
        if sum > 0.0 {
            PackagingShare {
                packaging: ratio.packaging / sum,
                non_packaging: ratio.non_packaging / sum,
            }
        } else {
            PackagingShare {
                packaging: 0.0,
                non_packaging: 0.0,
            }
        }
    });

    debug!(
        scope = %params.scope,
        unit = %params.unit,
        time = %params.time_base,
        total,
        "projection computed"
    );

    Ok(ProjectedVector {
        params: params.clone(),
        components,
        total,
        proportions,
        landfill_volume_m3,
        packaging,
    })
}
