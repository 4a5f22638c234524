//! Mass, time-base and per-person conversions
//!
//! Projections apply these in a fixed order: per-person, then time base,
//! then unit.

use std::fmt;
use std::str::FromStr;

use crate::error::EstimateError;

pub const GRAMS_PER_KILOGRAM: f64 = 1_000.0;
pub const GRAMS_PER_TON: f64 = 1_000_000.0;
pub const DAYS_PER_MONTH: f64 = 30.0;
pub const DAYS_PER_YEAR: f64 = 365.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Unit {
    Ton,
    Kilogram,
    #[default]
    Gram,
}

impl Unit {
    pub fn grams_per_unit(self) -> f64 {
        match self {
            Unit::Ton => GRAMS_PER_TON,
            Unit::Kilogram => GRAMS_PER_KILOGRAM,
            Unit::Gram => 1.0,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Unit::Ton => "t",
            Unit::Kilogram => "kg",
            Unit::Gram => "g",
        }
    }
}

impl FromStr for Unit {
    type Err = EstimateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "t" | "ton" | "tons" | "tonne" | "tonelada" => Ok(Unit::Ton),
            "kg" | "kilogram" | "kilograms" | "quilograma" => Ok(Unit::Kilogram),
            "g" | "gram" | "grams" | "grama" => Ok(Unit::Gram),
            other => Err(EstimateError::invalid_parameter(
                "unit",
                format!("'{other}' is not one of t, kg, g"),
            )),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeBase {
    #[default]
    Day,
    Month,
    Year,
}

impl TimeBase {
    pub fn days(self) -> f64 {
        match self {
            TimeBase::Day => 1.0,
            TimeBase::Month => DAYS_PER_MONTH,
            TimeBase::Year => DAYS_PER_YEAR,
        }
    }
}

impl FromStr for TimeBase {
    type Err = EstimateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" | "daily" | "dia" => Ok(TimeBase::Day),
            "month" | "monthly" | "mes" | "mês" => Ok(TimeBase::Month),
            "year" | "yearly" | "ano" => Ok(TimeBase::Year),
            other => Err(EstimateError::invalid_parameter(
                "time",
                format!("'{other}' is not one of day, month, year"),
            )),
        }
    }
}

impl fmt::Display for TimeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TimeBase::Day => "day",
            TimeBase::Month => "month",
            TimeBase::Year => "year",
        })
    }
}

pub fn to_unit(grams: f64, unit: Unit) -> f64 {
    match unit {
        Unit::Gram => grams,
        _ => grams / unit.grams_per_unit(),
    }
}

pub fn from_unit(value: f64, unit: Unit) -> f64 {
    match unit {
        Unit::Gram => value,
        _ => value * unit.grams_per_unit(),
    }
}

pub fn to_time_base(daily: f64, base: TimeBase) -> f64 {
    match base {
        TimeBase::Day => daily,
        _ => daily * base.days(),
    }
}

pub fn to_per_person(value: f64, households: u64, persons_per_household: u32) -> f64 {
    (value / households as f64) / persons_per_household as f64
}

/// Round half away from zero to `decimals` places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
