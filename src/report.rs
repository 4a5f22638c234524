//! Text rendering of predictions and projections
//!
//! Numbers follow Brazilian formatting: dotted thousands, decimal comma.

use std::fmt;

use crate::models::{Material, PredictionRecord, Scope};
use crate::projection::ProjectedVector;
use crate::units::{self, Unit};

/// Format `value` with `decimals` places, e.g. `1.234,57`. NaN renders as `-`.
pub fn format_br(value: f64, decimals: usize) -> String {
    if value.is_nan() {
        return "-".to_string();
    }
    let fixed = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut grouped = String::new();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && fixed.chars().any(|c| c != '0' && c != '.') {
        "-"
    } else {
        ""
    };
    match frac_part {
        Some(frac) => format!("{sign}{grouped},{frac}"),
        None => format!("{sign}{grouped}"),
    }
}

fn tons(grams: f64) -> String {
    format!("{} t", format_br(units::to_unit(grams, Unit::Ton), 2))
}

/// Summary of a prediction run, daily tonnage with confidence intervals
pub fn format_prediction(record: &PredictionRecord) -> String {
    let estimate = &record.estimate;
    let mut output = String::new();

    output.push_str(&format!("=== {} ===\n", record.city));
    output.push_str(&format!(
        "Households: {}\n",
        format_br(estimate.household_count as f64, 0)
    ));
    output.push_str(&format!("Model: {}\n", record.model));
    for (label, n) in record.counts.present() {
        output.push_str(&format!("  class {}: {} households\n", label, format_br(n as f64, 0)));
    }
    output.push('\n');

    output.push_str(&format!(
        "Household generation (total per day): {}\n",
        tons(estimate.point_totals.all)
    ));
    output.push_str(&format!(
        "Confidence interval: {} to {}\n",
        tons(estimate.lower_totals.all),
        tons(estimate.upper_totals.all)
    ));
    for scope in [Scope::Recyclables, Scope::NonRecyclables] {
        output.push_str(&format!(
            "  {}: {}\n",
            scope,
            tons(estimate.point_totals.for_scope(scope))
        ));
    }
    output.push('\n');

    output.push_str(&format!(
        "{:<30} {:>14} {:>28}\n",
        "Material", "Estimate", "Interval"
    ));
    output.push_str(&format!("{}\n", "-".repeat(74)));
    for material in Material::ALL {
        let interval = format!(
            "{} to {}",
            format_br(units::to_unit(estimate.lower.get(material), Unit::Ton), 2),
            tons(estimate.upper.get(material))
        );
        output.push_str(&format!(
            "{:<30} {:>14} {:>28}\n",
            material.display_name(),
            tons(estimate.point.get(material)),
            interval
        ));
    }
    output.push('\n');

    output.push_str("Composition:\n");
    let total = estimate.point_totals.all;
    for (material, grams) in estimate.point.iter() {
        let share = if total == 0.0 { 0.0 } else { grams / total };
        output.push_str(&format!(
            "  {:<30} {:>7}%\n",
            material.display_name(),
            format_br(share * 100.0, 1)
        ));
    }

    output
}

impl fmt::Display for ProjectedVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params = &self.params;
        // Per-person tons are tiny; show them with more places
        let decimals = if params.is_per_person() && params.unit == Unit::Ton {
            6
        } else {
            2
        };
        let basis = match params.persons_per_household {
            Some(persons) => format!("per person ({} per household)", persons),
            None => "per household total".to_string(),
        };

        writeln!(f, "=== Projection ===")?;
        writeln!(
            f,
            "Scope: {}, per {}, {}",
            params.scope, params.time_base, basis
        )?;
        writeln!(f)?;

        for ((material, value), (_, share)) in self.components.iter().zip(&self.proportions) {
            writeln!(
                f,
                "  {:<30} {:>18} {} {:>7}%",
                material.display_name(),
                format_br(*value, decimals),
                params.unit,
                format_br(share * 100.0, 1)
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "  {:<30} {:>18} {}",
            "TOTAL",
            format_br(self.total, decimals),
            params.unit
        )?;

        if let (Some(volume), Some(density)) = (self.landfill_volume_m3, params.landfill_density) {
            writeln!(f)?;
            writeln!(
                f,
                "Landfill volume at {} ton/m³: {} m³",
                format_br(density, 2),
                format_br(units::round_to(volume, 2), 2)
            )?;
        }

        if let Some(share) = &self.packaging {
            writeln!(f)?;
            writeln!(f, "Packaging:     {:>7}%", format_br(share.packaging * 100.0, 1))?;
            writeln!(f, "Non-packaging: {:>7}%", format_br(share.non_packaging * 100.0, 1))?;
        }

        Ok(())
    }
}
