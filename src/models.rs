//! Data models for waste composition, class statistics and estimates

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Add;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EstimateError;

/// Household class label as assigned by the classifier
pub type ClassLabel = u32;

/// Materials tracked by the gravimetric survey, in reporting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Material {
    Plastic,
    Paper,
    Glass,
    Metal,
    Multilayer,
    Textile,
    Organic,
    Rejects,
}

/// Number of leading materials in [`Material::ALL`] that are recyclable
pub const RECYCLABLE_COUNT: usize = 6;

impl Material {
    pub const ALL: [Material; 8] = [
        Material::Plastic,
        Material::Paper,
        Material::Glass,
        Material::Metal,
        Material::Multilayer,
        Material::Textile,
        Material::Organic,
        Material::Rejects,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_recyclable(self) -> bool {
        self.index() < RECYCLABLE_COUNT
    }

    /// Stable snake_case key used in JSON and the statistics catalog
    pub fn key(self) -> &'static str {
        match self {
            Material::Plastic => "plastic",
            Material::Paper => "paper",
            Material::Glass => "glass",
            Material::Metal => "metal",
            Material::Multilayer => "multilayer",
            Material::Textile => "textile",
            Material::Organic => "organic",
            Material::Rejects => "rejects",
        }
    }

    /// Column label used by the gravimetry artifacts
    pub fn label(self) -> &'static str {
        match self {
            Material::Plastic => "Plástico",
            Material::Paper => "Papel e Papelão",
            Material::Glass => "Vidro",
            Material::Metal => "Metais",
            Material::Multilayer => "Emb. Mult.",
            Material::Textile => "Tex. Cour. Bor.",
            Material::Organic => "Mat. Org.",
            Material::Rejects => "Rejeitos",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Material::Plastic => "Plastic",
            Material::Paper => "Paper and cardboard",
            Material::Glass => "Glass",
            Material::Metal => "Metal",
            Material::Multilayer => "Multilayer packaging",
            Material::Textile => "Textile, leather and rubber",
            Material::Organic => "Organic matter",
            Material::Rejects => "Rejects",
        }
    }

    /// Accepts the JSON key, the artifact label or the display name
    pub fn from_label(label: &str) -> Option<Material> {
        let label = label.trim();
        Material::ALL.into_iter().find(|m| {
            m.key().eq_ignore_ascii_case(label)
                || m.label() == label
                || m.display_name().eq_ignore_ascii_case(label)
        })
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Which materials a sum or projection covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    Recyclables,
    NonRecyclables,
    #[default]
    Total,
}

impl Scope {
    pub fn materials(self) -> &'static [Material] {
        match self {
            Scope::Recyclables => &Material::ALL[..RECYCLABLE_COUNT],
            Scope::NonRecyclables => &Material::ALL[RECYCLABLE_COUNT..],
            Scope::Total => &Material::ALL,
        }
    }
}

impl FromStr for Scope {
    type Err = EstimateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "recyclables" | "recyclable" | "rec" => Ok(Scope::Recyclables),
            "non-recyclables" | "non-recyclable" | "nonrec" => Ok(Scope::NonRecyclables),
            "total" | "all" => Ok(Scope::Total),
            other => Err(EstimateError::invalid_parameter(
                "scope",
                format!("'{other}' is not one of recyclables, non-recyclables, total"),
            )),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scope::Recyclables => "recyclables",
            Scope::NonRecyclables => "non-recyclables",
            Scope::Total => "total",
        })
    }
}

/// One mass per material, in grams.
///
/// Components may be NaN when a margin ratio is undefined; every sum skips
/// those components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialVector([f64; 8]);

impl MaterialVector {
    pub const fn new(values: [f64; 8]) -> Self {
        MaterialVector(values)
    }

    pub const fn zeros() -> Self {
        MaterialVector([0.0; 8])
    }

    pub fn get(&self, material: Material) -> f64 {
        self.0[material.index()]
    }

    pub fn set(&mut self, material: Material, value: f64) {
        self.0[material.index()] = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Material, f64)> + '_ {
        Material::ALL.into_iter().map(|m| (m, self.get(m)))
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        MaterialVector(self.0.map(f))
    }

    pub fn zip_with(&self, other: &MaterialVector, f: impl Fn(f64, f64) -> f64) -> Self {
        let mut out = [0.0; 8];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = f(self.0[i], other.0[i]);
        }
        MaterialVector(out)
    }

    pub fn scale(&self, factor: f64) -> Self {
        self.map(|v| v * factor)
    }

    /// Sum of the scoped components, skipping NaN
    pub fn sum_over(&self, scope: Scope) -> f64 {
        scope
            .materials()
            .iter()
            .map(|&m| self.get(m))
            .filter(|v| !v.is_nan())
            .fold(0.0, |acc, v| acc + v)
    }

    pub fn totals(&self) -> Totals {
        Totals {
            all: self.sum_over(Scope::Total),
            recyclable: self.sum_over(Scope::Recyclables),
            non_recyclable: self.sum_over(Scope::NonRecyclables),
        }
    }
}

impl Default for MaterialVector {
    fn default() -> Self {
        MaterialVector::zeros()
    }
}

impl Add for MaterialVector {
    type Output = MaterialVector;

    fn add(self, rhs: MaterialVector) -> MaterialVector {
        self.zip_with(&rhs, |a, b| a + b)
    }
}

// JSON has no NaN or infinity, so undefined components travel as null.
impl Serialize for MaterialVector {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let map: BTreeMap<&str, Option<f64>> = self
            .iter()
            .map(|(m, v)| (m.key(), if v.is_finite() { Some(v) } else { None }))
            .collect();
        map.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MaterialVector {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = BTreeMap::<String, Option<f64>>::deserialize(deserializer)?;
        let mut vector = MaterialVector::zeros();
        let mut seen = [false; 8];
        for (key, value) in map {
            let material = Material::from_label(&key)
                .ok_or_else(|| serde::de::Error::custom(format!("unknown material '{key}'")))?;
            vector.set(material, value.unwrap_or(f64::NAN));
            seen[material.index()] = true;
        }
        if let Some(missing) = Material::ALL.into_iter().find(|m| !seen[m.index()]) {
            return Err(serde::de::Error::custom(format!(
                "missing material '{}'",
                missing.key()
            )));
        }
        Ok(vector)
    }
}

/// Scalar sums of a [`MaterialVector`]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Totals {
    pub all: f64,
    pub recyclable: f64,
    pub non_recyclable: f64,
}

impl Totals {
    pub fn for_scope(&self, scope: Scope) -> f64 {
        match scope {
            Scope::Recyclables => self.recyclable,
            Scope::NonRecyclables => self.non_recyclable,
            Scope::Total => self.all,
        }
    }
}

/// Mean packaging / non-packaging fractions of a household's waste
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PackagingRatio {
    pub packaging: f64,
    pub non_packaging: f64,
}

/// Per-household statistics for one waste-generation class
#[derive(Debug, Clone, PartialEq)]
pub struct ClassProfile {
    pub mean: MaterialVector,
    pub margin: MaterialVector,
    pub packaging: PackagingRatio,
}

/// Pre-trained statistics keyed by class label
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassStatistics {
    classes: BTreeMap<ClassLabel, ClassProfile>,
}

impl ClassStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: ClassLabel, profile: ClassProfile) {
        self.classes.insert(label, profile);
    }

    pub fn get(&self, label: ClassLabel) -> Option<&ClassProfile> {
        self.classes.get(&label)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClassLabel, &ClassProfile)> {
        self.classes.iter().map(|(label, profile)| (*label, profile))
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Households per class label
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassificationCounts(BTreeMap<ClassLabel, u64>);

impl ClassificationCounts {
    pub fn from_labels(labels: &[ClassLabel]) -> Self {
        let mut counts = BTreeMap::new();
        for &label in labels {
            *counts.entry(label).or_insert(0) += 1;
        }
        ClassificationCounts(counts)
    }

    pub fn get(&self, label: ClassLabel) -> u64 {
        self.0.get(&label).copied().unwrap_or(0)
    }

    /// Classes with at least one household, ascending by label
    pub fn present(&self) -> impl Iterator<Item = (ClassLabel, u64)> + '_ {
        self.0
            .iter()
            .filter(|(_, n)| **n > 0)
            .map(|(label, n)| (*label, *n))
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }
}

impl FromIterator<(ClassLabel, u64)> for ClassificationCounts {
    fn from_iter<I: IntoIterator<Item = (ClassLabel, u64)>>(iter: I) -> Self {
        ClassificationCounts(iter.into_iter().collect())
    }
}

/// Which vector of an estimate to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bound {
    #[default]
    Estimate,
    Lower,
    Upper,
}

impl FromStr for Bound {
    type Err = EstimateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "estimate" | "point" => Ok(Bound::Estimate),
            "lower" | "inf" => Ok(Bound::Lower),
            "upper" | "sup" => Ok(Bound::Upper),
            other => Err(EstimateError::invalid_parameter(
                "bound",
                format!("'{other}' is not one of estimate, lower, upper"),
            )),
        }
    }
}

/// Result of aggregating one classification run, masses in grams per day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateEstimate {
    pub household_count: u64,
    pub point: MaterialVector,
    pub lower: MaterialVector,
    pub upper: MaterialVector,
    /// Combined relative margin per material
    pub margin_fraction: MaterialVector,
    pub point_totals: Totals,
    pub lower_totals: Totals,
    pub upper_totals: Totals,
    /// Mean of the present classes' per-household means
    pub class_means: MaterialVector,
    pub packaging: PackagingRatio,
}

impl AggregateEstimate {
    pub fn bound(&self, bound: Bound) -> &MaterialVector {
        match bound {
            Bound::Estimate => &self.point,
            Bound::Lower => &self.lower,
            Bound::Upper => &self.upper,
        }
    }
}

/// What a prediction run persists for the visualization stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub city: String,
    pub model: String,
    pub counts: ClassificationCounts,
    pub estimate: AggregateEstimate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_partition_materials() {
        assert_eq!(Scope::Recyclables.materials().len(), 6);
        assert_eq!(
            Scope::NonRecyclables.materials(),
            &[Material::Organic, Material::Rejects]
        );
        assert!(Scope::Recyclables.materials().iter().all(|m| m.is_recyclable()));
    }

    #[test]
    fn sums_skip_nan_components() {
        let mut v = MaterialVector::new([1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        v.set(Material::Textile, f64::NAN);

        let totals = v.totals();
        assert_eq!(totals.all, 30.0);
        assert_eq!(totals.recyclable, 15.0);
        assert_eq!(totals.non_recyclable, 15.0);
    }

    #[test]
    fn artifact_labels_resolve() {
        assert_eq!(Material::from_label("Papel e Papelão"), Some(Material::Paper));
        assert_eq!(Material::from_label("organic"), Some(Material::Organic));
        assert_eq!(Material::from_label("Wood"), None);
    }

    #[test]
    fn nan_components_survive_json() {
        let mut v = MaterialVector::zeros();
        v.set(Material::Glass, 12.5);
        v.set(Material::Textile, f64::NAN);

        let json = serde_json::to_string(&v).unwrap();
        assert!(json.contains("\"textile\":null"));

        let back: MaterialVector = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get(Material::Glass), 12.5);
        assert!(back.get(Material::Textile).is_nan());
    }

    #[test]
    fn vector_json_requires_every_material() {
        let err = serde_json::from_str::<MaterialVector>(r#"{"plastic": 1.0}"#).unwrap_err();
        assert!(err.to_string().contains("missing material"));
    }

    #[test]
    fn counts_ignore_empty_classes() {
        let counts: ClassificationCounts = [(1, 5), (2, 0), (3, 2)].into_iter().collect();
        let present: Vec<_> = counts.present().collect();
        assert_eq!(present, vec![(1, 5), (3, 2)]);
        assert_eq!(counts.total(), 7);

        let labelled = ClassificationCounts::from_labels(&[2, 1, 2, 2]);
        assert_eq!(labelled.get(2), 3);
        assert_eq!(labelled.get(3), 0);
    }
}
