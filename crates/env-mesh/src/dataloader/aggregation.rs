//! Aggregation of datapoint values and homogeneity verdicts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MeshError;

/// How a cellbox's datapoints are collapsed into one value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregationType {
    #[default]
    Mean,
    Median,
    Min,
    Max,
    Std,
    Count,
}

impl FromStr for AggregationType {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "MEAN" => Ok(AggregationType::Mean),
            "MEDIAN" => Ok(AggregationType::Median),
            "MIN" => Ok(AggregationType::Min),
            "MAX" => Ok(AggregationType::Max),
            "STD" => Ok(AggregationType::Std),
            "COUNT" => Ok(AggregationType::Count),
            _ => Err(MeshError::UnknownAggregationType { value: s.to_string() }),
        }
    }
}

impl fmt::Display for AggregationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregationType::Mean => "MEAN",
            AggregationType::Median => "MEDIAN",
            AggregationType::Min => "MIN",
            AggregationType::Max => "MAX",
            AggregationType::Std => "STD",
            AggregationType::Count => "COUNT",
        };
        write!(f, "{}", name)
    }
}

/// Aggregate `values`, skipping NaNs.
///
/// `Count` returns the number of non-NaN values. Every other type returns NaN
/// when no non-NaN value remains. `Std` is the population standard deviation.
pub fn aggregate(values: &[f64], agg_type: AggregationType) -> f64 {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if finite.is_empty() && agg_type != AggregationType::Count {
        return f64::NAN;
    }

    let n = finite.len() as f64;
    match agg_type {
        AggregationType::Mean => finite.iter().sum::<f64>() / n,
        AggregationType::Median => {
            finite.sort_by(f64::total_cmp);
            let mid = finite.len() / 2;
            if finite.len() % 2 == 0 {
                (finite[mid - 1] + finite[mid]) / 2.0
            } else {
                finite[mid]
            }
        }
        AggregationType::Min => finite.iter().copied().fold(f64::INFINITY, f64::min),
        AggregationType::Max => finite.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        AggregationType::Std => {
            let mean = finite.iter().sum::<f64>() / n;
            (finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
        }
        AggregationType::Count => n,
    }
}

/// Verdict of a data source about the datapoints inside a boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HomCondition {
    /// Clear: nothing in the data calls for a split.
    Clr,
    /// Homogeneous above the split-lock bound: forbids splitting.
    Hom,
    /// Too few datapoints to judge.
    Min,
    /// Heterogeneous: the cellbox should split.
    Het,
}

impl fmt::Display for HomCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HomCondition::Clr => "CLR",
            HomCondition::Hom => "HOM",
            HomCondition::Min => "MIN",
            HomCondition::Het => "HET",
        };
        write!(f, "{}", name)
    }
}
