//! Loader for single-valued fields (ice concentration, elevation, ...).

use super::{
    AggregationType, DataLoader, Dataset, HomCondition, SplittingCondition, TabularSource, threshold_condition,
};
use crate::boundary::Boundary;
use crate::error::{MeshError, MeshResult};

/// A data source producing one scalar value per cellbox.
#[derive(Debug, Clone)]
pub struct ScalarLoader {
    name: String,
    data_names: Vec<String>,
    dataset: Dataset,
    aggregate_type: AggregationType,
    min_dp: usize,
}

impl ScalarLoader {
    /// Wrap a dataset holding a column named `data_name`.
    pub fn new(
        name: impl Into<String>,
        data_name: impl Into<String>,
        dataset: Dataset,
        aggregate_type: AggregationType,
        min_dp: usize,
    ) -> Self {
        Self {
            name: name.into(),
            data_names: vec![data_name.into()],
            dataset,
            aggregate_type,
            min_dp,
        }
    }

    fn data_name(&self) -> &str {
        &self.data_names[0]
    }
}

impl DataLoader for ScalarLoader {
    fn name(&self) -> &str {
        &self.name
    }

    fn data_names(&self) -> &[String] {
        &self.data_names
    }

    fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    fn aggregate_type(&self) -> AggregationType {
        self.aggregate_type
    }

    fn min_dp(&self) -> usize {
        self.min_dp
    }

    fn get_hom_condition(
        &self,
        bounds: &Boundary,
        data: &Dataset,
        condition: &SplittingCondition,
    ) -> MeshResult<HomCondition> {
        let SplittingCondition::Threshold {
            threshold,
            upper_bound,
            lower_bound,
            split_lock,
        } = *condition
        else {
            return Err(MeshError::invalid_config(format!(
                "scalar data source '{}' only accepts threshold splitting conditions",
                self.name
            )));
        };

        let values = self
            .trim_datapoints(bounds, data)
            .column(self.data_name())
            .unwrap_or_default();
        let count = values.iter().filter(|v| !v.is_nan()).count();
        if count < self.min_dp {
            return Ok(HomCondition::Min);
        }

        Ok(threshold_condition(&values, threshold, upper_bound, lower_bound, split_lock))
    }
}
