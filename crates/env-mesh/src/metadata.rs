//! Binding of a data source to the cell that evaluates it.

use std::sync::Arc;

use crate::boundary::Boundary;
use crate::dataloader::{DataLoader, Dataset, HomCondition, SplittingCondition, TabularSource, ValueFillType};
use crate::error::MeshResult;

/// A data source as seen by one cell.
///
/// The loader is shared by every cell of a build. `data_subset` is owned by
/// the cell and holds only the datapoints inside its bounds, so children
/// trim from their parent's subset rather than from the whole dataset.
#[derive(Debug, Clone)]
pub struct Metadata {
    data_loader: Arc<dyn DataLoader>,
    splitting_conditions: Vec<SplittingCondition>,
    value_fill_type: ValueFillType,
    data_subset: Dataset,
}

impl Metadata {
    /// Metadata over the loader's whole (already region-trimmed) dataset.
    pub fn new(
        data_loader: Arc<dyn DataLoader>,
        splitting_conditions: Vec<SplittingCondition>,
        value_fill_type: ValueFillType,
    ) -> Self {
        let data_subset = data_loader.dataset().clone();
        Self::with_subset(data_loader, splitting_conditions, value_fill_type, data_subset)
    }

    pub fn with_subset(
        data_loader: Arc<dyn DataLoader>,
        splitting_conditions: Vec<SplittingCondition>,
        value_fill_type: ValueFillType,
        data_subset: Dataset,
    ) -> Self {
        Self {
            data_loader,
            splitting_conditions,
            value_fill_type,
            data_subset,
        }
    }

    #[inline]
    pub fn data_loader(&self) -> &Arc<dyn DataLoader> {
        &self.data_loader
    }

    #[inline]
    pub fn splitting_conditions(&self) -> &[SplittingCondition] {
        &self.splitting_conditions
    }

    #[inline]
    pub fn value_fill_type(&self) -> ValueFillType {
        self.value_fill_type
    }

    #[inline]
    pub fn data_subset(&self) -> &Dataset {
        &self.data_subset
    }

    /// Number of datapoints held for the cell.
    pub fn datapoints(&self) -> usize {
        self.data_subset.len()
    }

    /// Metadata for a child cell covering `bounds`.
    pub fn for_bounds(&self, bounds: &Boundary) -> Self {
        Self {
            data_loader: Arc::clone(&self.data_loader),
            splitting_conditions: self.splitting_conditions.clone(),
            value_fill_type: self.value_fill_type,
            data_subset: self.data_loader.trim_datapoints(bounds, &self.data_subset),
        }
    }

    /// Verdict of every splitting condition over `bounds`, in order.
    pub fn hom_conditions(&self, bounds: &Boundary) -> MeshResult<Vec<HomCondition>> {
        self.splitting_conditions
            .iter()
            .map(|condition| {
                self.data_loader
                    .get_hom_condition(bounds, &self.data_subset, condition)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataloader::{AggregationType, PointTable, ScalarLoader};

    fn metadata() -> Metadata {
        let mut table = PointTable::new(vec!["v".into()], false);
        for i in 0..10 {
            let x = f64::from(i) + 0.5;
            table.push(x, x, None, &[f64::from(i % 2)]);
        }
        let loader = ScalarLoader::new("scalar_csv", "v", table.into(), AggregationType::Mean, 1);
        Metadata::new(
            Arc::new(loader),
            vec![SplittingCondition::Threshold {
                threshold: 0.5,
                upper_bound: 0.9,
                lower_bound: 0.1,
                split_lock: false,
            }],
            ValueFillType::Parent,
        )
    }

    #[test]
    fn test_for_bounds_trims_subset() {
        let parent = metadata();
        assert_eq!(parent.datapoints(), 10);
        let child = parent.for_bounds(&Boundary::new([0.0, 5.0], [0.0, 5.0], None).unwrap());
        assert_eq!(child.datapoints(), 5);
        assert!(Arc::ptr_eq(parent.data_loader(), child.data_loader()));
        // Grandchild trims from the child's subset
        let grandchild = child.for_bounds(&Boundary::new([0.0, 2.0], [0.0, 2.0], None).unwrap());
        assert_eq!(grandchild.datapoints(), 2);
    }

    #[test]
    fn test_hom_conditions() {
        let m = metadata();
        let bounds = Boundary::new([0.0, 10.0], [0.0, 10.0], None).unwrap();
        assert_eq!(m.hom_conditions(&bounds).unwrap(), vec![HomCondition::Het]);
    }
}
