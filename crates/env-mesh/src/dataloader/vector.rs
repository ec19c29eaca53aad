//! Loader for two-component fields (currents, winds).

use super::{
    AggregationType, DataLoader, Dataset, HomCondition, SplittingCondition, TabularSource, threshold_condition,
};
use crate::boundary::{Boundary, unwrap_long};
use crate::error::MeshResult;

/// A data source producing a `(u, v)` pair per cellbox.
///
/// Each component is aggregated and stored under its own data name, so a
/// cellbox carries e.g. `uC` and `vC` side by side.
#[derive(Debug, Clone)]
pub struct VectorLoader {
    name: String,
    data_names: Vec<String>,
    dataset: Dataset,
    aggregate_type: AggregationType,
    min_dp: usize,
}

/// Datapoints of a vector field with both components present.
struct Samples {
    lat: Vec<f64>,
    long: Vec<f64>,
    u: Vec<f64>,
    v: Vec<f64>,
}

impl Samples {
    fn len(&self) -> usize {
        self.u.len()
    }

    fn mean(values: &[f64]) -> f64 {
        values.iter().sum::<f64>() / values.len() as f64
    }

    fn magnitudes(&self) -> Vec<f64> {
        self.u.iter().zip(&self.v).map(|(u, v)| u.hypot(*v)).collect()
    }

    /// Largest deviation of any vector from the mean vector.
    fn max_deviation(&self) -> f64 {
        let (mu, mv) = (Self::mean(&self.u), Self::mean(&self.v));
        self.u
            .iter()
            .zip(&self.v)
            .map(|(u, v)| (u - mu).hypot(v - mv))
            .fold(0.0, f64::max)
    }

    /// Curl estimated from the difference between opposite halves of `bounds`.
    ///
    /// Returns `None` when a half holds no datapoints.
    fn curl(&self, bounds: &Boundary) -> Option<f64> {
        let (long_min, _) = unwrap_long(bounds.long_min(), bounds.long_max());
        let long_mid = long_min + bounds.width() / 2.0;
        let lat_mid = bounds.cy();

        let half_mean = |values: &[f64], pick: &dyn Fn(usize) -> bool| {
            let picked: Vec<f64> = (0..self.len()).filter(|&i| pick(i)).map(|i| values[i]).collect();
            (!picked.is_empty()).then(|| Self::mean(&picked))
        };
        let unwrapped = |i: usize| {
            let long = self.long[i];
            if long < long_min { long + 360.0 } else { long }
        };

        let v_east = half_mean(&self.v, &|i| unwrapped(i) > long_mid)?;
        let v_west = half_mean(&self.v, &|i| unwrapped(i) <= long_mid)?;
        let u_north = half_mean(&self.u, &|i| self.lat[i] > lat_mid)?;
        let u_south = half_mean(&self.u, &|i| self.lat[i] <= lat_mid)?;

        let dx = bounds.width() / 2.0;
        let dy = bounds.height() / 2.0;
        if dx <= 0.0 || dy <= 0.0 {
            return None;
        }
        Some((v_east - v_west) / dx - (u_north - u_south) / dy)
    }
}

impl VectorLoader {
    /// Wrap a dataset holding the `u` and `v` columns named in `data_names`.
    pub fn new(
        name: impl Into<String>,
        data_names: [String; 2],
        dataset: Dataset,
        aggregate_type: AggregationType,
        min_dp: usize,
    ) -> Self {
        Self {
            name: name.into(),
            data_names: data_names.to_vec(),
            dataset,
            aggregate_type,
            min_dp,
        }
    }

    fn samples(&self, data: &Dataset) -> Samples {
        let u = data.column(&self.data_names[0]).unwrap_or_default();
        let v = data.column(&self.data_names[1]).unwrap_or_default();
        let positions = data.positions();

        let mut samples = Samples {
            lat: Vec::new(),
            long: Vec::new(),
            u: Vec::new(),
            v: Vec::new(),
        };
        for ((&(lat, long), &u), &v) in positions.iter().zip(&u).zip(&v) {
            if u.is_nan() || v.is_nan() {
                continue;
            }
            samples.lat.push(lat);
            samples.long.push(long);
            samples.u.push(u);
            samples.v.push(v);
        }
        samples
    }
}

impl DataLoader for VectorLoader {
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

    fn is_vector(&self) -> bool {
        true
    }

    fn get_hom_condition(
        &self,
        bounds: &Boundary,
        data: &Dataset,
        condition: &SplittingCondition,
    ) -> MeshResult<HomCondition> {
        let samples = self.samples(&self.trim_datapoints(bounds, data));
        if samples.len() < self.min_dp || samples.u.is_empty() {
            return Ok(HomCondition::Min);
        }

        match *condition {
            SplittingCondition::Threshold {
                threshold,
                upper_bound,
                lower_bound,
                split_lock,
            } => Ok(threshold_condition(
                &samples.magnitudes(),
                threshold,
                upper_bound,
                lower_bound,
                split_lock,
            )),
            SplittingCondition::Vector { curl, dmag } => {
                if let Some(limit) = dmag
                    && samples.max_deviation() > limit
                {
                    return Ok(HomCondition::Het);
                }
                if let Some(limit) = curl
                    && samples.curl(bounds).is_some_and(|c| c.abs() > limit)
                {
                    return Ok(HomCondition::Het);
                }
                Ok(HomCondition::Clr)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregated::AggValue;
    use crate::dataloader::GriddedField;

    fn field(u: impl Fn(f64, f64) -> f64, v: impl Fn(f64, f64) -> f64) -> VectorLoader {
        let axis: Vec<f64> = (0..=10).map(|i| f64::from(i) / 10.0).collect();
        let mut us = Vec::new();
        let mut vs = Vec::new();
        for &lat in &axis {
            for &long in &axis {
                us.push(u(lat, long));
                vs.push(v(lat, long));
            }
        }
        let grid = GriddedField::new(axis.clone(), axis, vec![("uC".into(), us), ("vC".into(), vs)]).unwrap();
        VectorLoader::new(
            "vector_grid",
            ["uC".into(), "vC".into()],
            grid.into(),
            AggregationType::Mean,
            5,
        )
    }

    fn unit() -> Boundary {
        Boundary::new([0.0, 1.0], [0.0, 1.0], None).unwrap()
    }

    #[test]
    fn test_uniform_field_is_clear() {
        let l = field(|_, _| 1.0, |_, _| 2.0);
        let cond = SplittingCondition::Vector { curl: Some(0.1), dmag: Some(0.1) };
        assert_eq!(l.get_hom_condition(&unit(), l.dataset(), &cond).unwrap(), HomCondition::Clr);

        let value = l.get_value(&unit(), l.dataset());
        assert_eq!(value["uC"], AggValue::Scalar(1.0));
        assert_eq!(value["vC"], AggValue::Scalar(2.0));
    }

    #[test]
    fn test_dmag() {
        let l = field(|_, long| if long > 0.5 { 1.0 } else { -1.0 }, |_, _| 0.0);
        let cond = SplittingCondition::Vector { curl: None, dmag: Some(0.5) };
        assert_eq!(l.get_hom_condition(&unit(), l.dataset(), &cond).unwrap(), HomCondition::Het);
    }

    #[test]
    fn test_curl() {
        // Solid-body rotation: u = -y, v = x
        let l = field(|lat, _| -lat, |_, long| long);
        let cond = SplittingCondition::Vector { curl: Some(0.5), dmag: None };
        assert_eq!(l.get_hom_condition(&unit(), l.dataset(), &cond).unwrap(), HomCondition::Het);

        let calm = SplittingCondition::Vector { curl: Some(100.0), dmag: None };
        assert_eq!(l.get_hom_condition(&unit(), l.dataset(), &calm).unwrap(), HomCondition::Clr);
    }

    #[test]
    fn test_magnitude_threshold() {
        let l = field(|_, long| if long > 0.5 { 3.0 } else { 0.0 }, |_, long| if long > 0.5 { 4.0 } else { 0.0 });
        let cond = SplittingCondition::Threshold {
            threshold: 1.0,
            upper_bound: 0.9,
            lower_bound: 0.1,
            split_lock: false,
        };
        assert_eq!(l.get_hom_condition(&unit(), l.dataset(), &cond).unwrap(), HomCondition::Het);
    }

    #[test]
    fn test_min_datapoints() {
        let l = field(|_, _| f64::NAN, |_, _| 1.0);
        let cond = SplittingCondition::Vector { curl: None, dmag: Some(0.1) };
        assert_eq!(l.get_hom_condition(&unit(), l.dataset(), &cond).unwrap(), HomCondition::Min);
    }
}
