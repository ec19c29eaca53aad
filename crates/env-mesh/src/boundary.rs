//! Geo-spatial and temporal bounds of a mesh or cellbox.
//!
//! A [`Boundary`] is an axis-aligned lat/long rectangle with an optional
//! date range. Longitudes lie in `[-180, 180]`; a boundary whose `long_min`
//! is greater than its `long_max` wraps through the antimeridian.
//!
//! All coordinates are degrees in EPSG:4326.

use chrono::{Duration, Local, NaiveDate};
use geo::{BoundingRect, Geometry, LineString, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};
use wkt::{ToWkt, TryFromWkt};

use crate::error::{MeshError, MeshResult};

const DATE_FORMAT: &str = "%Y-%m-%d";
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Inclusive date range of a boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimeRange {
    /// Parse a pair of date strings (see [`parse_datetime`]).
    pub fn parse(start: &str, end: &str) -> MeshResult<Self> {
        Ok(Self {
            start: parse_datetime(start)?,
            end: parse_datetime(end)?,
        })
    }

    /// Whether `date` falls within the range, both ends included.
    #[inline]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Parse a date given as `YYYY-MM-DD`, `TODAY`, `TODAY + n` or `TODAY - n`.
///
/// `n` is a number of days and may be fractional, in which case it is
/// truncated to whole days.
pub fn parse_datetime(input: &str) -> MeshResult<NaiveDate> {
    let text = input.trim().to_uppercase();
    if let Ok(date) = NaiveDate::parse_from_str(&text, DATE_FORMAT) {
        return Ok(date);
    }

    let bad_date = |details: String| MeshError::invalid_boundary(details);
    let Some(offset) = text.strip_prefix("TODAY") else {
        return Err(bad_date(format!("cannot convert \"{}\" to a date", input)));
    };

    let today = Local::now().date_naive();
    let offset = offset.trim();
    if offset.is_empty() {
        return Ok(today);
    }

    let (sign, amount) = if let Some(rest) = offset.strip_prefix('+') {
        (1, rest.trim())
    } else if let Some(rest) = offset.strip_prefix('-') {
        (-1, rest.trim())
    } else {
        return Err(bad_date(format!("cannot convert \"{}\" to a date", input)));
    };

    let days: f64 = amount.parse().map_err(|_| {
        bad_date(format!(
            "cannot convert \"{}\" to a date, day offset \"{}\" is not a number",
            input, amount
        ))
    })?;

    Ok(today + Duration::days(sign * days as i64))
}

/// Format a date the way configs and exported meshes store it.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Closed rectangle ring, counter-clockwise from the SW corner in `(long, lat)`.
fn rectangle(long_min: f64, long_max: f64, lat_min: f64, lat_max: f64) -> Polygon<f64> {
    let ring = LineString::from(vec![
        (long_min, lat_min),
        (long_min, lat_max),
        (long_max, lat_max),
        (long_max, lat_min),
        (long_min, lat_min),
    ]);
    Polygon::new(ring, vec![])
}

/// Geo-spatial/temporal limits of a mesh or a cellbox.
#[derive(Debug, Clone)]
pub struct Boundary {
    lat_min: f64,
    lat_max: f64,
    long_min: f64,
    long_max: f64,
    time_range: Option<TimeRange>,
}

impl Boundary {
    /// Create a boundary from `[min, max]` lat and long ranges.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::InvalidBoundary`] if `lat_min > lat_max`, if a
    /// longitude lies outside `[-180, 180]`, if a value is not finite, or if
    /// the time range starts after it ends.
    pub fn new(lat_range: [f64; 2], long_range: [f64; 2], time_range: Option<TimeRange>) -> MeshResult<Self> {
        let [lat_min, lat_max] = lat_range;
        let [long_min, long_max] = long_range;

        if [lat_min, lat_max, long_min, long_max].iter().any(|v| !v.is_finite()) {
            return Err(MeshError::invalid_boundary("range values must be finite"));
        }
        if lat_min > lat_max {
            return Err(MeshError::invalid_boundary(format!(
                "latitude start {} should not be greater than range end {}",
                lat_min, lat_max
            )));
        }
        if !(-90.0..=90.0).contains(&lat_min) || !(-90.0..=90.0).contains(&lat_max) {
            return Err(MeshError::invalid_boundary(format!(
                "latitude range [{}, {}] should be within -90:90",
                lat_min, lat_max
            )));
        }
        if !(-180.0..=180.0).contains(&long_min) || !(-180.0..=180.0).contains(&long_max) {
            return Err(MeshError::invalid_boundary(format!(
                "longitude range [{}, {}] should be within -180:180",
                long_min, long_max
            )));
        }
        if let Some(t) = &time_range
            && t.start > t.end
        {
            return Err(MeshError::invalid_boundary(format!(
                "start time {} should not be after end time {}",
                format_date(t.start),
                format_date(t.end)
            )));
        }

        Ok(Self {
            lat_min,
            lat_max,
            long_min,
            long_max,
            time_range,
        })
    }

    /// Create a boundary with a time range given as date strings.
    pub fn with_dates(lat_range: [f64; 2], long_range: [f64; 2], start: &str, end: &str) -> MeshResult<Self> {
        Self::new(lat_range, long_range, Some(TimeRange::parse(start, end)?))
    }

    /// Recover a boundary from a `POLYGON` or two-part `MULTIPOLYGON` WKT string.
    ///
    /// The result carries no time range.
    pub fn from_poly_string(poly: &str) -> MeshResult<Self> {
        let geometry = Geometry::<f64>::try_from_wkt_str(poly.trim())
            .map_err(|e| MeshError::invalid_boundary(format!("cannot read '{}' as WKT: {}", poly, e)))?;
        let extent = |polygon: &Polygon<f64>| {
            polygon
                .bounding_rect()
                .ok_or_else(|| MeshError::invalid_boundary(format!("'{}' has an empty polygon", poly)))
        };

        match &geometry {
            Geometry::Polygon(polygon) => {
                let rect = extent(polygon)?;
                Self::new([rect.min().y, rect.max().y], [rect.min().x, rect.max().x], None)
            }
            Geometry::MultiPolygon(MultiPolygon(parts)) if parts.len() == 2 => {
                let (first, second) = (extent(&parts[0])?, extent(&parts[1])?);
                let (east, west) = if first.max().x >= 180.0 { (first, second) } else { (second, first) };
                if east.min().y != west.min().y || east.max().y != west.max().y {
                    return Err(MeshError::invalid_boundary(
                        "latitudes of the multipolygon parts do not match",
                    ));
                }
                Self::new([east.min().y, east.max().y], [east.min().x, west.max().x], None)
            }
            _ => Err(MeshError::invalid_boundary(format!(
                "expected a polygon or a two-part multipolygon, found '{}'",
                poly
            ))),
        }
    }

    #[inline]
    pub fn lat_min(&self) -> f64 {
        self.lat_min
    }

    #[inline]
    pub fn lat_max(&self) -> f64 {
        self.lat_max
    }

    #[inline]
    pub fn long_min(&self) -> f64 {
        self.long_min
    }

    #[inline]
    pub fn long_max(&self) -> f64 {
        self.long_max
    }

    #[inline]
    pub fn time_range(&self) -> Option<&TimeRange> {
        self.time_range.as_ref()
    }

    /// Same spatial extent with a different time range.
    pub fn with_time_range(mut self, time_range: Option<TimeRange>) -> Self {
        self.time_range = time_range;
        self
    }

    /// Whether the boundary wraps through the antimeridian.
    #[inline]
    pub fn crosses_antimeridian(&self) -> bool {
        self.long_min > self.long_max
    }

    /// Height in degrees latitude.
    #[inline]
    pub fn height(&self) -> f64 {
        self.lat_max - self.lat_min
    }

    /// Width in degrees longitude, accounting for antimeridian wraparound.
    #[inline]
    pub fn width(&self) -> f64 {
        if self.long_max > self.long_min {
            self.long_max - self.long_min
        } else {
            (180.0 - self.long_min) + (self.long_max + 180.0)
        }
    }

    /// Longitude of the centroid.
    pub fn cx(&self) -> f64 {
        let cx = self.long_min + self.width() / 2.0;
        if cx >= 180.0 { cx - 360.0 } else { cx }
    }

    /// Latitude of the centroid.
    pub fn cy(&self) -> f64 {
        self.lat_min + self.height() / 2.0
    }

    /// Distance in degrees longitude from the edge to the centroid.
    #[inline]
    pub fn dcx(&self) -> f64 {
        self.width() / 2.0
    }

    /// Distance in degrees latitude from the edge to the centroid.
    #[inline]
    pub fn dcy(&self) -> f64 {
        self.height() / 2.0
    }

    /// Whether the boundary spans every longitude.
    pub fn is_global(&self) -> bool {
        self.long_min == -180.0 && self.long_max == 180.0
    }

    /// Great-circle length of the diagonal divided by sqrt(2), in metres.
    ///
    /// Used as a characteristic side length of the cell.
    pub fn calc_size(&self) -> f64 {
        let (lon1, lat1) = (self.long_min.to_radians(), self.lat_min.to_radians());
        let (lon2, lat2) = (self.long_max.to_radians(), self.lat_max.to_radians());
        let dlon = lon2 - lon1;
        let dlat = lat2 - lat1;
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();
        EARTH_RADIUS_M * c / std::f64::consts::SQRT_2
    }

    /// Quarter the boundary at its midpoint.
    ///
    /// Children are returned in the fixed order **SW, NW, SE, NE**; the
    /// neighbour graph repair code indexes into this order. Each child keeps
    /// the parent's time range.
    pub fn split(&self) -> [Boundary; 4] {
        let lat_mid = self.lat_min + self.height() / 2.0;
        let (west_max, east_min) = wrap_meridian(self.long_min + self.width() / 2.0);

        let child = |lat_min, lat_max, long_min, long_max| Boundary {
            lat_min,
            lat_max,
            long_min,
            long_max,
            time_range: self.time_range,
        };

        [
            child(self.lat_min, lat_mid, self.long_min, west_max),
            child(lat_mid, self.lat_max, self.long_min, west_max),
            child(self.lat_min, lat_mid, east_min, self.long_max),
            child(lat_mid, self.lat_max, east_min, self.long_max),
        ]
    }

    /// Polygon footprint in `(long, lat)`, split in two where it crosses
    /// the antimeridian.
    pub fn to_polygon(&self) -> Geometry<f64> {
        let (lat_min, lat_max) = (self.lat_min, self.lat_max);
        if self.long_min < self.long_max {
            Geometry::Polygon(rectangle(self.long_min, self.long_max, lat_min, lat_max))
        } else if self.long_min == 180.0 {
            Geometry::Polygon(rectangle(-180.0, self.long_max, lat_min, lat_max))
        } else if self.long_max == -180.0 {
            Geometry::Polygon(rectangle(self.long_min, 180.0, lat_min, lat_max))
        } else {
            Geometry::MultiPolygon(MultiPolygon::new(vec![
                rectangle(self.long_min, 180.0, lat_min, lat_max),
                rectangle(-180.0, self.long_max, lat_min, lat_max),
            ]))
        }
    }

    /// Well-known-text polygon of the footprint.
    pub fn to_poly_string(&self) -> String {
        self.to_polygon().wkt_string()
    }

    /// Whether a point lies within the boundary.
    ///
    /// The south and west edges are inclusive and the north and east edges
    /// exclusive, so a point on a shared edge belongs to exactly one of two
    /// adjacent cells.
    pub fn contains_point(&self, lat: f64, long: f64) -> bool {
        let in_lat = lat >= self.lat_min && lat < self.lat_max;
        let in_long = if self.crosses_antimeridian() {
            long >= self.long_min || long < self.long_max
        } else {
            long >= self.long_min && long < self.long_max
        };
        in_lat && in_long
    }

    /// Whether a datapoint falls inside, using the `(min, max]` convention
    /// shared by every data source.
    pub fn contains_datapoint(&self, lat: f64, long: f64, date: Option<NaiveDate>) -> bool {
        if !(lat > self.lat_min && lat <= self.lat_max) {
            return false;
        }
        let in_long = if self.crosses_antimeridian() {
            long > self.long_min || long <= self.long_max
        } else {
            long > self.long_min && long <= self.long_max
        };
        if !in_long {
            return false;
        }
        match (&self.time_range, date) {
            (Some(range), Some(date)) => range.contains(date),
            _ => true,
        }
    }

    /// Whether `other` lies fully inside this boundary (edges may coincide).
    pub fn encloses(&self, other: &Boundary) -> bool {
        if other.lat_min < self.lat_min || other.lat_max > self.lat_max {
            return false;
        }
        let (a0, a1) = unwrap_long(self.long_min, self.long_max);
        let (mut b0, mut b1) = unwrap_long(other.long_min, other.long_max);
        if b0 < a0 {
            b0 += 360.0;
            b1 += 360.0;
        }
        b0 >= a0 && b1 <= a1
    }
}

/// Wrap an unwrapped meridian back into `[-180, 180]`.
///
/// Returns the value to use as the eastern edge of the cell to its west and
/// as the western edge of the cell to its east. They differ only at the
/// antimeridian, which closes a western cell at 180 and opens an eastern
/// one at -180.
#[inline]
pub(crate) fn wrap_meridian(long: f64) -> (f64, f64) {
    let west_max = if long > 180.0 { long - 360.0 } else { long };
    let east_min = if long >= 180.0 { long - 360.0 } else { long };
    (west_max, east_min)
}

/// Map a longitude range onto a monotonic interval that may exceed 180.
#[inline]
pub(crate) fn unwrap_long(long_min: f64, long_max: f64) -> (f64, f64) {
    if long_max < long_min {
        (long_min, long_max + 360.0)
    } else {
        (long_min, long_max)
    }
}

impl PartialEq for Boundary {
    /// Spatial limits must match. Time ranges must either match or be
    /// absent on both sides.
    fn eq(&self, other: &Self) -> bool {
        self.lat_min == other.lat_min
            && self.lat_max == other.lat_max
            && self.long_min == other.long_min
            && self.long_max == other.long_max
            && self.time_range == other.time_range
    }
}

impl std::fmt::Display for Boundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "lat [{}, {}], long [{}, {}]",
            self.lat_min, self.lat_max, self.long_min, self.long_max
        )?;
        if let Some(t) = &self.time_range {
            write!(f, ", time [{}, {}]", format_date(t.start), format_date(t.end))?;
        }
        Ok(())
    }
}
