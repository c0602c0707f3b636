//! Plain-text outputs: lists of flooded grid points and exceedance summary tables.
use std::collections::BTreeMap;
use std::io::Write;

use ndarray::{ArrayView2, Zip};

use crate::aggregator::FloodObs;
use crate::durations::AccumDuration;
use crate::error::AggregationError;

/// Location of one grid cell, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPoint {
    pub lat: f32,
    pub lon: f32,
}

/// Collect the coordinates of every cell that is `true` in `grid`, in row-major order.
///
/// `lat` and `lon` give the coordinates of each cell and must have the same shape as `grid`.
pub fn exceeded_points(
    grid: ArrayView2<'_, bool>,
    lat: ArrayView2<'_, f32>,
    lon: ArrayView2<'_, f32>,
) -> Result<Vec<GridPoint>, AggregationError> {
    if lat.dim() != grid.dim() {
        return Err(AggregationError::shape_mismatch("latitude", grid.dim(), lat.dim()));
    }
    if lon.dim() != grid.dim() {
        return Err(AggregationError::shape_mismatch("longitude", grid.dim(), lon.dim()));
    }

    let mut points = vec![];
    Zip::from(&grid).and(&lat).and(&lon).for_each(|&hit, &lat, &lon| {
        if hit {
            points.push(GridPoint { lat, lon });
        }
    });
    Ok(points)
}

/// Write a point list: the grid name on the first line, then one `lat lon` pair per
/// line, rounded to 0.1 degree. An empty list still gets the name line.
pub fn write_point_list<W: Write>(writer: &mut W, name: &str, points: &[GridPoint]) -> std::io::Result<()> {
    writeln!(writer, "{name}")?;
    for pt in points {
        writeln!(writer, "{:.1} {:.1}", pt.lat, pt.lon)?;
    }
    Ok(())
}

/// Exceedance counts for one processed window, kept after its grids are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSummary {
    pub label: String,
    pub exceeded: BTreeMap<AccumDuration, usize>,
    pub flood_cells: usize,
}

impl WindowSummary {
    pub fn new<S: ToString>(label: S, obs: &FloodObs) -> Self {
        Self { label: label.to_string(), exceeded: obs.exceeded_counts(), flood_cells: obs.flood_cell_count() }
    }
}

/// Write a table with one row per window: its label, the number of cells exceeding
/// each duration's threshold and the number of flooded cells. Durations that were not
/// evaluated are shown as "-".
pub fn write_summary_table<W: Write>(writer: &mut W, rows: &[WindowSummary]) -> std::io::Result<()> {
    let mut builder = tabled::builder::Builder::new();
    let mut header = vec!["window".to_string()];
    header.extend(AccumDuration::ALL.iter().map(|d| d.short_name()));
    header.push("flood".to_string());
    builder.push_record(header);

    for row in rows {
        let mut record = vec![row.label.clone()];
        record.extend(
            AccumDuration::ALL
                .iter()
                .map(|d| row.exceeded.get(d).map(|n| n.to_string()).unwrap_or_else(|| "-".to_string())),
        );
        record.push(row.flood_cells.to_string());
        builder.push_record(record);
    }

    let mut table = builder.build();
    table
        .with(tabled::settings::style::Style::blank())
        .with(tabled::settings::Alignment::left());
    writeln!(writer, "{table}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::aggregate_exceedance;
    use crate::criteria::FloodCriteria;
    use crate::durations::VerificationWindow;
    use crate::grids::BucketAccumulations;
    use crate::test_utils::uniform_thresholds;
    use ndarray::{array, Array2, Array3};

    #[test]
    fn test_exceeded_points() {
        let grid = array![[false, true], [true, false]];
        let lat = array![[40.04, 40.04], [39.96, 39.96]];
        let lon = array![[-100.0, -99.9], [-100.0, -99.9]];
        let points = exceeded_points(grid.view(), lat.view(), lon.view()).unwrap();
        assert_eq!(
            points,
            vec![GridPoint { lat: 40.04, lon: -99.9 }, GridPoint { lat: 39.96, lon: -100.0 }]
        );
    }

    #[test]
    fn test_exceeded_points_shape() {
        let grid = Array2::from_elem((2, 3), true);
        let lat = Array2::zeros((3, 2));
        let lon = Array2::zeros((2, 3));
        let err = exceeded_points(grid.view(), lat.view(), lon.view()).unwrap_err();
        assert!(matches!(err, AggregationError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_write_point_list() {
        let points = vec![GridPoint { lat: 40.04, lon: -99.87 }, GridPoint { lat: 35.0, lon: -85.26 }];
        let mut buf = vec![];
        write_point_list(&mut buf, "ST4gARI", &points).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "ST4gARI\n40.0 -99.9\n35.0 -85.3\n");

        let mut buf = vec![];
        write_point_list(&mut buf, "ST4gFFG", &[]).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "ST4gFFG\n");
    }

    #[test]
    fn test_summary_table() {
        let window = VerificationWindow::new(1, 3).unwrap();
        let mut accum = Array3::zeros((2, 2, 3));
        accum[[0, 0, 1]] = 5.0f32;
        let thresholds = uniform_thresholds(2, 2, &[(AccumDuration::OneHour, 1.0), (AccumDuration::ThreeHour, 4.0)]);
        let criteria = FloodCriteria::from_durations(&[AccumDuration::OneHour, AccumDuration::ThreeHour]).unwrap();
        let obs = aggregate_exceedance(&window, accum.view(), &BucketAccumulations::new(), &thresholds, &criteria)
            .unwrap();

        let mut buf = vec![];
        write_summary_table(&mut buf, &[WindowSummary::new("day1", &obs)]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<Vec<&str>> = text.lines().map(|l| l.split_whitespace().collect()).collect();
        assert_eq!(lines[0], vec!["window", "01h", "03h", "06h", "12h", "24h", "flood"]);
        assert_eq!(lines[1], vec!["day1", "1", "1", "-", "-", "-", "1"]);
    }
}
