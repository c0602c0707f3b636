//! Reading regridded inputs from and writing flood observations to netCDF files.
//!
//! Input files hold one verification window each, with every grid already on the
//! same (lat, lon) lattice. Which variables hold what is given by
//! [`InputConfig`]; see the `calc_flood_obs` template configuration.
use std::path::Path;

use chrono::NaiveDateTime;
use ndarray::{Array2, Array3, ArrayD, Dimension, Ix1, Ix2, Ix3};
use netcdf::{AttributeValue, Extents};

use crate::aggregator::{FloodObs, WindowInputs};
use crate::config::{InputConfig, RunConfig, ThresholdSource};
use crate::criteria::{ari_thresholds, ffg_thresholds};
use crate::durations::{AccumDuration, VerificationWindow};
use crate::error::AggregationError;
use crate::grids::{spatial_shape, sum_buckets, BucketAccumulations, ThresholdGrid, Thresholds};

/// Format of the time-of-hour-zero global attribute.
pub const HOUR_ZERO_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, thiserror::Error)]
pub enum NcError {
    #[error("Variable '{0}' not found")]
    MissingVariable(String),
    #[error("Variable '{varname}' has {actual} dimensions, expected {expected}")]
    WrongDimensions { varname: String, expected: usize, actual: usize },
    #[error("Attribute '{name}' is invalid: {reason}")]
    BadAttribute { name: String, reason: String },
    #[error(transparent)]
    Netcdf(#[from] netcdf::Error),
    #[error(transparent)]
    Aggregation(#[from] AggregationError),
}

impl NcError {
    fn missing_variable<S: ToString>(varname: S) -> Self {
        Self::MissingVariable(varname.to_string())
    }

    fn bad_attribute<S: ToString, R: ToString>(name: S, reason: R) -> Self {
        Self::BadAttribute { name: name.to_string(), reason: reason.to_string() }
    }
}

/// Everything read from one input file.
#[derive(Debug, Clone)]
pub struct GridFile {
    pub inputs: WindowInputs,
    pub mask: Option<Array2<bool>>,
    pub lat: Array2<f32>,
    pub lon: Array2<f32>,
    pub hour_zero: Option<NaiveDateTime>,
}

impl GridFile {
    pub fn read(nc_file: &Path, config: &RunConfig) -> Result<Self, NcError> {
        let ds = netcdf::open(nc_file)?;
        let inputs = read_window_inputs(&ds, &config.inputs, config.window.first_valid_hour)?;
        let shape = spatial_shape(inputs.hourly_accum.view());

        let mask = if let Some(varname) = &config.inputs.mask {
            let mask = read_f32_array::<Ix2>(&ds, varname)?.mapv(|v| !v.is_nan() && v != 0.0);
            Some(mask)
        } else {
            None
        };

        let (lat, lon) = read_coordinates(&ds, &config.inputs.lat, &config.inputs.lon, shape)?;
        let hour_zero = read_hour_zero(&ds, &config.window.hour_zero_attribute)?;
        Ok(Self { inputs, mask, lat, lon, hour_zero })
    }
}

/// Read a float variable with exactly `D` dimensions.
pub fn read_f32_array<D: Dimension>(ds: &netcdf::File, varname: &str) -> Result<ndarray::Array<f32, D>, NcError> {
    let data: ArrayD<f32> = ds
        .variable(varname)
        .ok_or_else(|| NcError::missing_variable(varname))?
        .get::<f32, _>(Extents::All)?;
    let ndim = data.ndim();
    data.into_dimensionality::<D>().map_err(|_| NcError::WrongDimensions {
        varname: varname.to_string(),
        expected: D::NDIM.unwrap_or(0),
        actual: ndim,
    })
}

/// Read the accumulations and thresholds for one window.
pub fn read_window_inputs(ds: &netcdf::File, inputs: &InputConfig, first_valid_hour: u32) -> Result<WindowInputs, NcError> {
    let hourly_accum = read_f32_array::<Ix3>(ds, &inputs.hourly_accum)?;
    let (_, _, nhours) = hourly_accum.dim();
    let window = VerificationWindow::new(first_valid_hour, nhours)?;

    let mut bucket_accum = BucketAccumulations::new();
    for bvar in inputs.bucket_accum.iter() {
        let arr = read_f32_array::<Ix3>(ds, &bvar.varname)?;
        if let Some(total_duration) = bvar.window_total_as {
            log::debug!("Using the sum of '{}' as the {total_duration} accumulation", bvar.varname);
            bucket_accum.insert(total_duration, sum_buckets(arr.view()));
        }
        bucket_accum.insert(bvar.duration, arr);
    }

    let thresholds = read_thresholds(ds, &inputs.thresholds)?;
    Ok(WindowInputs { window, hourly_accum, bucket_accum, thresholds })
}

fn read_thresholds(ds: &netcdf::File, source: &ThresholdSource) -> Result<Thresholds, NcError> {
    match source {
        ThresholdSource::AriStack { ari_stack } => {
            let stack = read_f32_array::<Ix3>(ds, ari_stack)?;
            Ok(ari_thresholds(stack.view())?)
        }
        ThresholdSource::Ffg { ffg_01hr, ffg_03hr, ffg_06hr } => {
            let f1 = read_f32_array::<Ix3>(ds, ffg_01hr)?;
            let f3 = read_f32_array::<Ix3>(ds, ffg_03hr)?;
            let f6 = read_f32_array::<Ix3>(ds, ffg_06hr)?;
            Ok(ffg_thresholds(f1.view(), f3.view(), f6.view()))
        }
        ThresholdSource::PerDuration { per_duration } => {
            let mut thresholds = Thresholds::new();
            for tvar in per_duration {
                let grid = if tvar.per_bucket {
                    ThresholdGrid::PerBucket(read_f32_array::<Ix3>(ds, &tvar.varname)?)
                } else {
                    ThresholdGrid::Static(read_f32_array::<Ix2>(ds, &tvar.varname)?)
                };
                thresholds.insert(tvar.duration, grid);
            }
            Ok(thresholds)
        }
    }
}

/// Read latitude and longitude as 2D (lat, lon) grids. One-dimensional coordinate
/// variables are expanded onto the grid.
pub fn read_coordinates(
    ds: &netcdf::File,
    lat_var: &str,
    lon_var: &str,
    shape: (usize, usize),
) -> Result<(Array2<f32>, Array2<f32>), NcError> {
    let lat = read_coordinate(ds, lat_var, shape, true)?;
    let lon = read_coordinate(ds, lon_var, shape, false)?;
    Ok((lat, lon))
}

fn read_coordinate(ds: &netcdf::File, varname: &str, shape: (usize, usize), along_rows: bool) -> Result<Array2<f32>, NcError> {
    let ndim = ds
        .variable(varname)
        .ok_or_else(|| NcError::missing_variable(varname))?
        .dimensions()
        .len();

    let coord = if ndim == 1 {
        let values = read_f32_array::<Ix1>(ds, varname)?;
        let expected = if along_rows { shape.0 } else { shape.1 };
        if values.len() != expected {
            return Err(AggregationError::shape_mismatch(varname, shape, (values.len(), 1)).into());
        }
        Array2::from_shape_fn(shape, |(i, j)| if along_rows { values[i] } else { values[j] })
    } else {
        read_f32_array::<Ix2>(ds, varname)?
    };

    if coord.dim() != shape {
        return Err(AggregationError::shape_mismatch(varname, shape, coord.dim()).into());
    }
    Ok(coord)
}

/// Read the time of valid hour 0 from a global attribute, if the file has it.
pub fn read_hour_zero(ds: &netcdf::File, attr_name: &str) -> Result<Option<NaiveDateTime>, NcError> {
    let attr = if let Some(attr) = ds.attribute(attr_name) {
        attr
    } else {
        return Ok(None);
    };

    let value = attr.value()?;
    let s = if let AttributeValue::Str(s) = value {
        s
    } else {
        return Err(NcError::bad_attribute(attr_name, "not a string"));
    };

    NaiveDateTime::parse_from_str(&s, HOUR_ZERO_FORMAT)
        .map(Some)
        .map_err(|e| NcError::bad_attribute(attr_name, format!("could not parse '{s}' as {HOUR_ZERO_FORMAT}: {e}")))
}

/// Write a flood observation to a new netCDF file.
///
/// The flood grid is written as `name` with dimensions (lat, lon, hour), plus
/// `{name}_any` with the window summary. With `per_duration`, each duration's
/// exceedances are also written as `{name}_{XX}h`.
pub fn write_flood_obs(
    nc_file: &Path,
    obs: &FloodObs,
    name: &str,
    lat: &Array2<f32>,
    lon: &Array2<f32>,
    per_duration: bool,
) -> Result<(), NcError> {
    let (nrow, ncol, nhours) = obs.flood_grid().dim();
    let mut ds = netcdf::create(nc_file)?;
    ds.add_dimension("lat", nrow)?;
    ds.add_dimension("lon", ncol)?;
    ds.add_dimension("hour", nhours)?;

    let mut root = ds
        .root_mut()
        .ok_or_else(|| netcdf::Error::NotFound("root group".to_string()))?;
    root.add_attribute("first_valid_hour", obs.window().first_valid_hour())?;
    root.add_attribute("criteria", obs.exceedances().map(|(d, _)| d.short_name()).collect::<Vec<_>>().join(","))?;

    write_2d(&mut root, "latitude", lat, "degrees_north", "Latitude of each grid cell")?;
    write_2d(&mut root, "longitude", lon, "degrees_east", "Longitude of each grid cell")?;

    let valid_hours = ndarray::Array1::from_iter(obs.window().valid_hours());
    let mut var = root.add_variable::<u32>("valid_hour", &["hour"])?;
    var.put(valid_hours.view(), Extents::All)?;
    var.put_attribute("description", "Hours since 00Z of the first day at the end of each hour")?;

    write_bool_3d(
        &mut root,
        name,
        &obs.flood_grid().to_owned(),
        "1 where any duration exceeded its threshold during this hour",
    )?;

    let summary = obs.window_summary().mapv(u8::from);
    let mut var = root.add_variable::<u8>(&format!("{name}_any"), &["lat", "lon"])?;
    var.put(summary.view(), Extents::All)?;
    var.put_attribute("description", "1 where flooding was observed at any hour of the window")?;

    if per_duration {
        for (duration, exceed) in obs.exceedances() {
            write_bool_3d(
                &mut root,
                &duration_varname(name, duration),
                &exceed.to_owned(),
                &format!("1 where the {duration} accumulation exceeded its threshold"),
            )?;
        }
    }

    Ok(())
}

pub fn duration_varname(name: &str, duration: AccumDuration) -> String {
    format!("{name}_{}", duration.short_name())
}

fn write_2d(grp: &mut netcdf::GroupMut, varname: &str, data: &Array2<f32>, units: &str, description: &str) -> Result<(), NcError> {
    let mut var = grp.add_variable::<f32>(varname, &["lat", "lon"])?;
    var.put(data.view(), Extents::All)?;
    var.put_attribute("units", units)?;
    var.put_attribute("description", description)?;
    Ok(())
}

fn write_bool_3d(grp: &mut netcdf::GroupMut, varname: &str, data: &Array3<bool>, description: &str) -> Result<(), NcError> {
    let values = data.mapv(u8::from);
    let mut var = grp.add_variable::<u8>(varname, &["lat", "lon", "hour"])?;
    var.put(values.view(), Extents::All)?;
    var.put_attribute("description", description)?;
    Ok(())
}
