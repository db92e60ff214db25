//! Archive layout of a finished run.

use std::collections::HashMap;

use netcdf_io::{ArchiveSchema, ArrayData, DimensionSize, NumericType, VariableDecl};

use crate::buffers::{TimeAxisBuffer, VariableBuffer};
use crate::catalog::DatasetReference;
use crate::subset::GridWindow;

/// Schema and data of one archive, ready for the writer.
#[derive(Debug, Clone)]
pub struct ArchiveContents {
    pub schema: ArchiveSchema,
    pub coordinates: HashMap<String, ArrayData>,
    pub variables: HashMap<String, ArrayData>,
}

/// Declare `time` (unlimited), `lat` and `lon`, the coordinate variables and
/// one `[time, lat, lon]` variable per buffer.
pub fn build_schema(
    reference: &DatasetReference,
    window: &GridWindow,
    time: &TimeAxisBuffer,
    buffers: &[VariableBuffer],
) -> ArchiveSchema {
    let mut time_decl = VariableDecl::new("time", &["time"], NumericType::F64)
        .with_attribute("units", time.units.as_str())
        .with_attribute("calendar", time.calendar.as_str());
    if let Some(origin) = time.time_origin() {
        time_decl = time_decl.with_attribute("time_origin", origin);
    }

    let mut schema = ArchiveSchema::new()
        .dimension(
            "time",
            DimensionSize::Unlimited {
                final_len: time.steps(),
            },
        )
        .dimension("lat", DimensionSize::Fixed(window.nlat()))
        .dimension("lon", DimensionSize::Fixed(window.nlon()))
        .global_attribute("source", reference.url.as_str())
        .global_attribute("dataset_family", reference.family.as_str())
        .variable(time_decl)
        .variable(
            VariableDecl::new("lat", &["lat"], NumericType::F64)
                .with_attribute("units", "degrees_north")
                .with_attribute("long_name", "latitude"),
        )
        .variable(
            VariableDecl::new("lon", &["lon"], NumericType::F64)
                .with_attribute("units", "degrees_east")
                .with_attribute("long_name", "longitude"),
        );

    for buffer in buffers {
        let fill = buffer.fill_value as f64;
        schema = schema.variable(
            VariableDecl::new(buffer.name.as_str(), &["time", "lat", "lon"], NumericType::F32)
                .with_attribute("units", buffer.units.as_str())
                .with_attribute("long_name", buffer.long_name.as_str())
                .with_attribute("_FillValue", fill)
                .with_attribute("missing_value", fill),
        );
    }

    schema
}

/// Move the run's buffers into writer input.
pub fn assemble(
    reference: &DatasetReference,
    window: &GridWindow,
    time: TimeAxisBuffer,
    buffers: Vec<VariableBuffer>,
) -> ArchiveContents {
    let schema = build_schema(reference, window, &time, &buffers);

    let mut coordinates = HashMap::new();
    coordinates.insert("time".to_string(), ArrayData::F64(time.into_values()));
    coordinates.insert("lat".to_string(), ArrayData::F64(window.lat().to_vec()));
    coordinates.insert("lon".to_string(), ArrayData::F64(window.lon().to_vec()));

    let variables = buffers
        .into_iter()
        .map(|b| (b.name.clone(), ArrayData::F32(b.into_data())))
        .collect();

    ArchiveContents {
        schema,
        coordinates,
        variables,
    }
}
