//! Archive writer.
//!
//! Writes an [`ArchiveSchema`] and its data into a NetCDF-4 file. The file is
//! first produced at a hidden sibling path (`.{name}.partial`) and renamed
//! into place only after every variable was written and the handle closed, so
//! a reader never observes a half-written archive.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{NetCdfError, NetCdfResult};
use crate::native::silence_hdf5_errors;
use crate::schema::{
    ArchiveSchema, ArrayData, AttrValue, AttributeKey, DimensionSize, NumericType, VariableDecl,
};

/// Write `schema` to `path`.
///
/// Every declared variable must have an entry in `coordinates` or
/// `variables` whose length matches its declared shape. On failure the
/// temporary file is removed and nothing exists at `path`.
pub fn write_archive(
    path: &Path,
    schema: &ArchiveSchema,
    coordinates: &HashMap<String, ArrayData>,
    variables: &HashMap<String, ArrayData>,
) -> NetCdfResult<PathBuf> {
    schema.validate()?;

    let temp_path = partial_path(path)?;
    if temp_path.exists() {
        fs::remove_file(&temp_path)?;
    }

    if let Err(e) = write_contents(&temp_path, schema, coordinates, variables) {
        discard_partial(&temp_path);
        return Err(e);
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        discard_partial(&temp_path);
        return Err(e.into());
    }

    info!(
        path = %path.display(),
        variables = schema.variables.len(),
        "Archive written"
    );

    Ok(path.to_path_buf())
}

fn discard_partial(temp_path: &Path) {
    if let Err(rm) = fs::remove_file(temp_path) {
        if rm.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %temp_path.display(), error = %rm, "Failed to remove partial archive");
        }
    }
}

/// Hidden sibling path used while the archive is being written.
pub fn partial_path(path: &Path) -> NetCdfResult<PathBuf> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| NetCdfError::InvalidFormat(format!("not a file path: {}", path.display())))?;
    Ok(path.with_file_name(format!(".{}.partial", name)))
}

fn write_contents(
    path: &Path,
    schema: &ArchiveSchema,
    coordinates: &HashMap<String, ArrayData>,
    variables: &HashMap<String, ArrayData>,
) -> NetCdfResult<()> {
    silence_hdf5_errors();

    // Dropped at the end of this function on every path, closing the file
    // before the caller renames or removes it.
    let mut file = netcdf::create(path).map_err(|e| NetCdfError::OpenFailed {
        location: path.display().to_string(),
        message: e.to_string(),
    })?;

    for dim in &schema.dimensions {
        let result = match dim.size {
            DimensionSize::Fixed(n) => file.add_dimension(&dim.name, n).map(|_| ()),
            DimensionSize::Unlimited { .. } => file.add_unlimited_dimension(&dim.name).map(|_| ()),
        };
        result.map_err(|e| NetCdfError::declaration(format!("dimension '{}'", dim.name), e))?;
    }

    for (name, value) in &schema.global_attributes {
        file.add_attribute(name, value.as_str())
            .map_err(|e| NetCdfError::declaration(format!("global attribute '{}'", name), e))?;
    }

    for decl in &schema.variables {
        let shape = schema.shape_of(decl)?;
        let data = coordinates
            .get(&decl.name)
            .or_else(|| variables.get(&decl.name))
            .ok_or_else(|| {
                NetCdfError::MissingData(format!("no data supplied for variable '{}'", decl.name))
            })?;

        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(NetCdfError::write_failed(
                &decl.name,
                format!("{} values supplied for shape {:?}", data.len(), shape),
            ));
        }
        if data.dtype() != decl.dtype {
            return Err(NetCdfError::write_failed(
                &decl.name,
                format!("{:?} data for a {:?} variable", data.dtype(), decl.dtype),
            ));
        }

        declare_and_write(&mut file, decl, &shape, data)?;
    }

    Ok(())
}

fn declare_and_write(
    file: &mut netcdf::FileMut,
    decl: &VariableDecl,
    shape: &[usize],
    data: &ArrayData,
) -> NetCdfResult<()> {
    let dims: Vec<&str> = decl.dimensions.iter().map(String::as_str).collect();
    let item = || format!("variable '{}'", decl.name);

    let mut var = match decl.dtype {
        NumericType::F32 => file.add_variable::<f32>(&decl.name, &dims),
        NumericType::F64 => file.add_variable::<f64>(&decl.name, &dims),
    }
    .map_err(|e| NetCdfError::declaration(item(), e))?;

    for (key, value) in &decl.attributes {
        let Some(known) = AttributeKey::parse(key) else {
            warn!(variable = %decl.name, attribute = %key, "Skipping unrecognized attribute");
            continue;
        };

        let result = match (known, value) {
            (AttributeKey::FillValue, AttrValue::Number(v)) => match decl.dtype {
                NumericType::F32 => var.set_fill_value(*v as f32),
                NumericType::F64 => var.set_fill_value(*v),
            },
            (AttributeKey::FillValue, AttrValue::Text(t)) => {
                return Err(NetCdfError::declaration(
                    format!("_FillValue of '{}'", decl.name),
                    format!("expected a number, got '{}'", t),
                ));
            }
            (_, AttrValue::Text(t)) => var.put_attribute(known.as_str(), t.as_str()).map(|_| ()),
            (_, AttrValue::Number(v)) => match decl.dtype {
                NumericType::F32 => var.put_attribute(known.as_str(), *v as f32).map(|_| ()),
                NumericType::F64 => var.put_attribute(known.as_str(), *v).map(|_| ()),
            },
        };
        result.map_err(|e| NetCdfError::declaration(format!("{} of '{}'", known, decl.name), e))?;
    }

    let extents: Vec<netcdf::Extent> = shape.iter().map(|&n| netcdf::Extent::from(0..n)).collect();
    let written = match data {
        ArrayData::F32(values) => var.put_values(values.as_slice(), extents.as_slice()),
        ArrayData::F64(values) => var.put_values(values.as_slice(), extents.as_slice()),
    };
    written.map_err(|e| NetCdfError::write_failed(&decl.name, e))?;

    debug!(variable = %decl.name, shape = ?shape, "Variable written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_path_is_hidden_sibling() {
        let p = partial_path(Path::new("/tmp/out/crudosFNL_2022-05-20__2022-05-26.nc")).unwrap();
        assert_eq!(
            p,
            PathBuf::from("/tmp/out/.crudosFNL_2022-05-20__2022-05-26.nc.partial")
        );
    }

    #[test]
    fn test_partial_path_rejects_directory_root() {
        assert!(partial_path(Path::new("/")).is_err());
    }
}
