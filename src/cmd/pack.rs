//! Pack command - build a package archive from a directory

use std::path::PathBuf;

use anyhow::{Result, bail};

use upack::core::metadata::MetadataValue;
use upack::ops::{BuildRequest, build_package};

#[allow(clippy::too_many_arguments)]
pub fn pack(
    source: PathBuf,
    name: String,
    version: String,
    group: Option<String>,
    include: Vec<String>,
    exclude: Vec<String>,
    meta: Vec<String>,
    output: PathBuf,
    overwrite: bool,
) -> Result<()> {
    let extra_metadata = parse_meta(&meta)?;

    let request = BuildRequest {
        source_dir: source,
        include,
        exclude,
        group,
        name,
        version,
        extra_metadata,
        output,
        overwrite,
    };

    match build_package(&request)? {
        Some(identity) => println!("Built {identity}"),
        None => println!("Nothing to do"),
    }
    Ok(())
}

/// Parse `key=value` metadata flags.
fn parse_meta(meta: &[String]) -> Result<Vec<(String, MetadataValue)>> {
    meta.iter()
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                Ok((key.to_string(), MetadataValue::from(value)))
            }
            _ => bail!("Invalid metadata entry '{entry}': expected key=value"),
        })
        .collect()
}
