//! Reading hit lists and requests from JSON or YAML files

use anyhow::{Context, Result};
use mixup::config::MixupDefaults;
use mixup::{Hits, MixupRequest};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Parse a file as YAML when its extension says so, JSON otherwise.
pub fn read_value(path: &Path) -> Result<Value> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid YAML in {}", path.display())),
        _ => serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in {}", path.display())),
    }
}

/// Read a hit list: either `{"total": N, "hits": [...]}` or a bare array.
/// Without a `total` the list length is used.
pub fn read_hits(path: &Path) -> Result<Hits> {
    hits_from_value(read_value(path)?)
        .with_context(|| format!("Invalid hit list in {}", path.display()))
}

fn hits_from_value(value: Value) -> Result<Hits> {
    let has_total = value.get("total").is_some();
    if value.is_array() {
        return Ok(Hits::from_candidates(serde_json::from_value(value)?));
    }
    let hits: Hits = serde_json::from_value(value)?;
    if has_total {
        Ok(hits)
    } else {
        Ok(Hits::from_candidates(hits.hits))
    }
}

/// Read a request, filling fields the file leaves out from `defaults`.
/// `from` and `size` override whatever the file says.
pub fn read_request(
    path: &Path,
    defaults: &MixupDefaults,
    from: Option<usize>,
    size: Option<usize>,
) -> Result<MixupRequest> {
    let value = read_value(path)?;
    request_from_value(value, defaults, from, size)
        .with_context(|| format!("Invalid mixup request in {}", path.display()))
}

fn request_from_value(
    mut value: Value,
    defaults: &MixupDefaults,
    from: Option<usize>,
    size: Option<usize>,
) -> Result<MixupRequest> {
    if let Some(obj) = value.as_object_mut() {
        obj.entry("size").or_insert_with(|| defaults.size.into());
        for key in ["grouping_mixup", "mixup"] {
            if let Some(mixup) = obj.get_mut(key) {
                defaults.fill(mixup);
            }
        }
    }

    let mut request: MixupRequest = serde_json::from_value(value)?;
    if let Some(from) = from {
        request.from = from;
    }
    if let Some(size) = size {
        request.size = size;
    }
    Ok(request)
}

/// Pretty JSON to `output`, or stdout when none is given.
pub fn write_output<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
        }
        None => {
            println!("{}", json);
            Ok(())
        }
    }
}
