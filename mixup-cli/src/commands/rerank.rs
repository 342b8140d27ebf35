//! Rerank command implementation.

use crate::input;
use crate::settings::Settings;
use anyhow::Result;
use mixup::ranking::StoredFields;
use mixup::DeclineRegistry;
use std::path::Path;
use tracing::info;

/// Run a grouping mixup over one hit list file.
pub fn run_rerank(
    settings: &Settings,
    hits_path: &Path,
    request_path: &Path,
    from: Option<usize>,
    size: Option<usize>,
    output: Option<&Path>,
) -> Result<()> {
    let request = input::read_request(request_path, &settings.mixup.defaults, from, size)?;
    let hits = input::read_hits(hits_path)?;
    info!(
        "Re-ranking {} hits from {} by '{}'",
        hits.len(),
        hits_path.display(),
        request.grouping_mixup.group_field
    );

    let response = request.run(hits, &DeclineRegistry::new(), &StoredFields)?;
    info!(
        "Window {} covered {} groups, returning {} hits",
        response.stats.window,
        response.stats.groups,
        response.hits.len()
    );

    input::write_output(&response, output)
}
