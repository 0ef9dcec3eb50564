use std::fs;
use std::path::Path;

use crate::config::Options;
use crate::downloader::Fetch;
use crate::error::{Error, Result};
use crate::plan::{FetchPlan, Request};
use crate::progress::ProgressHandler;

pub fn run(
    request: &Request,
    options: &Options,
    fetcher: &dyn Fetch,
    handler: &mut dyn ProgressHandler,
) -> Result<()> {
    ensure_output_dir(&request.output_base)?;

    let plan = FetchPlan::derive(request, options);
    log::debug!(
        "fetching; url={}, format={:?}, selection={}, template={:?}",
        plan.url,
        request.format,
        plan.selection,
        plan.output_template
    );
    fetcher.fetch(&plan, handler)
}

fn ensure_output_dir(output_base: &Path) -> Result<()> {
    let dir = match output_base.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        // A bare file name lands in the current directory.
        _ => return Ok(()),
    };
    fs::create_dir_all(dir).map_err(|source| Error::Filesystem {
        path: dir.to_path_buf(),
        source,
    })?;
    log::trace!("ensured output directory; dir={:?}", dir);
    Ok(())
}
