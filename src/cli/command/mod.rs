pub mod anomalies;
pub mod baselines;
pub mod features;
pub mod fetch;
pub mod globe;
pub mod metrics;
pub mod outliers;
pub mod setup;
pub mod split;
pub mod summary;
pub mod trim;
pub mod yearly;

pub use anomalies::anomalies;
pub use baselines::baselines;
pub use features::features;
pub use fetch::fetch;
pub use globe::globe;
pub use metrics::metrics;
pub use outliers::outliers;
pub use setup::setup;
pub use split::split;
pub use summary::summary;
pub use trim::trim;
pub use yearly::yearly;

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::table::{self, Frame};

/// Writes a stage output and logs it, with the path in the error chain.
pub fn save_table(frame: &Frame, path: &Path) -> Result<()> {
    table::write_table(frame, path).with_context(|| format!("cannot write {}", path.display()))?;
    info!(path = %path.display(), rows = frame.num_rows(), "saved");

    Ok(())
}
