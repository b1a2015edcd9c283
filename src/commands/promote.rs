//! Folder promotion commands: `promote`, `promote-all`

use anyhow::{bail, Result};

use crate::services::PromotionContext;
use crate::ui;

use super::lifecycle;

/// Copy `folder` into `target` from its resolved source
pub async fn execute(context: &mut PromotionContext, target: &str, folder: &str) -> Result<()> {
    ui::print_header(&format!("Promoting {} into {}", folder, target));

    let result = context.promote(target, folder).await?;
    ui::print_promotion(&result);

    if !result.success {
        bail!("Promotion into {} failed", target);
    }
    Ok(())
}

/// Promote `folder` along the whole chain
pub async fn execute_all(context: &mut PromotionContext, folder: &str) -> Result<()> {
    ui::print_header(&format!("Promoting {} through all environments", folder));

    let report = context.promote_all(folder).await;
    lifecycle::print_and_check(context, report)
}
