//! CSV projection of a session's redemptions.

use chrono_tz::Tz;

use crate::models::redemption::RedemptionExportRow;
use crate::utils::csv::render_csv;

pub const EXPORT_HEADER: [&str; 5] = ["name", "roll_number", "present", "method", "timestamp"];

/// Renders rows with timestamps shown in the school's timezone.
pub fn redemptions_csv(rows: &[RedemptionExportRow], tz: &Tz) -> anyhow::Result<String> {
    render_csv(
        &EXPORT_HEADER,
        rows.iter().map(|row| {
            vec![
                row.full_name.clone(),
                row.roll_number.clone().unwrap_or_default(),
                if row.present { "yes" } else { "no" }.to_string(),
                row.method.as_str().to_string(),
                row.redeemed_at.with_timezone(tz).to_rfc3339(),
            ]
        }),
    )
}
