mod config;
mod derive;
pub mod manual;
mod mapper;
mod numeric;
mod schema;
mod text;

use log::{debug, info, warn};
use serde_json::Value as JSValue;

pub use crate::config::*;
pub use crate::derive::{
    derive_row, profitability_percent, satisfaction_ratio, summarize_list, synthesize_from_text,
    TOPIC_SEPARATOR,
};
pub use crate::mapper::{
    classify_payload, force_identity, map_to_canonical, normalize_satisfaction_label,
    MappedPayload, PayloadShape,
};
pub use crate::numeric::{
    format_decimal_preserve_precision, format_progression, format_voters, intent_shares,
    intent_summary, mean_score_over_10, parse_voters, rebalance_to_100, round_to, safe_float,
    safe_number, LooseNumber,
};
pub use crate::schema::*;
pub use crate::text::{clean_list, flatten_reply, is_noise, summarize_text, unwrap_summary_text};

/// The outcome of processing one extraction payload.
#[derive(PartialEq, Debug, Clone)]
pub struct ProcessedSurvey {
    /// The layout the payload arrived in.
    pub shape: PayloadShape,
    pub canonical: CanonicalRecord,
    pub row: DerivedRow,
}

/// Runs the whole pipeline on a raw extraction payload.
///
/// The session identity is written into the payload, which is then mapped to
/// the canonical layout, validated and turned into a spreadsheet row. Only a
/// schema violation fails the call; every other problem degrades to a
/// placeholder in the row.
pub fn process_payload(
    raw: JSValue,
    identity: &SessionIdentity,
    options: &DeriveOptions,
    summarizer: &dyn Summarizer,
) -> Result<ProcessedSurvey, SurveyError> {
    let mut raw = raw;
    force_identity(&mut raw, identity);
    let mapped = map_to_canonical(raw);
    debug!("process_payload: mapped payload: {}", mapped.payload);

    let canonical = CanonicalRecord::validate(&mapped.payload)?;
    for (section, state) in canonical.missing_sections() {
        match state {
            SectionState::Absent => warn!("process_payload: section {} is missing", section),
            SectionState::Empty => warn!("process_payload: section {} is empty", section),
        }
    }

    let row = derive_row(&canonical, options, summarizer);
    info!(
        "process_payload: derived row for {} / {}",
        canonical.formation_name, canonical.semester
    );
    Ok(ProcessedSurvey {
        shape: mapped.shape,
        canonical,
        row,
    })
}
