use crate::archiver::flow::Flow;
use crate::archiver::ledger::{Ledger, LedgerEntry};
use crate::error::ArchiveError;

/// Keep only flows the ledger has not seen for `(source_index, target_index)`,
/// recording each kept flow as it is accepted. Input order is preserved.
///
/// Recording is an atomic insert-if-absent, so a flow repeated within the
/// batch, or raced in by another run on the same pair, is dropped rather than
/// recorded twice.
pub fn filter_new(
    ledger: &Ledger,
    flows: Vec<Flow>,
    source_index: &str,
    target_index: &str,
) -> Result<Vec<Flow>, ArchiveError> {
    let mut new_flows = Vec::with_capacity(flows.len());
    let mut already_archived = 0usize;

    for flow in flows {
        let Some(flow_id) = flow.id() else {
            tracing::warn!(?flow, "skipping flow without identifier");
            continue;
        };
        let entry = LedgerEntry {
            flow_id,
            start: flow.start(),
            end: flow.end(),
            source_index: source_index.to_string(),
            target_index: target_index.to_string(),
        };

        if ledger.record_if_absent(&entry)? {
            new_flows.push(flow);
        } else {
            tracing::debug!(flow_id = %entry.flow_id, "flow already archived");
            already_archived += 1;
        }
    }

    tracing::info!(
        new = new_flows.len(),
        already_archived,
        source_index,
        target_index,
        "filtered old flows"
    );
    Ok(new_flows)
}
