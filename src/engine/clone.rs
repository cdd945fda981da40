use anyhow::anyhow;
use tracing::debug;

use super::FeedError;
use crate::service::types::{CalendarEntry, PreferenceItem, ProgramRef, RoleType};
use crate::service::OnboardingService;

/// Stamp a picker selection for its clone target: fresh scheduling
/// metadata titled from the display name, owning program set to the bare
/// target id, and the role applicability flag raised when in range.
fn stamp_for_clone(item: &mut PreferenceItem, program_id: &str, role: Option<RoleType>) {
    item.calendar = Some(CalendarEntry::fresh(&item.display_name));
    item.program = ProgramRef::Id(program_id.to_string());
    if let Some(role) = role {
        let idx = role.flag_index();
        if idx < item.applicability.len() {
            item.applicability[idx] = true;
        }
    }
}

/// Clone picker selections into a target program and splice the results
/// into the front of the feed list.
///
/// The remote clone returns items with fresh identities but bare resource
/// references, so each result is reconciled back to its originating
/// selection's populated resource before it enters the feed. All or
/// nothing: any clone or reconciliation failure leaves `feed_items`
/// untouched. Cloned items stay `New`; callers reclassify if needed.
pub async fn integrate(
    service: &dyn OnboardingService,
    mut selected: Vec<PreferenceItem>,
    program_id: &str,
    role: Option<RoleType>,
    feed_items: &mut Vec<PreferenceItem>,
) -> Result<usize, FeedError> {
    if selected.is_empty() {
        return Ok(0);
    }
    for item in &mut selected {
        stamp_for_clone(item, program_id, role);
    }

    let cloned = service
        .clone_items(&selected)
        .await
        .map_err(FeedError::Mutation)?;

    let mut reconciled = Vec::with_capacity(cloned.len());
    for mut clone in cloned {
        let source = selected
            .iter()
            .find(|s| s.resource.id() == clone.resource.id() && s.resource.as_full().is_some());
        match source {
            Some(source) => {
                clone.resource = source.resource.clone();
                reconciled.push(clone);
            }
            None => {
                return Err(FeedError::Mutation(anyhow!(
                    "cloned item {} references unknown resource {}",
                    clone.id,
                    clone.resource.id()
                )));
            }
        }
    }

    let count = reconciled.len();
    debug!(count, program = program_id, "splicing cloned items into feed");
    // Newly added items surface first regardless of the sort in effect.
    feed_items.splice(0..0, reconciled);
    Ok(count)
}
