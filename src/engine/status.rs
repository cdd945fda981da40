use serde::{Deserialize, Serialize};

use crate::service::types::{ResourceSpec, ResponseData};

/// Completion status of a preference item, derived from its response
/// against its resource's requirements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[default]
    New,
    Incomplete,
    Completed,
}

/// Derive the completion status for one item. Pure and deterministic:
/// re-running on identical input always yields the same result.
///
/// An absent response is `New` regardless of the resource. Otherwise the
/// item is `Completed` only when the substantial answer count covers every
/// primary requirement and the filled field-pair count covers every
/// secondary requirement. A bare (unreconciled) resource reference carries
/// no requirements, so counts degrade to zero rather than erroring.
pub fn classify(response: Option<&ResponseData>, resource: Option<&ResourceSpec>) -> Status {
    let Some(response) = response else {
        return Status::New;
    };

    let requirements = resource.map(|r| r.requirements.as_slice()).unwrap_or(&[]);
    let primary_required = requirements.iter().filter(|c| c.is_primary()).count();
    let secondary_required = requirements.iter().filter(|c| c.is_secondary()).count();

    let primary_filled = response.answers.iter().filter(|a| a.is_substantial).count();
    let secondary_filled = response.fields.iter().filter(|f| f.is_filled()).count();

    if primary_filled < primary_required || secondary_filled < secondary_required {
        Status::Incomplete
    } else {
        Status::Completed
    }
}
