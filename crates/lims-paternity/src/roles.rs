//! Picking the child and alleged parent out of a set of sample ids.

use serde::Serialize;

use crate::error::{PaternityError, Result};

/// Which sample plays which part in a comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignment {
    pub child: String,
    pub alleged_parent: String,
}

impl RoleAssignment {
    /// Explicit mapping supplied by the caller.
    pub fn new(child: impl Into<String>, alleged_parent: impl Into<String>) -> Result<Self> {
        let child = child.into();
        let alleged_parent = alleged_parent.into();
        if child == alleged_parent {
            return Err(PaternityError::SameSample(child));
        }
        Ok(Self {
            child,
            alleged_parent,
        })
    }
}

/// Classifies sample ids by role.
pub trait RoleDetector {
    fn is_child(&self, sample_id: &str) -> bool;
    fn is_alleged_parent(&self, sample_id: &str) -> bool;
}

/// Recognizes the lab's sample naming: `child`/`father` anywhere in the id,
/// or a `ch`/`af` token (optionally numbered) between separators.
///
/// `CH_25_001`, `af2-25-002` and `IDENTIFILER_CHILD_001` all match;
/// `MOTHER_25_003` and `CHECK_01` do not.
#[derive(Debug, Clone, Copy, Default)]
pub struct NamingConventionDetector;

impl NamingConventionDetector {
    fn matches(sample_id: &str, keyword: &str, abbreviation: &str) -> bool {
        let lower = sample_id.to_ascii_lowercase();
        if lower.contains(keyword) {
            return true;
        }
        lower
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter_map(|token| token.strip_prefix(abbreviation))
            .any(|rest| rest.chars().all(|c| c.is_ascii_digit()))
    }
}

impl RoleDetector for NamingConventionDetector {
    fn is_child(&self, sample_id: &str) -> bool {
        Self::matches(sample_id, "child", "ch")
    }

    fn is_alleged_parent(&self, sample_id: &str) -> bool {
        Self::matches(sample_id, "father", "af")
    }
}

/// Assign roles with the default naming convention.
pub fn identify_roles<'a>(sample_ids: impl IntoIterator<Item = &'a str>) -> Result<RoleAssignment> {
    identify_roles_with(&NamingConventionDetector, sample_ids)
}

/// Assign roles with `detector`.
///
/// Ids are considered in sorted order and the first match for each role
/// wins. An id taken as the child is never also taken as the parent.
pub fn identify_roles_with<'a, D: RoleDetector + ?Sized>(
    detector: &D,
    sample_ids: impl IntoIterator<Item = &'a str>,
) -> Result<RoleAssignment> {
    let mut ids: Vec<&str> = sample_ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();

    let child = ids.iter().copied().find(|id| detector.is_child(id));
    let parent = ids
        .iter()
        .copied()
        .find(|id| Some(*id) != child && detector.is_alleged_parent(id));

    match (child, parent) {
        (Some(child), Some(parent)) => {
            tracing::debug!(child, parent, "roles detected from sample ids");
            Ok(RoleAssignment {
                child: child.to_string(),
                alleged_parent: parent.to_string(),
            })
        }
        _ => Err(PaternityError::AmbiguousRoles {
            available: ids.into_iter().map(str::to_string).collect(),
        }),
    }
}
