//! Paternity comparison between a child and an alleged parent.
//!
//! Roles are taken from sample naming ([`identify_roles`]) or supplied
//! explicitly. The per-locus index is pluggable through
//! [`LocusIndexStrategy`]; [`PlaceholderIndex`] is the default.

mod calculator;
mod error;
mod roles;

pub use calculator::{
    EXCLUDED_THRESHOLD, LocusIndexStrategy, NOT_EXCLUDED_THRESHOLD, PaternityCalculator,
    PlaceholderIndex, compare, conclude,
};
pub use error::{PaternityError, Result};
pub use roles::{
    NamingConventionDetector, RoleAssignment, RoleDetector, identify_roles, identify_roles_with,
};
