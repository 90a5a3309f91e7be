//! Role-based content selection

use rolegate_types::{KnownRole, RoleSet};

/// Content branch shown to a user with at least one role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Admin,
    Member,
    /// Roles assigned, none of them recognized
    Limited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// No roles at all
    Denied,
    Granted(View),
}

/// Recognized roles and their views, highest priority first
const VIEWS: [(KnownRole, View); 2] = [(KnownRole::Admin, View::Admin), (KnownRole::Member, View::Member)];

pub struct ContentGate;

impl ContentGate {
    pub fn evaluate(roles: &RoleSet) -> GateDecision {
        if roles.is_empty() {
            return GateDecision::Denied;
        }
        let view = VIEWS
            .iter()
            .find(|(role, _)| roles.contains(role.as_str()))
            .map_or(View::Limited, |(_, view)| *view);
        GateDecision::Granted(view)
    }
}
