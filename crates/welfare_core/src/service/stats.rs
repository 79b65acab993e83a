//! Dashboard counters derived from the cached lists.

use crate::clock::local_day;
use crate::model::family::FamilyRecord;

/// Admin dashboard totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DashboardStats {
    pub total_families: usize,
    pub active_families: usize,
    /// Sum of `numberOfMembers` over all families.
    pub total_members: u64,
    pub total_users: usize,
}

impl DashboardStats {
    pub fn compute(families: &[FamilyRecord], total_users: usize) -> Self {
        Self {
            total_families: families.len(),
            active_families: families.iter().filter(|family| family.is_active()).count(),
            total_members: families
                .iter()
                .map(|family| u64::from(family.family_info.number_of_members))
                .sum(),
            total_users,
        }
    }
}

/// Data-entry page counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataEntryStats {
    pub total_families: usize,
    /// Families created on the same local calendar day as `now_ms`.
    pub added_today: usize,
}

impl DataEntryStats {
    pub fn compute(families: &[FamilyRecord], now_ms: i64) -> Self {
        let today = local_day(now_ms);
        let added_today = match today {
            Some(day) => families
                .iter()
                .filter(|family| local_day(family.created_at) == Some(day))
                .count(),
            None => 0,
        };
        Self {
            total_families: families.len(),
            added_today,
        }
    }
}
