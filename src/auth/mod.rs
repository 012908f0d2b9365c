/*!
 * # Authorization Module
 *
 * Caller identity for the ledger services. There is no authentication
 * here: callers arrive already identified (CLI flags, embedding
 * application), and this module only answers what that identity may do.
 */

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;

/// The identity a service call runs as.
///
/// Every ledger row is keyed by `owner_id`, and services take the owner from
/// the actor rather than from request payloads. `elevated` unlocks writes to
/// ledger entries dated outside today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub owner_id: Uuid,
    pub elevated: bool,
}

impl Actor {
    /// A regular owner, restricted to same-day ledger writes.
    pub fn user(owner_id: Uuid) -> Self {
        Self {
            owner_id,
            elevated: false,
        }
    }

    /// An elevated owner (admin tooling, imports) allowed to touch any date.
    pub fn elevated(owner_id: Uuid) -> Self {
        Self {
            owner_id,
            elevated: true,
        }
    }

    /// Gate for writes that touch a ledger entry dated `sale_date`.
    ///
    /// Same-day entries are always writable; anything else needs elevation.
    pub fn ensure_can_write_dated(
        &self,
        sale_date: NaiveDate,
        today: NaiveDate,
    ) -> Result<(), ServiceError> {
        if sale_date == today || self.elevated {
            Ok(())
        } else {
            Err(ServiceError::PermissionDenied(format!(
                "entry dated {} is outside the same-day window",
                sale_date
            )))
        }
    }
}
