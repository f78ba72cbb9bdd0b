// src/access.rs
use thiserror::Error;
use tracing::warn;

use crate::models::User;

/// What a caller may do. Checked at the boundary of each operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ViewOwnCalendar,
    EnterHours,
    ManageUsers,
    ManageHolidays,
    ViewPayroll,
}

impl Capability {
    pub fn granted_to(self, user: &User) -> bool {
        match self {
            Capability::ViewOwnCalendar => true,
            Capability::EnterHours | Capability::ManageUsers => user.is_admin || user.is_superuser,
            Capability::ManageHolidays => user.is_admin,
            Capability::ViewPayroll => user.is_superuser,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("You do not have permission to access this page.")]
    Missing(Capability),
    #[error("You do not have permission to delete this user.")]
    CannotDeleteUser,
}

pub fn require(user: &User, capability: Capability) -> Result<(), AccessError> {
    if capability.granted_to(user) {
        Ok(())
    } else {
        warn!("{} lacks capability {:?}", user.email, capability);
        Err(AccessError::Missing(capability))
    }
}

/// Superusers may delete anyone, admins only non-superusers.
pub fn can_delete_user(caller: &User, target: &User) -> bool {
    caller.is_superuser || (caller.is_admin && !target.is_superuser)
}
