//! Access control for administrative entry points
//!
//! The marketplace has exactly one administrator: the identity that
//! opened the market. The role moves only through an explicit,
//! admin-gated transfer.

use types::ids::AccountId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessControl {
    admin: AccountId,
}

impl AccessControl {
    pub fn new(admin: AccountId) -> Self {
        Self { admin }
    }

    pub fn is_admin(&self, caller: AccountId) -> bool {
        caller == self.admin
    }

    pub fn admin(&self) -> AccountId {
        self.admin
    }

    /// Point the role at another account. Callers gate this on
    /// `is_admin` first; replay calls it directly.
    pub(crate) fn set_admin(&mut self, new_admin: AccountId) {
        self.admin = new_admin;
    }
}
