#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Role {
    Admin = 1,
    Hr = 2,
    Employee = 3,
    /// Kiosk or integration accounts allowed to record attendance on behalf of users.
    System = 4,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Hr),
            3 => Some(Role::Employee),
            4 => Some(Role::System),
            _ => None,
        }
    }

    /// Roles allowed to touch balances, stock and redemptions of other users.
    pub fn is_manager(&self) -> bool {
        matches!(self, Role::Admin | Role::Hr)
    }
}
