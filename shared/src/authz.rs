//! Role parsing and access decisions.
//!
//! Every access check in the lambdas goes through [`Caller`] so the
//! role rules live in one place instead of being re-compared as strings
//! in each handler.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    ManagementBoard,
    HighBoard,
    Member,
}

impl Role {
    /// Parse the role string stored on a profile. Unknown or missing
    /// values fall back to the least-privileged role.
    pub fn parse(s: Option<&str>) -> Self {
        match s {
            Some("management_board") => Role::ManagementBoard,
            Some("high_board") => Role::HighBoard,
            _ => Role::Member,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::ManagementBoard => "management_board",
            Role::HighBoard => "high_board",
            Role::Member => "member",
        }
    }
}

/// An authenticated caller and what it is allowed to do.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: String,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    /// Self-deletion is open to every role; deleting someone else needs
    /// a management board seat.
    pub fn can_delete_user(&self, target_user_id: &str) -> bool {
        target_user_id == self.user_id || self.role == Role::ManagementBoard
    }

    /// Wiping every other account is management-board only.
    pub fn can_purge_users(&self) -> bool {
        self.role == Role::ManagementBoard
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_roles() {
        assert_eq!(Role::parse(Some("management_board")), Role::ManagementBoard);
        assert_eq!(Role::parse(Some("high_board")), Role::HighBoard);
        assert_eq!(Role::parse(Some("member")), Role::Member);
    }

    #[test]
    fn unknown_or_missing_role_is_member() {
        assert_eq!(Role::parse(Some("admin")), Role::Member);
        assert_eq!(Role::parse(Some("")), Role::Member);
        assert_eq!(Role::parse(None), Role::Member);
    }

    #[test]
    fn role_round_trips_through_as_str() {
        for role in [Role::ManagementBoard, Role::HighBoard, Role::Member] {
            assert_eq!(Role::parse(Some(role.as_str())), role);
        }
    }

    #[test]
    fn anyone_may_delete_themselves() {
        for role in [Role::ManagementBoard, Role::HighBoard, Role::Member] {
            let caller = Caller::new("u1", role);
            assert!(caller.can_delete_user("u1"));
        }
    }

    #[test]
    fn only_management_board_may_delete_others() {
        assert!(Caller::new("u1", Role::ManagementBoard).can_delete_user("u2"));
        assert!(!Caller::new("u1", Role::HighBoard).can_delete_user("u2"));
        assert!(!Caller::new("u1", Role::Member).can_delete_user("u2"));
    }

    #[test]
    fn only_management_board_may_purge() {
        assert!(Caller::new("u1", Role::ManagementBoard).can_purge_users());
        assert!(!Caller::new("u1", Role::HighBoard).can_purge_users());
        assert!(!Caller::new("u1", Role::Member).can_purge_users());
    }
}
