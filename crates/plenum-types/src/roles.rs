use serde::{Deserialize, Serialize};

/// Roles form a strict chain for gated pages:
/// viewer < special < admin < superadmin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Special,
    Admin,
    Superadmin,
}

/// Every page the sidebar can show, in display order.
pub const PAGES: &[&str] = &[
    "dashboard",
    "tasks",
    "calendar",
    "meetings",
    "budget",
    "risks",
    "documents",
    "contacts",
    "forum",
    "users",
    "deletion-logs",
];

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Special => "special",
            Role::Admin => "admin",
            Role::Superadmin => "superadmin",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "viewer" => Some(Role::Viewer),
            "special" => Some(Role::Special),
            "admin" => Some(Role::Admin),
            "superadmin" => Some(Role::Superadmin),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Role::Viewer => 0,
            Role::Special => 1,
            Role::Admin => 2,
            Role::Superadmin => 3,
        }
    }

    /// Special access or higher (tasks, meetings, budget, risks,
    /// documents, contacts).
    pub fn is_special(&self) -> bool {
        self.rank() >= Role::Special.rank()
    }

    pub fn is_admin(&self) -> bool {
        self.rank() >= Role::Admin.rank()
    }

    pub fn is_super_admin(&self) -> bool {
        *self == Role::Superadmin
    }

    /// Whether this role may view the given page. Unknown pages are
    /// never visible; this function does not fail.
    pub fn can_view_page(&self, page: &str) -> bool {
        match page {
            "dashboard" | "calendar" | "forum" => true,
            "tasks" | "meetings" | "budget" | "risks" | "documents" | "contacts" => {
                self.is_special()
            }
            "users" | "deletion-logs" => self.is_admin(),
            _ => false,
        }
    }

    /// The pages this role may view, in sidebar order.
    pub fn visible_pages(&self) -> Vec<&'static str> {
        PAGES
            .iter()
            .copied()
            .filter(|page| self.can_view_page(page))
            .collect()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewer_sees_only_ungated_pages() {
        let role = Role::Viewer;
        assert!(role.can_view_page("dashboard"));
        assert!(role.can_view_page("forum"));
        assert!(role.can_view_page("calendar"));
        assert!(!role.can_view_page("tasks"));
        assert!(!role.can_view_page("budget"));
        assert!(!role.can_view_page("users"));
    }

    #[test]
    fn each_role_is_a_superset_of_the_previous() {
        let chain = [Role::Viewer, Role::Special, Role::Admin, Role::Superadmin];
        for pair in chain.windows(2) {
            let (lower, higher) = (pair[0], pair[1]);
            for page in PAGES {
                if lower.can_view_page(page) {
                    assert!(
                        higher.can_view_page(page),
                        "{higher} should see {page} because {lower} does"
                    );
                }
            }
        }
    }

    #[test]
    fn admin_pages_require_admin() {
        assert!(!Role::Special.can_view_page("deletion-logs"));
        assert!(Role::Admin.can_view_page("deletion-logs"));
        assert!(Role::Superadmin.can_view_page("users"));
    }

    #[test]
    fn unknown_page_is_false_for_everyone() {
        assert!(!Role::Superadmin.can_view_page("secret"));
        assert!(!Role::Viewer.can_view_page(""));
    }

    #[test]
    fn role_round_trips_through_strings() {
        for role in [Role::Viewer, Role::Special, Role::Admin, Role::Superadmin] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("root"), None);
    }
}
