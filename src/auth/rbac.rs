use std::collections::HashMap;

use lazy_static::lazy_static;

/// Permission names used across the route tables. Stored as
/// `resource:action`; a grant of `resource:*` covers every action on the
/// resource and `*` covers everything.
pub mod perm {
    pub const EMPLOYEES_READ: &str = "employees:read";
    pub const EMPLOYEES_MANAGE: &str = "employees:manage";
    pub const DEPARTMENTS_MANAGE: &str = "departments:manage";
    pub const ATTENDANCE_CLOCK: &str = "attendance:clock";
    pub const ATTENDANCE_READ: &str = "attendance:read";
    pub const ATTENDANCE_MANAGE: &str = "attendance:manage";
    pub const LEAVE_READ: &str = "leave:read";
    pub const LEAVE_CREATE: &str = "leave:create";
    pub const LEAVE_REVIEW: &str = "leave:review";
    pub const PROJECTS_READ: &str = "projects:read";
    pub const PROJECTS_MANAGE: &str = "projects:manage";
    pub const TASKS_READ: &str = "tasks:read";
    pub const TASKS_UPDATE: &str = "tasks:update";
    pub const TASKS_MANAGE: &str = "tasks:manage";
    pub const DASHBOARD_READ: &str = "dashboard:read";
    pub const PAYROLL_READ: &str = "payroll:read";
    pub const PAYROLL_MANAGE: &str = "payroll:manage";
    pub const OKR_READ: &str = "okr:read";
    pub const OKR_MANAGE: &str = "okr:manage";
    pub const CLIENTS_MANAGE: &str = "clients:manage";
    pub const PORTAL_READ: &str = "portal:read";
    pub const REPORTS_READ: &str = "reports:read";
    pub const BILLING_MANAGE: &str = "billing:manage";
    pub const ENGAGEMENT_READ: &str = "engagement:read";
    pub const ENGAGEMENT_CREATE: &str = "engagement:create";
    pub const ENGAGEMENT_MANAGE: &str = "engagement:manage";
}

#[derive(Debug, Clone)]
pub struct Role {
    pub name: String,
    pub description: String,
    pub permissions: Vec<String>,
}

lazy_static! {
    /// Static role table. Tokens carry the resolved permission list so the
    /// table is only consulted at token issue time.
    pub static ref ROLES: HashMap<String, Role> = {
        let mut roles = HashMap::new();

        roles.insert(
            "admin".to_string(),
            Role {
                name: "admin".to_string(),
                description: "Full access to every resource".to_string(),
                permissions: vec!["*".to_string()],
            },
        );

        roles.insert(
            "hr".to_string(),
            Role {
                name: "hr".to_string(),
                description: "People operations across the whole company".to_string(),
                permissions: vec![
                    "employees:*".to_string(),
                    "departments:*".to_string(),
                    "attendance:*".to_string(),
                    "leave:*".to_string(),
                    "payroll:*".to_string(),
                    "okr:*".to_string(),
                    "engagement:*".to_string(),
                    perm::PROJECTS_READ.to_string(),
                    perm::TASKS_READ.to_string(),
                    perm::DASHBOARD_READ.to_string(),
                    perm::REPORTS_READ.to_string(),
                ],
            },
        );

        roles.insert(
            "manager".to_string(),
            Role {
                name: "manager".to_string(),
                description: "Team lead with project and review rights".to_string(),
                permissions: vec![
                    perm::EMPLOYEES_READ.to_string(),
                    perm::ATTENDANCE_CLOCK.to_string(),
                    perm::ATTENDANCE_READ.to_string(),
                    perm::LEAVE_READ.to_string(),
                    perm::LEAVE_CREATE.to_string(),
                    perm::LEAVE_REVIEW.to_string(),
                    "projects:*".to_string(),
                    "tasks:*".to_string(),
                    perm::PAYROLL_READ.to_string(),
                    perm::OKR_READ.to_string(),
                    perm::OKR_MANAGE.to_string(),
                    perm::CLIENTS_MANAGE.to_string(),
                    perm::DASHBOARD_READ.to_string(),
                    perm::REPORTS_READ.to_string(),
                    perm::ENGAGEMENT_READ.to_string(),
                    perm::ENGAGEMENT_CREATE.to_string(),
                ],
            },
        );

        roles.insert(
            "employee".to_string(),
            Role {
                name: "employee".to_string(),
                description: "Self service access".to_string(),
                permissions: vec![
                    perm::EMPLOYEES_READ.to_string(),
                    perm::ATTENDANCE_CLOCK.to_string(),
                    perm::ATTENDANCE_READ.to_string(),
                    perm::LEAVE_READ.to_string(),
                    perm::LEAVE_CREATE.to_string(),
                    perm::PROJECTS_READ.to_string(),
                    perm::TASKS_READ.to_string(),
                    perm::TASKS_UPDATE.to_string(),
                    perm::PAYROLL_READ.to_string(),
                    perm::OKR_READ.to_string(),
                    perm::DASHBOARD_READ.to_string(),
                    perm::ENGAGEMENT_READ.to_string(),
                    perm::ENGAGEMENT_CREATE.to_string(),
                ],
            },
        );

        roles.insert(
            "client".to_string(),
            Role {
                name: "client".to_string(),
                description: "External client with scoped project visibility".to_string(),
                permissions: vec![perm::PORTAL_READ.to_string()],
            },
        );

        roles
    };
}

/// Permissions resolved for a role name. Unknown roles get no permissions.
pub fn permissions_for_role(role: &str) -> Vec<String> {
    ROLES
        .get(role)
        .map(|r| r.permissions.clone())
        .unwrap_or_default()
}

/// Wildcard-aware permission check.
pub fn grants(granted: &[String], required: &str) -> bool {
    if granted.iter().any(|p| p == "*" || p == required) {
        return true;
    }
    if let Some((resource, _action)) = required.split_once(':') {
        let wildcard = format!("{}:*", resource);
        return granted.iter().any(|p| *p == wildcard);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_covers_everything() {
        let perms = permissions_for_role("admin");
        assert!(grants(&perms, perm::PAYROLL_MANAGE));
        assert!(grants(&perms, perm::PORTAL_READ));
    }

    #[test]
    fn wildcard_resource_grants_all_actions() {
        let perms = permissions_for_role("hr");
        assert!(grants(&perms, perm::EMPLOYEES_MANAGE));
        assert!(grants(&perms, perm::PAYROLL_READ));
        assert!(!grants(&perms, perm::PROJECTS_MANAGE));
    }

    #[test]
    fn employee_cannot_review_leave() {
        let perms = permissions_for_role("employee");
        assert!(grants(&perms, perm::LEAVE_CREATE));
        assert!(!grants(&perms, perm::LEAVE_REVIEW));
        assert!(!grants(&perms, perm::PAYROLL_MANAGE));
    }

    #[test]
    fn client_is_portal_only() {
        let perms = permissions_for_role("client");
        assert!(grants(&perms, perm::PORTAL_READ));
        assert!(!grants(&perms, perm::PROJECTS_READ));
    }

    #[test]
    fn unknown_role_has_no_permissions() {
        assert!(permissions_for_role("superuser").is_empty());
    }
}
