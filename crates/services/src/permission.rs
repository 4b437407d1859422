use serde::{Deserialize, Serialize};

/// The closed catalogue of organisation permissions.
///
/// Discriminants are the stable integer identities used by the permission
/// lookup table; never renumber an existing variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i32)]
pub enum Permission {
    OrganisationEdit = 1,
    OrganisationDelete = 2,
    OrganisationViewBilling = 3,
    OrganisationManageBilling = 4,
    MemberInvite = 5,
    MemberRemove = 6,
    MemberUpdateRole = 7,
    RoleCreate = 8,
    RoleDelete = 9,
    RoleUpdate = 10,
    RoleAssignPermission = 11,
    SurveyCreate = 12,
    SurveyDelete = 13,
    SurveyEdit = 14,
    SurveyViewResults = 15,
    AuditView = 16,
    AuditDownload = 17,
}

impl Permission {
    pub const ALL: [Permission; 17] = [
        Permission::OrganisationEdit,
        Permission::OrganisationDelete,
        Permission::OrganisationViewBilling,
        Permission::OrganisationManageBilling,
        Permission::MemberInvite,
        Permission::MemberRemove,
        Permission::MemberUpdateRole,
        Permission::RoleCreate,
        Permission::RoleDelete,
        Permission::RoleUpdate,
        Permission::RoleAssignPermission,
        Permission::SurveyCreate,
        Permission::SurveyDelete,
        Permission::SurveyEdit,
        Permission::SurveyViewResults,
        Permission::AuditView,
        Permission::AuditDownload,
    ];

    /// Stable integer identity, as persisted in the lookup table
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Permission> {
        Permission::ALL.iter().copied().find(|p| p.code() == code)
    }

    /// True when checks for this permission must also compare the holder's
    /// rank against the rank of the member the action targets.
    pub fn requires_hierarchy(self) -> bool {
        matches!(self, Permission::MemberRemove | Permission::MemberUpdateRole)
    }

    pub fn description(self) -> &'static str {
        match self {
            Permission::OrganisationEdit => "Edit organisation details",
            Permission::OrganisationDelete => "Delete the organisation",
            Permission::OrganisationViewBilling => "View organisation billing",
            Permission::OrganisationManageBilling => "Manage organisation billing",
            Permission::MemberInvite => "Invite new members",
            Permission::MemberRemove => "Remove members",
            Permission::MemberUpdateRole => "Move members between positions",
            Permission::RoleCreate => "Create positions",
            Permission::RoleDelete => "Delete positions",
            Permission::RoleUpdate => "Update positions",
            Permission::RoleAssignPermission => "Assign permissions to positions",
            Permission::SurveyCreate => "Create surveys",
            Permission::SurveyDelete => "Delete surveys",
            Permission::SurveyEdit => "Edit surveys",
            Permission::SurveyViewResults => "View survey results",
            Permission::AuditView => "View the audit log",
            Permission::AuditDownload => "Download the audit log",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for permission in Permission::ALL {
            assert_eq!(Permission::from_code(permission.code()), Some(permission));
        }
        assert_eq!(Permission::from_code(0), None);
        assert_eq!(Permission::from_code(99), None);
    }

    #[test]
    fn only_member_targeting_permissions_require_hierarchy() {
        let hierarchical: Vec<Permission> = Permission::ALL
            .into_iter()
            .filter(|p| p.requires_hierarchy())
            .collect();
        assert_eq!(
            hierarchical,
            vec![Permission::MemberRemove, Permission::MemberUpdateRole]
        );
    }

    #[test]
    fn serialises_as_screaming_snake_case() {
        let json = serde_json::to_string(&Permission::MemberInvite).unwrap();
        assert_eq!(json, "\"MEMBER_INVITE\"");
    }
}
