//! Operator capabilities and small domain values shared by services and
//! repositories.

use study_sdk::{AppUser, AppUserId, OrganizationId, ProblemId, UserGroupId, WorkbookId};

/// Login id reserved for the organization's system owner.
pub const SYSTEM_OWNER_LOGIN_ID: &str = "__system_owner";
/// Login id reserved for the organization's system student.
pub const SYSTEM_STUDENT_LOGIN_ID: &str = "__system_student";

pub const ROLE_SYSTEM_OWNER: &str = "SystemOwner";
pub const ROLE_SYSTEM_STUDENT: &str = "SystemStudent";
pub const ROLE_STUDENT: &str = "Student";

/// Key of the group every regular user joins.
pub const PUBLIC_GROUP_KEY: &str = "public";

/// An authenticated member acting inside its organization.
///
/// Repositories accept `&dyn Operator` so the same storage code serves
/// students, the system student and the system owner.
pub trait Operator: Send + Sync {
    fn app_user_id(&self) -> AppUserId;
    fn organization_id(&self) -> OrganizationId;
    fn login_id(&self) -> &str;
}

macro_rules! operator_model {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            user: AppUser,
        }

        impl $name {
            #[must_use]
            pub fn app_user(&self) -> &AppUser {
                &self.user
            }

            #[must_use]
            pub fn username(&self) -> &str {
                &self.user.username
            }
        }

        impl Operator for $name {
            fn app_user_id(&self) -> AppUserId {
                self.user.id
            }

            fn organization_id(&self) -> OrganizationId {
                self.user.organization_id
            }

            fn login_id(&self) -> &str {
                &self.user.login_id
            }
        }
    };
}

operator_model! {
    /// An app user narrowed to the "acts on workbooks" capability.
    StudentModel
}

operator_model! {
    /// The organization's system student, owner of system-space content.
    SystemStudentModel
}

operator_model! {
    /// The organization's system owner, the only operator allowed to
    /// create members and spaces.
    SystemOwnerModel
}

impl StudentModel {
    /// Any non-system member may act as a student.
    #[must_use]
    pub fn new(user: AppUser) -> Option<Self> {
        let reserved =
            user.login_id == SYSTEM_OWNER_LOGIN_ID || user.login_id == SYSTEM_STUDENT_LOGIN_ID;
        (!reserved).then_some(Self { user })
    }
}

impl SystemStudentModel {
    #[must_use]
    pub fn new(user: AppUser) -> Option<Self> {
        (user.login_id == SYSTEM_STUDENT_LOGIN_ID).then_some(Self { user })
    }
}

impl SystemOwnerModel {
    #[must_use]
    pub fn new(user: AppUser) -> Option<Self> {
        (user.login_id == SYSTEM_OWNER_LOGIN_ID).then_some(Self { user })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserGroup {
    pub id: UserGroupId,
    pub organization_id: OrganizationId,
    pub key: String,
    pub name: String,
}

/// Addresses one problem at an expected version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProblemSelector {
    pub workbook_id: WorkbookId,
    pub problem_id: ProblemId,
    pub version: i32,
}

/// Row to insert into a problem repository.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProblem {
    /// Next free number in the workbook when `None`.
    pub number: Option<i32>,
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// Equality match on one top-level problem property.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyCondition {
    pub key: String,
    pub value: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use uuid::Uuid;

    use super::*;

    fn user(login_id: &str) -> AppUser {
        AppUser {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            login_id: login_id.to_owned(),
            username: login_id.to_owned(),
            roles: BTreeSet::new(),
            properties: BTreeMap::new(),
        }
    }

    #[test]
    fn reserved_login_ids_select_the_capability() {
        assert!(StudentModel::new(user("alice")).is_some());
        assert!(StudentModel::new(user(SYSTEM_OWNER_LOGIN_ID)).is_none());
        assert!(StudentModel::new(user(SYSTEM_STUDENT_LOGIN_ID)).is_none());

        assert!(SystemStudentModel::new(user(SYSTEM_STUDENT_LOGIN_ID)).is_some());
        assert!(SystemStudentModel::new(user("alice")).is_none());

        let owner = SystemOwnerModel::new(user(SYSTEM_OWNER_LOGIN_ID)).unwrap();
        assert_eq!(owner.login_id(), SYSTEM_OWNER_LOGIN_ID);
        assert_eq!(owner.app_user_id(), owner.app_user().id);
    }
}
