//! Space-scoped role based access control.
//!
//! Objects and roles are derived from space ids: object `space_<id>`,
//! writer role `space_<id>_writer`, reader role `space_<id>_reader`.
//! Subjects are users (`user_<id>`) and groups (`group_<id>`). Grouping is
//! transitive: a user in a group holds every role the group holds.

use std::collections::{BTreeSet, VecDeque};

use study_sdk::{AppUserId, OrganizationId, SpaceId, UserGroupId};

use super::error::DomainError;
use super::repos::RbacRepository;

/// Upper bound on the number of distinct subjects visited while resolving
/// roles, protecting against pathological grouping graphs.
const MAX_ROLE_GRAPH_NODES: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RbacAction {
    Read,
    Write,
}

impl RbacAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

#[must_use]
pub fn user_subject(user_id: AppUserId) -> String {
    format!("user_{user_id}")
}

#[must_use]
pub fn group_subject(group_id: UserGroupId) -> String {
    format!("group_{group_id}")
}

#[must_use]
pub fn space_object(space_id: SpaceId) -> String {
    format!("space_{space_id}")
}

#[must_use]
pub fn space_writer_role(space_id: SpaceId) -> String {
    format!("space_{space_id}_writer")
}

#[must_use]
pub fn space_reader_role(space_id: SpaceId) -> String {
    format!("space_{space_id}_reader")
}

/// Installs `writer -> read + write` on the space and binds `subject` to it.
pub async fn grant_space_writer(
    repo: &dyn RbacRepository,
    organization_id: OrganizationId,
    space_id: SpaceId,
    subject: &str,
) -> Result<(), DomainError> {
    let role = space_writer_role(space_id);
    let object = space_object(space_id);
    repo.add_policy(organization_id, &role, &object, RbacAction::Read.as_str())
        .await?;
    repo.add_policy(organization_id, &role, &object, RbacAction::Write.as_str())
        .await?;
    repo.add_grouping_policy(organization_id, subject, &role)
        .await?;
    tracing::debug!(%space_id, subject, "space writer granted");
    Ok(())
}

/// Installs `reader -> read` on the space and binds `subject` to it.
pub async fn grant_space_reader(
    repo: &dyn RbacRepository,
    organization_id: OrganizationId,
    space_id: SpaceId,
    subject: &str,
) -> Result<(), DomainError> {
    let role = space_reader_role(space_id);
    let object = space_object(space_id);
    repo.add_policy(organization_id, &role, &object, RbacAction::Read.as_str())
        .await?;
    repo.add_grouping_policy(organization_id, subject, &role)
        .await?;
    tracing::debug!(%space_id, subject, "space reader granted");
    Ok(())
}

/// Answers "may `subject` perform `action` on `object`" inside one
/// organization.
pub struct RbacEnforcer<'a> {
    repo: &'a dyn RbacRepository,
    organization_id: OrganizationId,
}

impl<'a> RbacEnforcer<'a> {
    #[must_use]
    pub fn new(repo: &'a dyn RbacRepository, organization_id: OrganizationId) -> Self {
        Self {
            repo,
            organization_id,
        }
    }

    /// `subject` plus every role reachable from it through grouping policies.
    pub async fn resolve_subjects(&self, subject: &str) -> Result<Vec<String>, DomainError> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([subject.to_owned()]);

        while let Some(current) = queue.pop_front() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if seen.len() >= MAX_ROLE_GRAPH_NODES {
                tracing::warn!(subject, "role graph too large, truncating resolution");
                break;
            }
            for role in self.repo.find_roles(self.organization_id, &current).await? {
                if !seen.contains(&role) {
                    queue.push_back(role);
                }
            }
        }

        Ok(seen.into_iter().collect())
    }

    pub async fn enforce(
        &self,
        subject: &str,
        object: &str,
        action: RbacAction,
    ) -> Result<bool, DomainError> {
        let subjects = self.resolve_subjects(subject).await?;
        self.repo
            .has_policy(self.organization_id, &subjects, object, action.as_str())
            .await
    }

    /// Actions `subject` holds on `object`, resolving roles once.
    pub async fn allowed_actions(
        &self,
        subject: &str,
        object: &str,
    ) -> Result<Vec<RbacAction>, DomainError> {
        let subjects = self.resolve_subjects(subject).await?;
        let mut allowed = Vec::with_capacity(2);
        for action in [RbacAction::Read, RbacAction::Write] {
            if self
                .repo
                .has_policy(self.organization_id, &subjects, object, action.as_str())
                .await?
            {
                allowed.push(action);
            }
        }
        Ok(allowed)
    }
}
