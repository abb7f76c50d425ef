use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AppUserId, OrganizationId};

/// `SecurityContext` identifies who is acting and inside which organization.
///
/// Resolved by the transport layer (session, token, ...) before any study
/// operation runs. The study module never trusts anything else to identify
/// the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityContext {
    organization_id: OrganizationId,
    app_user_id: AppUserId,
    request_id: Option<String>,
}

impl SecurityContext {
    #[must_use]
    pub fn builder() -> SecurityContextBuilder {
        SecurityContextBuilder::default()
    }

    /// Context with no organization and no operator. Every lookup made with
    /// it resolves to "not found".
    #[must_use]
    pub fn anonymous() -> Self {
        SecurityContextBuilder::default().build()
    }

    #[must_use]
    pub fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }

    #[must_use]
    pub fn app_user_id(&self) -> AppUserId {
        self.app_user_id
    }

    /// Correlation id for logs, if the transport supplied one.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.organization_id == Uuid::default() || self.app_user_id == Uuid::default()
    }
}

#[derive(Default)]
pub struct SecurityContextBuilder {
    organization_id: Option<OrganizationId>,
    app_user_id: Option<AppUserId>,
    request_id: Option<String>,
}

impl SecurityContextBuilder {
    #[must_use]
    pub fn organization_id(mut self, organization_id: OrganizationId) -> Self {
        self.organization_id = Some(organization_id);
        self
    }

    #[must_use]
    pub fn app_user_id(mut self, app_user_id: AppUserId) -> Self {
        self.app_user_id = Some(app_user_id);
        self
    }

    #[must_use]
    pub fn request_id(mut self, request_id: &str) -> Self {
        self.request_id = Some(request_id.to_owned());
        self
    }

    #[must_use]
    pub fn build(self) -> SecurityContext {
        SecurityContext {
            organization_id: self.organization_id.unwrap_or_default(),
            app_user_id: self.app_user_id.unwrap_or_default(),
            request_id: self.request_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_all_fields() {
        let org = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        let user = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440001").unwrap();

        let ctx = SecurityContext::builder()
            .organization_id(org)
            .app_user_id(user)
            .request_id("req-1")
            .build();

        assert_eq!(ctx.organization_id(), org);
        assert_eq!(ctx.app_user_id(), user);
        assert_eq!(ctx.request_id(), Some("req-1"));
        assert!(!ctx.is_anonymous());
    }

    #[test]
    fn missing_operator_is_anonymous() {
        let ctx = SecurityContext::builder()
            .organization_id(Uuid::new_v4())
            .build();
        assert!(ctx.is_anonymous());
        assert!(SecurityContext::anonymous().is_anonymous());
    }
}
