/*
 * Responsibility
 * - Handler から見える「認証済みコンテキスト」の型
 * - middleware が検証して request extensions に格納し、handler はこの型だけを受け取る
 *
 * Notes
 * - トークン検証や claims の解釈は middleware/services 側の責務
 * - 1 リクエストにつき 1 度だけ生成され、以後は不変
 */
use std::collections::HashSet;

/// Subject used by the development bypass.
pub const DEV_SUBJECT: &str = "dev-user";

/// Caller identity established by the auth middleware.
///
/// - `subject` is the provider's stable id for the caller, never empty
/// - profile fields are best effort and absent when the token omits them
/// - `roles` are the caller's roles for this service's audience
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    pub subject: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub roles: HashSet<String>,
}

impl AuthenticatedIdentity {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            display_name: None,
            email: None,
            username: None,
            roles: HashSet::new(),
        }
    }

    pub fn dev_user() -> Self {
        Self::new(DEV_SUBJECT)
    }

    pub fn with_roles<I, R>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Roles in a stable order, for logs and responses.
    pub fn sorted_roles(&self) -> Vec<String> {
        let mut roles: Vec<String> = self.roles.iter().cloned().collect();
        roles.sort();
        roles
    }
}
