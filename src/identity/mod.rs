pub mod dto;

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::AppError;
use crate::identity::dto::IdentityRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    SelfEnroll,
    ViewCredits,
    ManageCatalog,
    ManageEnrollments,
    BypassScheduleConflicts,
}

impl Role {
    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            Role::Student => &[Capability::SelfEnroll, Capability::ViewCredits],
            Role::Teacher => &[],
            Role::Admin => &[
                Capability::ManageCatalog,
                Capability::ManageEnrollments,
                Capability::BypassScheduleConflicts,
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub real_name: String,
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub grade: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
    pub roles: Vec<Role>,
    pub profile: Option<Profile>,
    capabilities: BTreeSet<Capability>,
}

impl Identity {
    /// Builds the request-time identity. Students without a profile row get a
    /// placeholder here so nothing downstream has to probe for one.
    pub fn provision(record: IdentityRecord) -> Self {
        let capabilities = record
            .roles
            .iter()
            .flat_map(|role| role.capabilities().iter().copied())
            .collect();

        let profile = match record.profile {
            Some(profile) => Some(profile),
            None if record.roles.contains(&Role::Student) => {
                warn!(
                    "user {} has no profile, provisioning placeholder",
                    record.username
                );
                Some(Profile {
                    real_name: record.username.clone(),
                    student_id: Some(record.username.clone()),
                    department: None,
                    grade: Some(1),
                })
            }
            None => None,
        };

        Self {
            user_id: record.user_id,
            username: record.username,
            roles: record.roles,
            profile,
            capabilities,
        }
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn require(&self, capability: Capability) -> Result<(), AppError> {
        if self.can(capability) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "{} lacks {:?}",
                self.username, capability
            )))
        }
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolves a session token. `Ok(None)` means the token is unknown.
    async fn resolve(&self, token: &str) -> Result<Option<Identity>, AppError>;
}

#[derive(Clone, Debug)]
pub struct IdentityConfig {
    pub base_url: String,
}

pub struct HttpIdentityProvider {
    client: Client,
    config: IdentityConfig,
}

impl HttpIdentityProvider {
    pub fn new(config: IdentityConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::Upstream(format!("Failed to build http client: {}", e)))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn resolve(&self, token: &str) -> Result<Option<Identity>, AppError> {
        let url = format!("{}/identity", self.config.base_url.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::NOT_FOUND {
            debug!("identity service rejected token ({})", status);
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!("{}: {}", status, body)));
        }

        let record = response
            .json::<IdentityRecord>()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse identity: {}", e)))?;

        Ok(Some(Identity::provision(record)))
    }
}

/// In-memory sessions for development and tests.
#[derive(Default)]
pub struct StaticIdentityProvider {
    sessions: RwLock<HashMap<String, Identity>>,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, token: impl Into<String>, record: IdentityRecord) {
        self.sessions
            .write()
            .insert(token.into(), Identity::provision(record));
    }

    /// Registers the identity under a fresh random token.
    pub fn issue(&self, record: IdentityRecord) -> String {
        let token = uuid::Uuid::new_v4().to_string();
        self.insert(token.clone(), record);
        token
    }

    pub fn revoke(&self, token: &str) -> bool {
        self.sessions.write().remove(token).is_some()
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn resolve(&self, token: &str) -> Result<Option<Identity>, AppError> {
        Ok(self.sessions.read().get(token).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(roles: Vec<Role>, profile: Option<Profile>) -> IdentityRecord {
        IdentityRecord {
            user_id: 1,
            username: "s1120001".to_string(),
            roles,
            profile,
        }
    }

    #[test]
    fn test_capabilities_follow_roles() {
        let student = Identity::provision(record(vec![Role::Student], None));
        assert!(student.can(Capability::SelfEnroll));
        assert!(!student.can(Capability::BypassScheduleConflicts));
        assert!(matches!(
            student.require(Capability::ManageCatalog),
            Err(AppError::Forbidden(_))
        ));

        let admin = Identity::provision(record(vec![Role::Admin], None));
        assert!(admin.can(Capability::ManageEnrollments));
        assert!(!admin.can(Capability::SelfEnroll));

        let teacher = Identity::provision(record(vec![Role::Teacher], None));
        assert!(!teacher.can(Capability::SelfEnroll));
        assert!(teacher.profile.is_none());
    }

    #[test]
    fn test_student_without_profile_gets_placeholder() {
        let student = Identity::provision(record(vec![Role::Student], None));
        let profile = student.profile.expect("placeholder profile");
        assert_eq!(profile.real_name, "s1120001");
        assert_eq!(profile.student_id.as_deref(), Some("s1120001"));
        assert_eq!(profile.grade, Some(1));
    }

    #[test]
    fn test_record_deserializes_without_profile() {
        let record: IdentityRecord =
            serde_json::from_str(r#"{"user_id": 3, "username": "amy", "roles": ["student", "admin"]}"#).unwrap();
        assert_eq!(record.roles, vec![Role::Student, Role::Admin]);
        assert!(record.profile.is_none());
    }

    #[tokio::test]
    async fn test_static_provider_issue_resolve_revoke() {
        let provider = StaticIdentityProvider::new();
        let token = provider.issue(record(vec![Role::Student], None));

        let resolved = provider.resolve(&token).await.unwrap().expect("identity");
        assert_eq!(resolved.user_id, 1);
        assert!(provider.resolve("nope").await.unwrap().is_none());

        assert!(provider.revoke(&token));
        assert!(provider.resolve(&token).await.unwrap().is_none());
    }
}
