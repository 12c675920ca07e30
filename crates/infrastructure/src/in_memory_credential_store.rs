use async_trait::async_trait;
use tokio::sync::RwLock;
use trellis_application::CredentialStore;
use trellis_core::{AppResult, ScopeId, UserId};
use trellis_domain::Target;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct IssuedToken {
    id: Uuid,
    user_id: UserId,
    target: Target,
    valid: bool,
}

#[derive(Debug, Clone)]
struct StoredCredential {
    user_id: UserId,
    project_id: Option<ScopeId>,
}

/// In-memory token and credential store.
///
/// Tokens are kept after revocation with a cleared validity flag, so a
/// caller holding a token id can observe the revocation.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    tokens: RwLock<Vec<IssuedToken>>,
    credentials: RwLock<Vec<StoredCredential>>,
}

impl InMemoryCredentialStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a token for a user scoped to the given target.
    pub async fn issue_token(&self, user_id: UserId, target: Target) -> Uuid {
        let token = IssuedToken {
            id: Uuid::new_v4(),
            user_id,
            target,
            valid: true,
        };
        let id = token.id;
        self.tokens.write().await.push(token);
        id
    }

    /// Returns whether a token is still valid. Unknown tokens are invalid.
    pub async fn is_token_valid(&self, token_id: Uuid) -> bool {
        self.tokens
            .read()
            .await
            .iter()
            .any(|token| token.id == token_id && token.valid)
    }

    /// Stores a credential for a user, optionally scoped to a project.
    pub async fn store_credential(&self, user_id: UserId, project_id: Option<ScopeId>) {
        self.credentials
            .write()
            .await
            .push(StoredCredential { user_id, project_id });
    }

    /// Returns how many credentials a user currently owns.
    pub async fn credential_count_for_user(&self, user_id: UserId) -> usize {
        self.credentials
            .read()
            .await
            .iter()
            .filter(|credential| credential.user_id == user_id)
            .count()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn revoke_tokens_for_scope(&self, target: &Target) -> AppResult<()> {
        for token in self.tokens.write().await.iter_mut() {
            if token.target == *target {
                token.valid = false;
            }
        }
        Ok(())
    }

    async fn revoke_tokens_for_user(&self, user_id: UserId) -> AppResult<()> {
        for token in self.tokens.write().await.iter_mut() {
            if token.user_id == user_id {
                token.valid = false;
            }
        }
        Ok(())
    }

    async fn delete_credentials_for_user(&self, user_id: UserId) -> AppResult<()> {
        self.credentials
            .write()
            .await
            .retain(|credential| credential.user_id != user_id);
        Ok(())
    }

    async fn delete_credentials_for_project(&self, project_id: ScopeId) -> AppResult<()> {
        self.credentials
            .write()
            .await
            .retain(|credential| credential.project_id != Some(project_id));
        Ok(())
    }
}
