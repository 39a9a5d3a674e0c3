//! Authentication state.
//!
//! `AuthStore` owns the current `AuthState` and publishes every change on a
//! `watch` channel. Sign-in, sign-out and status checks go through an
//! `AuthProvider`.

use async_trait::async_trait;
use mcp_router_common::AppSettings;
use mcp_router_store::StoreContext;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::PlatformResult;
use crate::error::PlatformError;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    pub is_authenticated: bool,
    pub user_id: Option<String>,
    pub auth_token: Option<String>,
    pub user_info: Option<UserInfo>,
    pub is_logging_in: bool,
    pub login_error: Option<String>,
    pub credits: Option<u64>,
}

/// What a provider reports after sign-in or a status check.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AuthStatus {
    pub authenticated: bool,
    pub user_id: Option<String>,
    pub token: Option<String>,
    pub user: Option<UserInfo>,
    pub credits: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub token: String,
    pub user_id: Option<String>,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, credentials: Credentials) -> PlatformResult<AuthStatus>;
    async fn sign_out(&self) -> PlatformResult<()>;
    /// Current status. `force_refresh` bypasses any cached answer.
    async fn status(&self, force_refresh: bool) -> PlatformResult<AuthStatus>;
}

pub struct AuthStore {
    provider: Arc<dyn AuthProvider>,
    state: watch::Sender<AuthState>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl AuthStore {
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self { provider, state }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> AuthState {
        self.state.borrow().clone()
    }

    fn apply(&self, status: AuthStatus) {
        self.state.send_modify(|s| {
            s.is_authenticated = status.authenticated;
            s.user_id = status.user_id;
            s.auth_token = status.token;
            s.user_info = status.user;
            if status.credits.is_some() {
                s.credits = status.credits;
            }
        });
    }

    /// Seeds the state from stored settings without contacting the provider.
    pub fn initialize_from_settings(&self, settings: &AppSettings) {
        let token = non_empty(settings.auth_token.clone());
        let user_id = non_empty(settings.user_id.clone());
        self.state.send_modify(|s| {
            s.is_authenticated = token.is_some();
            s.auth_token = token;
            s.user_id = user_id;
        });
        debug!(logged_in = self.is_logged_in(), "auth state initialised from settings");
    }

    pub async fn login(&self, credentials: Credentials) -> PlatformResult<()> {
        self.state.send_modify(|s| {
            s.is_logging_in = true;
            s.login_error = None;
        });
        match self.provider.sign_in(credentials).await {
            Ok(status) => {
                self.apply(status);
                self.state.send_modify(|s| s.is_logging_in = false);
                info!(user_id = ?self.user_id(), "logged in");
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                self.state.send_modify(|s| {
                    s.is_logging_in = false;
                    s.login_error = Some(message);
                });
                warn!(error = %e, "login failed");
                Err(e)
            }
        }
    }

    pub async fn logout(&self) -> PlatformResult<()> {
        self.provider.sign_out().await?;
        self.state.send_replace(AuthState::default());
        info!("logged out");
        Ok(())
    }

    /// Refreshes the state from the provider and returns whether the user
    /// is authenticated.
    pub async fn check_auth_status(&self, force_refresh: bool) -> PlatformResult<bool> {
        let status = self.provider.status(force_refresh).await?;
        self.apply(status);
        Ok(self.snapshot().is_authenticated)
    }

    pub async fn refresh_credits(&self) -> PlatformResult<Option<u64>> {
        let status = self.provider.status(true).await?;
        self.state.send_modify(|s| s.credits = status.credits);
        Ok(status.credits)
    }

    pub fn set_auth_token(&self, token: Option<String>) {
        let token = non_empty(token);
        self.state.send_modify(|s| {
            s.is_authenticated = token.is_some();
            s.auth_token = token;
        });
    }

    pub fn set_user_id(&self, user_id: Option<String>) {
        self.state.send_modify(|s| s.user_id = non_empty(user_id));
    }

    pub fn set_user_info(&self, user: Option<UserInfo>) {
        self.state.send_modify(|s| s.user_info = user);
    }

    pub fn set_credits(&self, credits: Option<u64>) {
        self.state.send_modify(|s| s.credits = credits);
    }

    pub fn set_login_error(&self, error: Option<String>) {
        self.state.send_modify(|s| s.login_error = error);
    }

    pub fn is_logged_in(&self) -> bool {
        let s = self.state.borrow();
        s.is_authenticated && s.auth_token.is_some()
    }

    pub fn auth_token(&self) -> Option<String> {
        self.state.borrow().auth_token.clone()
    }

    pub fn user_id(&self) -> Option<String> {
        self.state.borrow().user_id.clone()
    }
}

/// Provider backed by the settings repository: the token is whatever the
/// user stored.
pub struct SettingsAuthProvider {
    ctx: Arc<StoreContext>,
}

impl SettingsAuthProvider {
    pub fn new(ctx: Arc<StoreContext>) -> Self {
        Self { ctx }
    }

    fn status_from(settings: AppSettings) -> AuthStatus {
        let token = non_empty(settings.auth_token);
        AuthStatus {
            authenticated: token.is_some(),
            user_id: non_empty(settings.user_id),
            token,
            user: None,
            credits: None,
        }
    }
}

#[async_trait]
impl AuthProvider for SettingsAuthProvider {
    async fn sign_in(&self, credentials: Credentials) -> PlatformResult<AuthStatus> {
        if credentials.token.trim().is_empty() {
            return Err(PlatformError::Auth("token is empty".into()));
        }
        let repo = self.ctx.settings()?;
        let mut settings = repo.get()?;
        settings.auth_token = Some(credentials.token);
        if credentials.user_id.is_some() {
            settings.user_id = credentials.user_id;
        }
        repo.save(&settings)?;
        Ok(Self::status_from(settings))
    }

    async fn sign_out(&self) -> PlatformResult<()> {
        let repo = self.ctx.settings()?;
        let mut settings = repo.get()?;
        settings.auth_token = None;
        settings.user_id = None;
        repo.save(&settings)?;
        Ok(())
    }

    async fn status(&self, _force_refresh: bool) -> PlatformResult<AuthStatus> {
        Ok(Self::status_from(self.ctx.settings()?.get()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_router_store::Database;

    fn store() -> (Arc<StoreContext>, AuthStore) {
        let ctx = Arc::new(StoreContext::bound_to(Database::open_in_memory().unwrap()));
        let store = AuthStore::new(Arc::new(SettingsAuthProvider::new(ctx.clone())));
        (ctx, store)
    }

    fn credentials(token: &str) -> Credentials {
        Credentials {
            token: token.into(),
            user_id: Some("user-1".into()),
        }
    }

    #[test]
    fn initialize_from_settings_sets_selectors() {
        let (_ctx, store) = store();
        store.initialize_from_settings(&AppSettings {
            auth_token: Some("tok".into()),
            user_id: Some("u".into()),
            ..Default::default()
        });
        assert!(store.is_logged_in());
        assert_eq!(store.auth_token().as_deref(), Some("tok"));
        assert_eq!(store.user_id().as_deref(), Some("u"));

        store.initialize_from_settings(&AppSettings {
            auth_token: Some("   ".into()),
            ..Default::default()
        });
        assert!(!store.is_logged_in());
        assert!(store.auth_token().is_none());
    }

    #[tokio::test]
    async fn login_persists_and_notifies() {
        let (ctx, store) = store();
        let mut rx = store.subscribe();

        store.login(credentials("tok-1")).await.unwrap();
        assert!(rx.has_changed().unwrap());
        let state = rx.borrow_and_update().clone();
        assert!(state.is_authenticated);
        assert!(!state.is_logging_in);
        assert_eq!(state.user_id.as_deref(), Some("user-1"));

        let saved = ctx.settings().unwrap().get().unwrap();
        assert_eq!(saved.auth_token.as_deref(), Some("tok-1"));
    }

    #[tokio::test]
    async fn failed_login_records_error() {
        let (_ctx, store) = store();
        assert!(store.login(credentials(" ")).await.is_err());
        let state = store.snapshot();
        assert!(!state.is_logging_in);
        assert!(!state.is_authenticated);
        assert_eq!(state.login_error.as_deref(), Some("auth error: token is empty"));
    }

    #[tokio::test]
    async fn logout_clears_state_and_settings() {
        let (ctx, store) = store();
        store.login(credentials("tok-1")).await.unwrap();
        store.set_credits(Some(10));
        store.logout().await.unwrap();
        assert_eq!(store.snapshot(), AuthState::default());
        assert!(ctx.settings().unwrap().get().unwrap().auth_token.is_none());
    }

    #[tokio::test]
    async fn check_status_reads_settings() {
        let (ctx, store) = store();
        assert!(!store.check_auth_status(false).await.unwrap());

        let repo = ctx.settings().unwrap();
        let mut settings = repo.get().unwrap();
        settings.auth_token = Some("external".into());
        repo.save(&settings).unwrap();

        assert!(store.check_auth_status(true).await.unwrap());
        assert_eq!(store.auth_token().as_deref(), Some("external"));
        assert_eq!(store.refresh_credits().await.unwrap(), None);
    }

    #[test]
    fn setters_update_state() {
        let (_ctx, store) = store();
        store.set_auth_token(Some("t".into()));
        store.set_user_id(Some("u".into()));
        store.set_user_info(Some(UserInfo {
            id: "u".into(),
            name: Some("Ada".into()),
            email: None,
        }));
        store.set_login_error(Some("boom".into()));
        let state = store.snapshot();
        assert!(state.is_authenticated);
        assert_eq!(state.user_info.unwrap().name.as_deref(), Some("Ada"));
        assert_eq!(state.login_error.as_deref(), Some("boom"));

        store.set_auth_token(None);
        assert!(!store.is_logged_in());
    }
}
