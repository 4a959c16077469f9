// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::auth::{Authenticator, TokenResponse};
use crate::error::CredentialError;

/// Opaque bearer token.
///
/// Whether it is still valid is only known once the server answers.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

impl From<&str> for Credential {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

/// Whether requests can be made without signing in again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    LoggedIn,
    LoggedOut,
}

/// Owner of the cached credential and of the ways to obtain a new one
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Whether a credential is cached or obtainable without interactive login
    async fn is_authenticated(&self) -> bool;

    /// The cached credential, if any. Never touches the network.
    async fn cached_credential(&self) -> Option<Credential>;

    /// Obtain a new credential via refresh token or stored login
    async fn refresh_credential(&self) -> Result<Credential, CredentialError>;

    /// Forget the cached credential so the next acquisition goes to the network
    async fn invalidate_credential(&self);

    async fn auth_state(&self) -> AuthState {
        if self.is_authenticated().await {
            AuthState::LoggedIn
        } else {
            AuthState::LoggedOut
        }
    }
}

/// Account details used to log in again when no refresh token works
#[derive(Clone)]
pub struct LoginDetails {
    pub email: String,
    pub password: String,
}

impl LoginDetails {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for LoginDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginDetails")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Default)]
struct Session {
    access_token: Option<Credential>,
    refresh_token: Option<String>,
    login: Option<LoginDetails>,
    /// Bumped every time a new access token is installed
    generation: u64,
}

/// In-memory credential store backed by an [`Authenticator`]
pub struct SessionStore<A> {
    authenticator: A,
    session: RwLock<Session>,
    refresh_lock: Mutex<()>,
}

impl<A: Authenticator> SessionStore<A> {
    pub fn new(authenticator: A) -> Self {
        Self {
            authenticator,
            session: RwLock::new(Session::default()),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.session.get_mut().refresh_token = Some(refresh_token.into());
        self
    }

    pub fn with_login(mut self, login: LoginDetails) -> Self {
        self.session.get_mut().login = Some(login);
        self
    }

    /// Log in interactively and keep the account details for later refreshes
    pub async fn sign_in(&self, login: LoginDetails) -> Result<Credential, CredentialError> {
        let _guard = self.refresh_lock.lock().await;
        let generation = self.session.read().await.generation;

        let tokens = self
            .authenticator
            .login(&login.email, &login.password)
            .await?;

        let mut session = self.session.write().await;
        if session.generation != generation {
            warn!("Session changed during sign-in, discarding issued tokens");
            return Err(CredentialError::NotSignedIn);
        }
        session.login = Some(login);
        Ok(install_tokens(&mut session, tokens))
    }

    /// Install tokens obtained elsewhere, e.g. restored from settings
    pub async fn set_tokens(&self, access_token: Credential, refresh_token: Option<String>) {
        let mut session = self.session.write().await;
        session.access_token = Some(access_token);
        session.refresh_token = refresh_token;
        session.generation += 1;
    }

    /// Current refresh token, for the host to persist
    pub async fn refresh_token(&self) -> Option<String> {
        self.session.read().await.refresh_token.clone()
    }

    /// Forget every stored secret
    pub async fn sign_out(&self) {
        let mut session = self.session.write().await;
        let generation = session.generation + 1;
        *session = Session {
            generation,
            ..Session::default()
        };
        info!("Signed out, session cleared");
    }

    async fn acquire(
        &self,
        refresh_token: Option<String>,
        login: Option<LoginDetails>,
    ) -> Result<TokenResponse, CredentialError> {
        if let Some(refresh_token) = refresh_token {
            match self.authenticator.refresh(&refresh_token).await {
                Ok(tokens) => return Ok(tokens),
                Err(CredentialError::Rejected(reason)) if login.is_some() => {
                    warn!(reason = %reason, "Refresh token rejected, logging in again");
                }
                Err(e) => return Err(e),
            }
        }

        match login {
            Some(login) => {
                self.authenticator
                    .login(&login.email, &login.password)
                    .await
            }
            None => Err(CredentialError::NotSignedIn),
        }
    }
}

fn install_tokens(session: &mut Session, tokens: TokenResponse) -> Credential {
    let credential = Credential::new(tokens.access_token);
    session.access_token = Some(credential.clone());
    if tokens.refresh_token.is_some() {
        session.refresh_token = tokens.refresh_token;
    }
    session.generation += 1;
    credential
}

#[async_trait]
impl<A: Authenticator> CredentialStore for SessionStore<A> {
    async fn is_authenticated(&self) -> bool {
        let session = self.session.read().await;
        session.access_token.is_some() || session.refresh_token.is_some() || session.login.is_some()
    }

    async fn cached_credential(&self) -> Option<Credential> {
        self.session.read().await.access_token.clone()
    }

    async fn refresh_credential(&self) -> Result<Credential, CredentialError> {
        let seen_generation = self.session.read().await.generation;
        let _guard = self.refresh_lock.lock().await;

        let (refresh_token, login, generation) = {
            let session = self.session.read().await;

            // Another task installed a new token while this one waited for the lock
            if session.generation != seen_generation
                && let Some(credential) = &session.access_token
            {
                debug!("Reusing credential refreshed by a concurrent request");
                return Ok(credential.clone());
            }

            (
                session.refresh_token.clone(),
                session.login.clone(),
                session.generation,
            )
        };

        let tokens = self.acquire(refresh_token, login).await?;

        let mut session = self.session.write().await;

        // Signed out or replaced while the exchange was in flight
        if session.generation != generation {
            warn!("Session changed during refresh, discarding issued tokens");
            return session
                .access_token
                .clone()
                .ok_or(CredentialError::NotSignedIn);
        }

        Ok(install_tokens(&mut session, tokens))
    }

    async fn invalidate_credential(&self) {
        self.session.write().await.access_token = None;
    }
}
