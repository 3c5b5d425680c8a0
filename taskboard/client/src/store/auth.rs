use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use taskboard_core::{AuthResponse, Credentials, GoogleLogin, ProfileUpdate, Registration, User};

use crate::api::{AuthApi, UserApi};
use crate::error::ApiError;
use crate::session::Session;
use crate::storage::Storage;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub user: Option<User>,
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub error: Option<String>,
    /// Set when the session expired and the user has to log in again.
    pub login_required: bool,
}

/// Shared handle to the signed-in user and the persisted session.
///
/// Clones share state. Actions take the remote API as a parameter.
#[derive(Clone)]
pub struct AuthStore {
    state: Arc<Mutex<AuthState>>,
    session: Session,
}

impl AuthStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            state: Arc::new(Mutex::new(AuthState::default())),
            session: Session::new(storage),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AuthState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> AuthState {
        self.lock().clone()
    }

    pub fn user(&self) -> Option<User> {
        self.lock().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().is_authenticated
    }

    pub fn login_required(&self) -> bool {
        self.lock().login_required
    }

    pub fn access_token(&self) -> Option<String> {
        self.session.token()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.session.refresh_token()
    }

    /// Stores a freshly issued session and the user it belongs to.
    pub fn apply_session(&self, response: &AuthResponse) {
        if let Err(err) = self
            .session
            .store(&response.token, response.refresh_token.as_deref())
        {
            tracing::error!("Failed to persist session: {}", err);
        }
        let mut state = self.lock();
        state.user = Some(response.user.clone());
        state.is_authenticated = true;
        state.login_required = false;
        state.error = None;
    }

    fn clear_session(&self) {
        if let Err(err) = self.session.clear() {
            tracing::error!("Failed to clear persisted session: {}", err);
        }
        let mut state = self.lock();
        state.user = None;
        state.is_authenticated = false;
    }

    /// Drops the session after a failed renewal and asks for a new login.
    pub fn expire_session(&self) {
        tracing::warn!("Session expired, login required");
        self.clear_session();
        self.lock().login_required = true;
    }

    pub fn clear_error(&self) {
        self.lock().error = None;
    }

    fn begin(&self) {
        let mut state = self.lock();
        state.is_loading = true;
        state.error = None;
    }

    fn finish<T>(&self, result: Result<T, ApiError>) -> Result<T, ApiError> {
        let mut state = self.lock();
        state.is_loading = false;
        if let Err(err) = &result {
            state.error = Some(err.to_string());
        }
        result
    }

    fn finish_login(&self, result: Result<AuthResponse, ApiError>) -> Result<User, ApiError> {
        let result = result.map(|response| {
            self.apply_session(&response);
            response.user
        });
        if let Err(err) = &result {
            tracing::error!("Login failed: {}", err);
        }
        self.finish(result)
    }

    pub async fn login_with_google<A>(&self, api: &A, credential: &str) -> Result<User, ApiError>
    where
        A: AuthApi + ?Sized,
    {
        self.begin();
        let request = GoogleLogin {
            token: credential.to_string(),
        };
        let result = api.login_with_google(&request).await;
        self.finish_login(result)
    }

    pub async fn login_with_email<A>(
        &self,
        api: &A,
        credentials: &Credentials,
    ) -> Result<User, ApiError>
    where
        A: AuthApi + ?Sized,
    {
        self.begin();
        let result = api.login(credentials).await;
        self.finish_login(result)
    }

    pub async fn register<A>(&self, api: &A, registration: &Registration) -> Result<User, ApiError>
    where
        A: AuthApi + ?Sized,
    {
        self.begin();
        let result = api.register(registration).await;
        self.finish_login(result)
    }

    /// Clears the local session, then tells the server. Server failures are only logged.
    pub async fn logout<A>(&self, api: &A)
    where
        A: AuthApi + ?Sized,
    {
        self.clear_session();
        {
            let mut state = self.lock();
            state.error = None;
            state.login_required = false;
        }
        if let Err(err) = api.logout().await {
            tracing::warn!("Server logout failed: {}", err);
        }
    }

    /// Restores the user for a persisted token.
    ///
    /// An expired token is renewed with the refresh token when one is stored. Any other
    /// failure clears the session. Returns whether a user is signed in afterwards.
    pub async fn check_auth<A>(&self, api: &A) -> bool
    where
        A: AuthApi + ?Sized,
    {
        let Some(token) = self.access_token() else {
            self.clear_session();
            return false;
        };

        self.begin();
        let result = match api.verify(&token).await {
            Err(ApiError::Unauthorized(_)) => match self.refresh_token() {
                Some(refresh_token) => api.refresh(&refresh_token).await.map(|response| {
                    self.apply_session(&response);
                    response.user
                }),
                None => Err(ApiError::SessionExpired),
            },
            other => other,
        };

        match result {
            Ok(user) => {
                let mut state = self.lock();
                state.user = Some(user);
                state.is_authenticated = true;
                state.is_loading = false;
                true
            }
            Err(err) => {
                tracing::info!("Stored session is no longer valid: {}", err);
                self.clear_session();
                self.lock().is_loading = false;
                false
            }
        }
    }

    /// Renames the signed-in user.
    pub async fn update_profile<U>(&self, api: &U, name: &str) -> Result<User, ApiError>
    where
        U: UserApi + ?Sized,
    {
        self.begin();
        let update = ProfileUpdate {
            name: name.to_string(),
        };
        let result = api.update_profile(&update).await;
        if let Ok(user) = &result {
            self.lock().user = Some(user.clone());
        }
        self.finish(result)
    }

    /// Reloads the signed-in user from the server.
    pub async fn refresh_user<U>(&self, api: &U) -> Result<User, ApiError>
    where
        U: UserApi + ?Sized,
    {
        self.begin();
        let result = api.current_user().await;
        if let Ok(user) = &result {
            let mut state = self.lock();
            state.user = Some(user.clone());
            state.is_authenticated = true;
        }
        self.finish(result)
    }
}
