use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{extractors::AuthContext, jwt::JwtKeys, password::verify_password},
    error::{AppError, AuthFailure},
    users::{
        dto::{ChangePasswordRequest, LoginRequest, SignupRequest, UpdateProfileRequest, UserResponse},
        repo::{StoreError, UserStore},
        repo_types::NewUser,
        username,
    },
};

/// Account flows over an injected store and the process-wide signing keys.
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn UserStore>,
    keys: JwtKeys,
}

impl AccountService {
    pub fn new(store: Arc<dyn UserStore>, keys: JwtKeys) -> Self {
        Self { store, keys }
    }

    /// Creates the account and returns a token for it.
    #[instrument(skip(self, req))]
    pub async fn signup(&self, mut req: SignupRequest) -> Result<String, AppError> {
        req.normalize();
        let username = match req.username.take() {
            Some(name) => name,
            None => self.generate_username(&req.firstname, &req.lastname).await,
        };
        req.validate(&username)?;

        let user = self
            .store
            .create_user(NewUser {
                id: Uuid::new_v4(),
                firstname: req.firstname,
                lastname: req.lastname,
                username,
                email: req.email,
                password: req.password,
            })
            .await?;

        let token = self.keys.sign(user.id)?;
        info!(user_id = %user.id, username = %user.username, "user signed up");
        Ok(token)
    }

    /// Unknown email and wrong password fail identically.
    #[instrument(skip(self, req))]
    pub async fn login(&self, mut req: LoginRequest) -> Result<String, AppError> {
        req.normalize();
        req.validate()?;

        let user = match self.store.get_user_by_id_or_email(&req.email).await {
            Ok(u) => u,
            Err(StoreError::NotFound) => {
                warn!(email = %req.email, "login unknown email");
                return Err(AppError::Authentication(AuthFailure::InvalidCredentials));
            }
            Err(e) => return Err(e.into()),
        };

        if !verify_password(&req.password, &user.password_hash) {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AppError::Authentication(AuthFailure::InvalidCredentials));
        }

        let token = self.keys.sign(user.id)?;
        info!(user_id = %user.id, "user logged in");
        Ok(token)
    }

    #[instrument(skip(self, ctx), fields(user_id = %ctx.user_id()))]
    pub async fn profile(&self, ctx: &AuthContext) -> Result<UserResponse, AppError> {
        let user = self
            .store
            .get_user_by_id_or_email(&ctx.user_id().to_string())
            .await?;
        Ok(user.into())
    }

    #[instrument(skip(self, ctx, req), fields(user_id = %ctx.user_id()))]
    pub async fn update_profile(
        &self,
        ctx: &AuthContext,
        req: UpdateProfileRequest,
    ) -> Result<UserResponse, AppError> {
        let patch = req.into_patch()?;
        let user = self.store.update_profile(ctx.user_id(), &patch).await?;
        info!("profile updated");
        Ok(user.into())
    }

    #[instrument(skip(self, ctx, req), fields(user_id = %ctx.user_id()))]
    pub async fn change_password(
        &self,
        ctx: &AuthContext,
        req: ChangePasswordRequest,
    ) -> Result<(), AppError> {
        req.validate()?;
        let user = self
            .store
            .get_user_by_id_or_email(&ctx.user_id().to_string())
            .await?;

        if !verify_password(&req.password, &user.password_hash) {
            warn!("change password with wrong current password");
            return Err(AppError::Authentication(AuthFailure::InvalidPassword));
        }

        self.store
            .update_password(user.id, &req.new_password)
            .await?;
        info!("password changed");
        Ok(())
    }

    /// Draws candidates until one is free. A failed probe counts as taken and
    /// settles on `candidate.lastname` instead.
    async fn generate_username(&self, firstname: &str, lastname: &str) -> String {
        let mut attempt = 0;
        loop {
            let candidate = {
                let mut rng = rand::thread_rng();
                username::candidate(&mut rng, firstname, attempt)
            };
            match self.store.username_exists(&candidate).await {
                Ok(false) => return candidate,
                Ok(true) => attempt += 1,
                Err(e) => {
                    warn!(error = %e, candidate = %candidate, "error validating username");
                    return username::with_lastname(&candidate, lastname);
                }
            }
        }
    }
}
