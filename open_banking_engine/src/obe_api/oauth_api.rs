//! Authorization-code handling for the OAuth2 token service.
//!
//! Token minting and verification live with the HTTP server, which owns the signing secret. This API deals with the
//! stateful half: issuing codes and redeeming them exactly once.
use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;
use rand::{distributions::Alphanumeric, Rng};

use crate::{
    db_types::{AuthorizationCode, NewAuthorizationCode, Permission, Permissions, Tpp},
    obe_api::oauth_objects::{AuthorizationGrant, AuthorizationRequest},
    traits::{AuthorizationCodeStore, OAuthApiError},
};

const CODE_LENGTH: usize = 32;
pub const DEFAULT_CODE_TTL_SECS: i64 = 600;

pub struct OAuthApi<B> {
    db: B,
    code_ttl: Duration,
}

impl<B: Debug> Debug for OAuthApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OAuthApi ({:?})", self.db)
    }
}

impl<B> OAuthApi<B>
where B: AuthorizationCodeStore
{
    pub fn new(db: B) -> Self {
        Self { db, code_ttl: Duration::seconds(DEFAULT_CODE_TTL_SECS) }
    }

    pub fn with_code_ttl(mut self, ttl: Duration) -> Self {
        self.code_ttl = ttl;
        self
    }

    /// Issues a single-use authorization code for `user_id`.
    ///
    /// `tpp` is the already-validated client, if the request named one. When present, the redirect URI must be one it
    /// registered and the requested scope must be a subset of its services. Without a scope, the client's full service
    /// set (or `accounts` for anonymous clients) is granted.
    pub async fn authorize(
        &self,
        request: AuthorizationRequest,
        tpp: Option<&Tpp>,
        user_id: Option<&str>,
    ) -> Result<AuthorizationGrant, OAuthApiError> {
        if request.response_type.as_deref() != Some("code") {
            return Err(OAuthApiError::InvalidRequest("response_type must be 'code'".into()));
        }
        let user_id = user_id
            .filter(|u| !u.is_empty())
            .ok_or_else(|| OAuthApiError::InvalidRequest("the end-user is not authenticated".into()))?;
        let scope = match request.scope.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => Permissions::from_scope(s).map_err(|e| OAuthApiError::InvalidScope(e.to_string()))?,
            None => match tpp {
                Some(t) => t.services.clone(),
                None => [Permission::Accounts].into_iter().collect(),
            },
        };
        if scope.is_empty() {
            return Err(OAuthApiError::InvalidScope("no scope requested".into()));
        }
        if let Some(tpp) = tpp {
            if !scope.is_subset(&tpp.services) {
                warn!("🔐️ {} asked for scope [{scope}] but is registered for [{}]", tpp.tpp_id, tpp.services);
                let msg = format!("scope exceeds the services registered for {}", tpp.tpp_id);
                return Err(OAuthApiError::InvalidScope(msg));
            }
            if let Some(uri) = request.redirect_uri.as_deref() {
                if !tpp.allows_redirect_uri(uri) {
                    warn!("🔐️ {} used unregistered redirect URI {uri}", tpp.tpp_id);
                    return Err(OAuthApiError::InvalidRequest("redirect_uri is not registered".into()));
                }
            }
        }
        let code = rand::thread_rng().sample_iter(&Alphanumeric).take(CODE_LENGTH).map(char::from).collect::<String>();
        let new_code = NewAuthorizationCode {
            code,
            client_id: request.client_id.clone(),
            user_id: user_id.to_string(),
            scope: scope.clone(),
            redirect_uri: request.redirect_uri.clone(),
            expires_at: Utc::now() + self.code_ttl,
        };
        let code = self.db.insert_authorization_code(new_code).await?;
        debug!("🔐️ Authorization code issued to {user_id} for [{scope}]");
        Ok(AuthorizationGrant {
            code: code.code,
            state: request.state,
            redirect_uri: request.redirect_uri,
            scope: scope.to_scope(),
            expires_in: self.code_ttl.num_seconds(),
        })
    }

    /// Redeems an authorization code. The code is burnt even if the binding checks that follow fail.
    pub async fn exchange_code(
        &self,
        code: &str,
        client_id: Option<&str>,
        redirect_uri: Option<&str>,
    ) -> Result<AuthorizationCode, OAuthApiError> {
        let code = self
            .db
            .consume_authorization_code(code, Utc::now())
            .await?
            .ok_or_else(|| OAuthApiError::InvalidGrant("authorization code is invalid, expired or used".into()))?;
        if code.client_id.is_some() && code.client_id.as_deref() != client_id {
            warn!("🔐️ Authorization code for {:?} presented by {client_id:?}", code.client_id);
            return Err(OAuthApiError::InvalidGrant("authorization code was issued to another client".into()));
        }
        if let (Some(bound), Some(given)) = (code.redirect_uri.as_deref(), redirect_uri) {
            if bound != given {
                let msg = "redirect_uri does not match the authorization request";
                return Err(OAuthApiError::InvalidGrant(msg.into()));
            }
        }
        debug!("🔐️ Authorization code redeemed by {}", code.user_id);
        Ok(code)
    }
}
