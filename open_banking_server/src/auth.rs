//! Bearer tokens.
//!
//! Access and refresh tokens are HS256 JWTs signed with the gateway's secret. They carry the end-user (`sub`), the
//! granted `scope`, and the TPP the grant was made to (`client_id`), so a resource call can be checked against all
//! three without a store lookup. The token kind is part of the claims, so a refresh token can never be used as an
//! access token or vice versa.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, web, FromRequest, HttpMessage, HttpRequest};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use log::*;
use open_banking_engine::{
    db_types::{Permission, Permissions, Tpp},
    oauth_objects::TokenResponse,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenUse {
    Access,
    Refresh,
}

impl TokenUse {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenUse::Access => "access",
            TokenUse::Refresh => "refresh",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The end-user (PSU) the token acts for
    pub sub: String,
    /// Space-separated permissions
    pub scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub token_use: TokenUse,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

impl JwtClaims {
    /// The granted permissions. Unknown scope values grant nothing.
    pub fn permissions(&self) -> Permissions {
        Permissions::from_scope(&self.scope).unwrap_or_else(|e| {
            warn!("🔐️ Token for {} carries an unreadable scope. {e}", self.sub);
            Permissions::new()
        })
    }

    pub fn has_scope(&self, permission: Permission) -> bool {
        self.permissions().contains(permission)
    }

    /// A token issued to a TPP may only be presented by that TPP.
    pub fn check_client(&self, tpp: &Tpp) -> Result<(), AuthError> {
        match &self.client_id {
            Some(client) if client != &tpp.tpp_id => {
                Err(AuthError::ClientMismatch { issued_to: client.clone(), presented_by: tpp.tpp_id.clone() })
            },
            _ => Ok(()),
        }
    }
}

/// Handlers behind the TPP guard receive the claims it verified.
impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<JwtClaims>().cloned();
        ready(claims.ok_or(ServerError::AuthenticationError(AuthError::Unauthenticated)))
    }
}

pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_ttl: Duration,
    refresh_token_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.reveal().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_token_ttl: config.access_token_ttl,
            refresh_token_ttl: config.refresh_token_ttl,
        }
    }

    /// Issues an access and refresh token pair for `user_id`.
    /// This method DOES NOT check that the grant behind it is legitimate. That must be done prior to calling it.
    pub fn issue_tokens(
        &self,
        user_id: &str,
        scope: &Permissions,
        client_id: Option<&str>,
    ) -> Result<TokenResponse, AuthError> {
        let access_token = self.sign(user_id, scope, client_id, TokenUse::Access, self.access_token_ttl)?;
        let refresh_token = self.sign(user_id, scope, client_id, TokenUse::Refresh, self.refresh_token_ttl)?;
        debug!("🔐️ Issued tokens to {user_id} for [{scope}]");
        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_ttl.num_seconds(),
            refresh_token,
            scope: scope.to_scope(),
        })
    }

    fn sign(
        &self,
        user_id: &str,
        scope: &Permissions,
        client_id: Option<&str>,
        token_use: TokenUse,
        ttl: Duration,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = JwtClaims {
            sub: user_id.to_string(),
            scope: scope.to_scope(),
            client_id: client_id.map(String::from),
            token_use,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        self.sign_claims(&claims)
    }

    pub fn sign_claims(&self, claims: &JwtClaims) -> Result<String, AuthError> {
        encode(&Header::default(), claims, &self.encoding_key).map_err(|e| AuthError::SigningError(e.to_string()))
    }

    pub fn verify(&self, token: &str, expected: TokenUse) -> Result<JwtClaims, AuthError> {
        let claims = decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::ValidationError(e.to_string()),
            })?
            .claims;
        if claims.token_use != expected {
            return Err(AuthError::WrongTokenUse(claims.token_use.as_str().to_string()));
        }
        Ok(claims)
    }

    /// Resolves the caller from the `authorization` header. A missing, malformed or invalid token resolves to `None`:
    /// the caller is simply unauthenticated.
    pub fn resolve(&self, req: &HttpRequest) -> Option<JwtClaims> {
        let token = bearer_token(req)?;
        self.verify(token, TokenUse::Access)
            .map_err(|e| debug!("🔐️ Bearer token rejected. {e}"))
            .ok()
    }
}

/// The token in an `authorization: Bearer <token>` header, if there is one.
pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    let value = req.headers().get("authorization")?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// The end-user behind the request, if a valid access token was presented. Never fails by itself; handlers decide
/// what an anonymous caller may do.
#[derive(Debug, Clone)]
pub struct MaybeAuthenticated(pub Option<JwtClaims>);

impl FromRequest for MaybeAuthenticated {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = match req.app_data::<web::Data<TokenIssuer>>() {
            Some(issuer) => {
                let claims = issuer.resolve(req);
                if let Some(c) = &claims {
                    req.extensions_mut().insert(c.clone());
                }
                Ok(MaybeAuthenticated(claims))
            },
            None => Err(ServerError::InitializeError("No token issuer has been configured".into())),
        };
        ready(result)
    }
}
