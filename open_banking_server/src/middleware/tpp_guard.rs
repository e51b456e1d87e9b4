//! Access control for the protected resource routes.
//!
//! The checks run in a fixed order and the first failure answers the request:
//! 1. The `x-tpp-id` header names a registered TPP that is `authorized`, unexpired and within its hourly quota
//!    (validation consumes one unit of quota).
//! 2. The request carries a valid bearer access token.
//! 3. If the token was issued to a TPP, it is the one presenting it.
//! 4. The token's scope covers every permission the route requires.
//!
//! On success the validated [`ValidatedTpp`] and the token's [`JwtClaims`] are placed in the request extensions for
//! the handler (and the audit trail) to use. Consent checks are left to the handlers, since they depend on the
//! end-user and the permission the handler needs.
use std::{
    future::{ready, Ready},
    marker::PhantomData,
    rc::Rc,
};

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web,
    Error,
    HttpMessage,
};
use futures::future::LocalBoxFuture;
use log::*;
use open_banking_engine::{
    db_types::{Permission, Tpp},
    traits::TppManagement,
    TppApi,
};

use super::ValidatedTpp;
use crate::{
    auth::{JwtClaims, TokenIssuer},
    errors::{AuthError, ServerError},
    helpers::tpp_id,
};

pub struct TppGuardFactory<A> {
    required_scope: Vec<Permission>,
    _backend: PhantomData<fn() -> A>,
}

impl<A> TppGuardFactory<A> {
    pub fn new(required_scope: &[Permission]) -> Self {
        Self { required_scope: required_scope.to_vec(), _backend: PhantomData }
    }
}

impl<S, B, A> Transform<S, ServiceRequest> for TppGuardFactory<A>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
    A: TppManagement + 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<EitherBody<B>>;
    type Transform = TppGuardService<S, A>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(TppGuardService {
            required_scope: Rc::new(self.required_scope.clone()),
            service: Rc::new(service),
            _backend: PhantomData,
        }))
    }
}

pub struct TppGuardService<S, A> {
    required_scope: Rc<Vec<Permission>>,
    service: Rc<S>,
    _backend: PhantomData<fn() -> A>,
}

impl<S, B, A> Service<ServiceRequest> for TppGuardService<S, A>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
    A: TppManagement + 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<EitherBody<B>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let required_scope = Rc::clone(&self.required_scope);
        Box::pin(async move {
            match admit::<A>(&req, &required_scope).await {
                Ok((tpp, claims)) => {
                    req.extensions_mut().insert(ValidatedTpp(tpp));
                    req.extensions_mut().insert(claims);
                    let res = service.call(req).await?;
                    Ok(res.map_into_left_body())
                },
                // Answered here rather than returned as an error, so the outer middleware still decorate it
                Err(e) => Ok(req.error_response(e).map_into_right_body()),
            }
        })
    }
}

async fn admit<A: TppManagement + 'static>(
    req: &ServiceRequest,
    required_scope: &[Permission],
) -> Result<(Tpp, JwtClaims), ServerError> {
    let tpp_id = tpp_id(req.request()).ok_or(AuthError::MissingTpp)?;
    let api = req
        .app_data::<web::Data<TppApi<A>>>()
        .ok_or_else(|| ServerError::InitializeError("The TPP registry has not been configured".into()))?;
    let endpoint = req.match_pattern().unwrap_or_else(|| req.path().to_string());
    let tpp = api.validate(tpp_id, &endpoint).await.map_err(|e| {
        warn!("🔐️ {tpp_id} was turned away from {endpoint}. {e}");
        ServerError::from(e)
    })?;
    let issuer = req
        .app_data::<web::Data<TokenIssuer>>()
        .ok_or_else(|| ServerError::InitializeError("No token issuer has been configured".into()))?;
    let claims = issuer.resolve(req.request()).ok_or(AuthError::Unauthenticated)?;
    claims.check_client(&tpp).map_err(|e| {
        warn!("🔐️ {e}");
        e
    })?;
    let granted = claims.permissions();
    let missing = required_scope.iter().filter(|p| !granted.contains(**p)).map(|p| p.to_string()).collect::<Vec<_>>();
    if !missing.is_empty() {
        let missing = missing.join(" ");
        debug!("🔐️ Token for {} lacks [{missing}] on {endpoint}", claims.sub);
        return Err(AuthError::InsufficientScope(format!("Missing scope: {missing}")).into());
    }
    trace!("🔐️ {tpp_id} admitted to {endpoint} for {}", claims.sub);
    Ok((tpp, claims))
}
