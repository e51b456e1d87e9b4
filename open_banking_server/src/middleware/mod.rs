mod interaction;
mod tpp_guard;

use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
pub use interaction::{AuditedConsent, InteractionId, InteractionTracerFactory, InteractionTracerService};
use open_banking_engine::db_types::Tpp;
pub use tpp_guard::{TppGuardFactory, TppGuardService};

use crate::errors::{AuthError, ServerError};

/// The TPP that passed the guard on this request.
#[derive(Debug, Clone)]
pub struct ValidatedTpp(pub Tpp);

impl FromRequest for ValidatedTpp {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let tpp = req.extensions().get::<ValidatedTpp>().cloned();
        ready(tpp.ok_or(ServerError::AuthenticationError(AuthError::MissingTpp)))
    }
}
