//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate function. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Any long, non-cpu-bound operation (e.g. I/O, database operations,
//! etc.) must be expressed as futures or asynchronous functions.
//!
//! Protected routes are declared with `where requires [...]`. They are wrapped in the TPP guard (see
//! [`crate::middleware::TppGuardFactory`]), so by the time the handler runs, the TPP is validated and charged, and the
//! bearer token carries the listed scope. Consent is then checked by the handler itself.
use actix_web::{
    get,
    http::header::CACHE_CONTROL,
    web,
    Either,
    HttpMessage,
    HttpRequest,
    HttpResponse,
    Responder,
};
use log::*;
use open_banking_engine::{
    banking_objects::{FundsConfirmationRequest, PaymentInitiation, TransactionFilter},
    consent_objects::ConsentRequest,
    db_types::{Consent, Permission, Tpp, TransactionQuery},
    oauth_objects::{AuthorizationRequest, GrantType, TokenRequest},
    tpp_objects::{TppRegistration, TppRegistrationResult},
    traits::{AuthorizationCodeStore, BankingData, ConsentManagement, TppManagement},
    BankingApi,
    ConsentApi,
    OAuthApi,
    TppApi,
};
use serde_json::json;

use crate::{
    auth::{JwtClaims, MaybeAuthenticated, TokenIssuer, TokenUse},
    data_objects::{consent_links, payment_links},
    errors::ServerError,
    helpers::{psu_id, tpp_id},
    json_api::{Document, ResourceObject},
    middleware::{AuditedConsent, ValidatedTpp},
    openapi,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro.
// Each bound becomes a type parameter of the handler, in the order given. Guarded routes must list `TppManagement`
// among their bounds, since the guard validates the caller against it.
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($scope:expr),*]) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>)
                    .wrap($crate::middleware::TppGuardFactory::<TTppManagement>::new(&[$($scope),*]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

/// Serves the OpenAPI description at both `/openapi.json` and `/spec`.
pub async fn openapi_json() -> HttpResponse {
    HttpResponse::Ok().json(openapi::document())
}

/// Answers CORS preflight requests on any path.
pub async fn preflight() -> HttpResponse {
    HttpResponse::NoContent()
        .insert_header(("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS"))
        .insert_header((
            "Access-Control-Allow-Headers",
            "authorization, content-type, x-tpp-id, x-fapi-interaction-id, x-fapi-customer-ip-address, \
             x-fapi-auth-date, psu-id",
        ))
        .insert_header(("Access-Control-Max-Age", "86400"))
        .finish()
}

pub async fn not_found(req: HttpRequest) -> Result<HttpResponse, ServerError> {
    debug!("💻️ No route for {} {}", req.method(), req.path());
    Err(ServerError::NoRecordFound(format!("No resource at {} {}", req.method(), req.path())))
}

//----------------------------------------------   TPPs  ----------------------------------------------------
route!(register_tpp => Post "/tpps" impl TppManagement);
/// Registers a Third-Party Provider. New registrations are `pending` until an operator reviews them.
pub async fn register_tpp<T: TppManagement>(
    body: web::Json<TppRegistration>,
    api: web::Data<TppApi<T>>,
) -> Result<HttpResponse, ServerError> {
    let registration = body.into_inner();
    debug!("💻️ POST tpps for {}", registration.tpp_id);
    let result = TppRegistrationResult::from(api.register(registration).await?);
    let message = result.message.clone();
    Ok(Document::single(result.into()).with_meta(json!({ "message": message })).created())
}

//----------------------------------------------   OAuth  ----------------------------------------------------
route!(authorize => Get "/oauth/authorize" impl AuthorizationCodeStore, TppManagement);
/// Issues a single-use authorization code to the end-user named in the `PSU-ID` header.
///
/// If the request names a client, that TPP is validated (and charged) first, and the redirect URI and scope are
/// checked against its registration. The grant is returned as JSON, echoing `state`.
pub async fn authorize<C, T>(
    req: HttpRequest,
    query: web::Query<AuthorizationRequest>,
    oauth: web::Data<OAuthApi<C>>,
    tpps: web::Data<TppApi<T>>,
) -> Result<HttpResponse, ServerError>
where
    C: AuthorizationCodeStore,
    T: TppManagement,
{
    let request = query.into_inner();
    debug!("💻️ GET authorize for client {:?}", request.client_id);
    let tpp = validated_client(&req, request.client_id.as_deref(), tpps.as_ref()).await?;
    let grant = oauth.authorize(request, tpp.as_ref(), psu_id(&req)).await?;
    Ok(HttpResponse::Ok().json(grant))
}

route!(token => Post "/oauth/token" impl AuthorizationCodeStore, TppManagement);
/// The token endpoint. Accepts the usual form-encoded body, or the same fields as JSON.
pub async fn token<C, T>(
    req: HttpRequest,
    body: Either<web::Form<TokenRequest>, web::Json<TokenRequest>>,
    oauth: web::Data<OAuthApi<C>>,
    tpps: web::Data<TppApi<T>>,
    issuer: web::Data<TokenIssuer>,
) -> Result<HttpResponse, ServerError>
where
    C: AuthorizationCodeStore,
    T: TppManagement,
{
    let request = match body {
        Either::Left(form) => form.into_inner(),
        Either::Right(json) => json.into_inner(),
    };
    debug!("💻️ POST token ({}) for client {:?}", request.grant_type, request.client_id);
    let tpp = validated_client(&req, request.client_id.as_deref(), tpps.as_ref()).await?;
    let tokens = match request.grant_type.parse::<GrantType>()? {
        GrantType::AuthorizationCode => {
            let code = required_field(request.code.as_deref(), "code")?;
            let grant = oauth.exchange_code(code, request.client_id.as_deref(), request.redirect_uri.as_deref()).await?;
            issuer.issue_tokens(&grant.user_id, &grant.scope, grant.client_id.as_deref())?
        },
        GrantType::RefreshToken => {
            let refresh_token = required_field(request.refresh_token.as_deref(), "refresh_token")?;
            let claims = refreshable_claims(&issuer, refresh_token, tpp.as_ref())?;
            issuer.issue_tokens(&claims.sub, &claims.permissions(), claims.client_id.as_deref())?
        },
    };
    Ok(HttpResponse::Ok().insert_header((CACHE_CONTROL, "no-store")).json(tokens))
}

fn required_field<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, ServerError> {
    value.map(str::trim).filter(|v| !v.is_empty()).ok_or_else(|| ServerError::BadRequest(format!("{name} is required")))
}

/// A refresh token is only honoured for the client it was issued to.
fn refreshable_claims(issuer: &TokenIssuer, token: &str, client: Option<&Tpp>) -> Result<JwtClaims, ServerError> {
    let claims = issuer.verify(token, TokenUse::Refresh).map_err(|e| {
        debug!("💻️ Refresh token rejected. {e}");
        ServerError::BadRequest(format!("Invalid grant: {e}"))
    })?;
    let presented_by = client.map(|t| t.tpp_id.as_str());
    if claims.client_id.is_some() && claims.client_id.as_deref() != presented_by {
        warn!("💻️ Refresh token for {:?} presented by {presented_by:?}", claims.client_id);
        return Err(ServerError::BadRequest("Invalid grant: refresh token was issued to another client".into()));
    }
    Ok(claims)
}

/// Validates the OAuth client, when the request names one. The validated TPP is attached to the request so that the
/// audit record names it.
async fn validated_client<T: TppManagement>(
    req: &HttpRequest,
    client_id: Option<&str>,
    api: &TppApi<T>,
) -> Result<Option<Tpp>, ServerError> {
    let Some(client_id) = client_id.map(str::trim).filter(|c| !c.is_empty()) else {
        return Ok(None);
    };
    let endpoint = req.match_pattern().unwrap_or_else(|| req.path().to_string());
    let tpp = api.validate(client_id, &endpoint).await.map_err(|e| {
        warn!("🔐️ OAuth client {client_id} was turned away from {endpoint}. {e}");
        ServerError::from(e)
    })?;
    req.extensions_mut().insert(ValidatedTpp(tpp.clone()));
    Ok(Some(tpp))
}

//----------------------------------------------   Accounts  ----------------------------------------------------
route!(accounts => Get "/accounts" impl TppManagement, ConsentManagement, BankingData where requires [Permission::Accounts]);
pub async fn accounts<T, C, B>(
    req: HttpRequest,
    tpp: ValidatedTpp,
    claims: JwtClaims,
    consents: web::Data<ConsentApi<C>>,
    banking: web::Data<BankingApi<B>>,
) -> Result<Document, ServerError>
where
    T: TppManagement,
    C: ConsentManagement,
    B: BankingData,
{
    debug!("💻️ GET accounts for {} via {}", claims.sub, tpp.0.tpp_id);
    require_consent(&req, &consents, &tpp, &claims, Permission::Accounts).await?;
    let accounts = banking.accounts_for_user(&claims.sub).await?;
    let resources = accounts.into_iter().map(ResourceObject::from).collect();
    Ok(Document::collection(resources).with_link("self", "/accounts"))
}

route!(account_detail => Get "/accounts/{account_id}" impl TppManagement, ConsentManagement, BankingData where requires [Permission::Accounts]);
pub async fn account_detail<T, C, B>(
    req: HttpRequest,
    path: web::Path<String>,
    tpp: ValidatedTpp,
    claims: JwtClaims,
    consents: web::Data<ConsentApi<C>>,
    banking: web::Data<BankingApi<B>>,
) -> Result<Document, ServerError>
where
    T: TppManagement,
    C: ConsentManagement,
    B: BankingData,
{
    let account_id = path.into_inner();
    debug!("💻️ GET account {account_id} for {}", claims.sub);
    require_consent(&req, &consents, &tpp, &claims, Permission::Accounts).await?;
    let account = banking.account_for_user(&claims.sub, &account_id).await?;
    Ok(Document::single(account.into())
        .with_link("self", format!("/accounts/{account_id}"))
        .with_link("balances", format!("/accounts/{account_id}/balances"))
        .with_link("transactions", format!("/accounts/{account_id}/transactions")))
}

route!(transactions => Get "/accounts/{account_id}/transactions" impl TppManagement, ConsentManagement, BankingData where requires [Permission::Transactions]);
pub async fn transactions<T, C, B>(
    req: HttpRequest,
    path: web::Path<String>,
    filter: web::Query<TransactionFilter>,
    tpp: ValidatedTpp,
    claims: JwtClaims,
    consents: web::Data<ConsentApi<C>>,
    banking: web::Data<BankingApi<B>>,
) -> Result<Document, ServerError>
where
    T: TppManagement,
    C: ConsentManagement,
    B: BankingData,
{
    let account_id = path.into_inner();
    let filter = filter.into_inner();
    debug!("💻️ GET transactions for {account_id} ({:?} to {:?})", filter.from_date, filter.to_date);
    require_consent(&req, &consents, &tpp, &claims, Permission::Transactions).await?;
    let query = TransactionQuery { from_date: filter.from_date, to_date: filter.to_date };
    let transactions = banking.transactions(&claims.sub, &account_id, query).await?;
    let resources = transactions.into_iter().map(ResourceObject::from).collect();
    Ok(Document::collection(resources).with_link("account", format!("/accounts/{account_id}")))
}

route!(balances => Get "/accounts/{account_id}/balances" impl TppManagement, ConsentManagement, BankingData where requires [Permission::Balances]);
pub async fn balances<T, C, B>(
    req: HttpRequest,
    path: web::Path<String>,
    tpp: ValidatedTpp,
    claims: JwtClaims,
    consents: web::Data<ConsentApi<C>>,
    banking: web::Data<BankingApi<B>>,
) -> Result<Document, ServerError>
where
    T: TppManagement,
    C: ConsentManagement,
    B: BankingData,
{
    let account_id = path.into_inner();
    debug!("💻️ GET balances for {account_id}");
    require_consent(&req, &consents, &tpp, &claims, Permission::Balances).await?;
    let balance = banking.balances(&claims.sub, &account_id).await?;
    Ok(Document::single(balance.into()).with_link("account", format!("/accounts/{account_id}")))
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(initiate_payment => Post "/payments" impl TppManagement, ConsentManagement, BankingData where requires [Permission::Payments]);
/// Records a payment initiation against the caller's `payments` consent. The payment is returned in `RCVD`, with links
/// to its SCA step and status.
pub async fn initiate_payment<T, C, B>(
    req: HttpRequest,
    body: web::Json<PaymentInitiation>,
    tpp: ValidatedTpp,
    claims: JwtClaims,
    consents: web::Data<ConsentApi<C>>,
    banking: web::Data<BankingApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    T: TppManagement,
    C: ConsentManagement,
    B: BankingData,
{
    debug!("💸️ POST payments for {} via {}", claims.sub, tpp.0.tpp_id);
    let consent = require_consent(&req, &consents, &tpp, &claims, Permission::Payments).await?;
    let payment =
        banking.initiate_payment(&tpp.0.tpp_id, &claims.sub, Some(consent.consent_id), body.into_inner()).await?;
    let links = payment_links(&payment);
    let doc = links.into_iter().fold(Document::single(payment.into()), |doc, (rel, href)| doc.with_link(rel, href));
    Ok(doc.created())
}

route!(payment => Get "/payments/{payment_id}" impl TppManagement, ConsentManagement, BankingData where requires [Permission::Payments]);
pub async fn payment<T, C, B>(
    req: HttpRequest,
    path: web::Path<String>,
    tpp: ValidatedTpp,
    claims: JwtClaims,
    consents: web::Data<ConsentApi<C>>,
    banking: web::Data<BankingApi<B>>,
) -> Result<Document, ServerError>
where
    T: TppManagement,
    C: ConsentManagement,
    B: BankingData,
{
    fetch_payment(&req, &path.into_inner(), &tpp, &claims, &consents, &banking).await
}

route!(payment_status => Get "/payments/{payment_id}/status" impl TppManagement, ConsentManagement, BankingData where requires [Permission::Payments]);
pub async fn payment_status<T, C, B>(
    req: HttpRequest,
    path: web::Path<String>,
    tpp: ValidatedTpp,
    claims: JwtClaims,
    consents: web::Data<ConsentApi<C>>,
    banking: web::Data<BankingApi<B>>,
) -> Result<Document, ServerError>
where
    T: TppManagement,
    C: ConsentManagement,
    B: BankingData,
{
    fetch_payment(&req, &path.into_inner(), &tpp, &claims, &consents, &banking).await
}

async fn fetch_payment<C: ConsentManagement, B: BankingData>(
    req: &HttpRequest,
    payment_id: &str,
    tpp: &ValidatedTpp,
    claims: &JwtClaims,
    consents: &ConsentApi<C>,
    banking: &BankingApi<B>,
) -> Result<Document, ServerError> {
    debug!("💸️ GET payment {payment_id} for {}", claims.sub);
    require_consent(req, consents, tpp, claims, Permission::Payments).await?;
    let payment = banking.payment_status(&tpp.0.tpp_id, &claims.sub, payment_id).await?;
    let links = payment_links(&payment);
    Ok(links.into_iter().fold(Document::single(payment.into()), |doc, (rel, href)| doc.with_link(rel, href)))
}

//----------------------------------------------   Funds confirmation  ----------------------------------------------
route!(funds_confirmation => Post "/funds-confirmation" impl TppManagement, BankingData where requires [Permission::FundsConfirmation]);
/// Answers whether the account can cover the amount right now. Nothing is reserved.
pub async fn funds_confirmation<T, B>(
    body: web::Json<FundsConfirmationRequest>,
    claims: JwtClaims,
    banking: web::Data<BankingApi<B>>,
) -> Result<Document, ServerError>
where
    T: TppManagement,
    B: BankingData,
{
    debug!("💸️ POST funds-confirmation for {}", claims.sub);
    let confirmation = banking.confirm_funds(&claims.sub, body.into_inner()).await?;
    Ok(Document::single(confirmation.into()))
}

//----------------------------------------------   Consents  ----------------------------------------------------
route!(create_consent => Post "/consents" impl ConsentManagement);
/// Creates a `pending` consent for the authenticated end-user and the TPP named in `x-tpp-id`.
pub async fn create_consent<C: ConsentManagement>(
    req: HttpRequest,
    user: MaybeAuthenticated,
    body: web::Json<ConsentRequest>,
    api: web::Data<ConsentApi<C>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = user.0.as_ref().map(|c| c.sub.as_str());
    debug!("📜️ POST consents for {user_id:?} via {:?}", tpp_id(&req));
    let consent = api.create(tpp_id(&req), user_id, body.into_inner()).await?;
    req.extensions_mut().insert(AuditedConsent(consent.consent_id.clone()));
    Ok(consent_document(consent).created())
}

route!(get_consent => Get "/consents/{consent_id}" impl ConsentManagement);
pub async fn get_consent<C: ConsentManagement>(
    req: HttpRequest,
    path: web::Path<String>,
    api: web::Data<ConsentApi<C>>,
) -> Result<Document, ServerError> {
    let consent_id = path.into_inner();
    trace!("📜️ GET consent {consent_id}");
    req.extensions_mut().insert(AuditedConsent(consent_id.clone()));
    let consent = api.get(&consent_id).await?;
    Ok(consent_document(consent))
}

route!(revoke_consent => Delete "/consents/{consent_id}" impl ConsentManagement);
pub async fn revoke_consent<C: ConsentManagement>(
    req: HttpRequest,
    path: web::Path<String>,
    api: web::Data<ConsentApi<C>>,
) -> Result<Document, ServerError> {
    let consent_id = path.into_inner();
    debug!("📜️ DELETE consent {consent_id}");
    req.extensions_mut().insert(AuditedConsent(consent_id.clone()));
    let consent = api.revoke(&consent_id).await?;
    Ok(consent_document(consent))
}

route!(authorise_consent => Post "/consents/{consent_id}/authorise" impl ConsentManagement);
/// Completes SCA for a pending consent.
pub async fn authorise_consent<C: ConsentManagement>(
    req: HttpRequest,
    path: web::Path<String>,
    api: web::Data<ConsentApi<C>>,
) -> Result<Document, ServerError> {
    let consent_id = path.into_inner();
    debug!("📜️ POST authorise consent {consent_id}");
    req.extensions_mut().insert(AuditedConsent(consent_id.clone()));
    let consent = api.authorize(&consent_id).await?;
    Ok(consent_document(consent))
}

fn consent_document(consent: Consent) -> Document {
    let links = consent_links(&consent.consent_id);
    links.into_iter().fold(Document::single(consent.into()), |doc, (rel, href)| doc.with_link(rel, href))
}

/// Finds the consent covering `permission` for this TPP and end-user, and names it on the audit record.
async fn require_consent<C: ConsentManagement>(
    req: &HttpRequest,
    api: &ConsentApi<C>,
    tpp: &ValidatedTpp,
    claims: &JwtClaims,
    permission: Permission,
) -> Result<Consent, ServerError> {
    let consent = api.require_for(&tpp.0.tpp_id, &claims.sub, permission).await?;
    req.extensions_mut().insert(AuditedConsent(consent.consent_id.clone()));
    Ok(consent)
}
