/// Session identity
///
/// `SessionMiddleware` turns a signed session token into a `SessionUser` in
/// the request extensions. It never rejects a request: anonymous callers
/// simply have no `SessionUser`, and the `AuthUser` extractor redirects them
/// to the login page when a handler needs an identity.
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{web, Error, FromRequest, HttpMessage, HttpRequest};
use chrono::Utc;
use futures_util::future::LocalBoxFuture;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::User;

pub const DEFAULT_LOGIN_URL: &str = "/auth/login/";
pub const DEFAULT_COOKIE_NAME: &str = "sessionid";

const SESSION_ALGORITHM: Algorithm = Algorithm::HS256;

/// Session token claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

/// Where sessions come from and where anonymous callers are sent
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub secret: String,
    pub cookie_name: String,
    pub login_url: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            secret: String::new(),
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            login_url: DEFAULT_LOGIN_URL.to_string(),
        }
    }
}

/// Sign a session token for `user`, valid for `ttl_secs`
pub fn issue_token(
    secret: &str,
    user: &User,
    ttl_secs: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user.id.to_string(),
        username: user.username.clone(),
        iat: now,
        exp: now + ttl_secs,
    };
    encode(
        &Header::new(SESSION_ALGORITHM),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Decode and verify a session token
pub fn decode_token(secret: &str, token: &str) -> Option<User> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(SESSION_ALGORITHM),
    )
    .ok()?;

    let id = Uuid::parse_str(&data.claims.sub).ok()?;
    Some(User {
        id,
        username: data.claims.username,
    })
}

/// Identity attached to a request by `SessionMiddleware`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser(pub User);

pub struct SessionMiddleware {
    settings: Arc<SessionSettings>,
}

impl SessionMiddleware {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings: Arc::new(settings),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SessionMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = SessionMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SessionMiddlewareService {
            service: Rc::new(service),
            settings: self.settings.clone(),
        }))
    }
}

pub struct SessionMiddlewareService<S> {
    service: Rc<S>,
    settings: Arc<SessionSettings>,
}

impl<S> SessionMiddlewareService<S> {
    fn session_token(&self, req: &ServiceRequest) -> Option<String> {
        let bearer = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::to_string);

        bearer.or_else(|| {
            req.cookie(&self.settings.cookie_name)
                .map(|c| c.value().to_string())
        })
    }
}

impl<S, B> Service<ServiceRequest> for SessionMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if let Some(token) = self.session_token(&req) {
            match decode_token(&self.settings.secret, &token) {
                Some(user) => {
                    req.extensions_mut().insert(SessionUser(user));
                }
                None => debug!(path = %req.path(), "Ignoring invalid session token"),
            }
        }

        let service = self.service.clone();
        Box::pin(async move { service.call(req).await })
    }
}

fn session_user(req: &HttpRequest) -> Option<User> {
    req.extensions().get::<SessionUser>().map(|s| s.0.clone())
}

/// An authenticated caller; anonymous requests are redirected to login
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        ready(session_user(req).map(AuthUser).ok_or_else(|| {
            let login_url = req
                .app_data::<web::Data<SessionSettings>>()
                .map(|s| s.login_url.clone())
                .unwrap_or_else(|| DEFAULT_LOGIN_URL.to_string());
            let next = req
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| req.path().to_string());
            AppError::LoginRequired { login_url, next }
        }))
    }
}

/// The caller if a session is present
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl FromRequest for MaybeUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        ready(Ok(MaybeUser(session_user(req))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "leo".to_string(),
        }
    }

    #[test]
    fn test_token_roundtrip() {
        let user = user();
        let token = issue_token("secret", &user, 3600).unwrap();
        assert_eq!(decode_token("secret", &token), Some(user));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = issue_token("secret", &user(), 3600).unwrap();
        assert_eq!(decode_token("other", &token), None);
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let token = issue_token("secret", &user(), -3600).unwrap();
        assert_eq!(decode_token("secret", &token), None);
    }
}
