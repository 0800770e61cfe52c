/// Access token middleware
///
/// Guards protected routes: extracts the bearer token, verifies signature and
/// expiry, and rejects any token whose `type` claim is not `access`. A
/// refresh token must never open a protected endpoint. Valid claims are
/// injected into request extensions for the handlers.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage, HttpResponse,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::{decode_token, TokenType};
use crate::configuration::JwtSettings;

pub struct JwtMiddleware {
    jwt_config: JwtSettings,
}

impl JwtMiddleware {
    pub fn new(jwt_config: JwtSettings) -> Self {
        Self { jwt_config }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtMiddlewareService {
            service: Rc::new(service),
            jwt_config: self.jwt_config.clone(),
        }))
    }
}

pub struct JwtMiddlewareService<S> {
    service: Rc<S>,
    jwt_config: JwtSettings,
}

fn unauthorized(message: &str, code: &str) -> HttpResponse {
    HttpResponse::Unauthorized().json(serde_json::json!({
        "error": message,
        "code": code
    }))
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
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
        let bearer_token = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::to_string);

        let token = match bearer_token {
            Some(token) => token,
            None => {
                tracing::warn!("Missing or invalid Authorization header");
                let response = unauthorized("Missing or invalid authorization header", "UNAUTHORIZED");
                return Box::pin(async move {
                    Err(actix_web::error::InternalError::from_response("Unauthorized", response)
                        .into())
                });
            }
        };

        let claims = match decode_token(&token, &self.jwt_config) {
            Ok(claims) => claims,
            Err(reason) => {
                tracing::warn!(reason = %reason, "Access token rejected");
                let response = unauthorized("Invalid or expired token", "INVALID_TOKEN");
                return Box::pin(async move {
                    Err(actix_web::error::InternalError::from_response("Invalid token", response)
                        .into())
                });
            }
        };

        // Wrong-kind tokens are a privilege confusion, rejected identically
        // to malformed ones.
        if claims.token_type != TokenType::Access {
            tracing::warn!(
                token_type = %claims.token_type,
                "Non-access token presented to protected endpoint"
            );
            let response = unauthorized("Invalid or expired token", "INVALID_TOKEN");
            return Box::pin(async move {
                Err(actix_web::error::InternalError::from_response("Invalid token", response)
                    .into())
            });
        }

        req.extensions_mut().insert(claims.clone());

        tracing::debug!(user_id = %claims.sub, "Access token validated");

        let service = self.service.clone();
        Box::pin(async move { service.call(req).await })
    }
}
