use std::sync::Arc;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use chrono::Utc;
use diesel::prelude::*;

use crate::shared::error::AppError;
use crate::shared::schema::customer_sessions;
use crate::shared::state::AppState;

/// Authenticated customer, resolved from a bearer session token.
///
/// Session issuance happens in the OAuth login flow outside this service;
/// here we only look tokens up and enforce expiry.
#[derive(Debug, Clone, Copy)]
pub struct CustomerIdentity {
    pub customer_id: i32,
}

pub(crate) fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CustomerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or(AppError::AuthenticationRequired)?
            .to_string();

        let mut conn = state.conn.get()?;
        let customer_id = customer_sessions::table
            .filter(customer_sessions::token.eq(token))
            .filter(customer_sessions::expires_at.gt(Utc::now()))
            .select(customer_sessions::customer_id)
            .first::<i32>(&mut conn)
            .optional()?
            .ok_or(AppError::AuthenticationRequired)?;

        Ok(CustomerIdentity { customer_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_auth(value: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/support/conversations");
        if let Some(v) = value {
            builder = builder.header(axum::http::header::AUTHORIZATION, v);
        }
        let (parts, ()) = builder.body(()).expect("request").into_parts();
        parts
    }

    #[test]
    fn bearer_token_extracts_value() {
        let parts = parts_with_auth(Some("Bearer abc123"));
        assert_eq!(bearer_token(&parts), Some("abc123"));
    }

    #[test]
    fn missing_header_yields_none() {
        let parts = parts_with_auth(None);
        assert_eq!(bearer_token(&parts), None);
    }

    #[test]
    fn non_bearer_scheme_yields_none() {
        let parts = parts_with_auth(Some("Basic abc123"));
        assert_eq!(bearer_token(&parts), None);
    }
}
