use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::errors::{AppError, Result};
use crate::models::auth::{AuthContext, Claims};
use crate::state::AppState;

pub fn decode_context(token: &str, secret: &str) -> Result<AuthContext> {
    let decoding_key = DecodingKey::from_secret(secret.as_ref());
    let token_data = decode::<Claims>(token, &decoding_key, &Validation::new(Algorithm::HS256))
        .map_err(|_| AppError::AuthError)?;
    AuthContext::try_from(token_data.claims)
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let token = headers
        .get("authorization")
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .ok_or(AppError::AuthError)?;

    let ctx = decode_context(token, &state.settings.jwt_secret)?;

    // Insert the caller into request extensions
    request.extensions_mut().insert(ctx);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::Role;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use mongodb::bson::oid::ObjectId;

    fn token(sub: &str, secret: &str) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            role: Role::Driver,
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_ref())).unwrap()
    }

    #[test]
    fn decodes_valid_token() {
        let id = ObjectId::new();
        let ctx = decode_context(&token(&id.to_hex(), "s3cret"), "s3cret").unwrap();
        assert_eq!(ctx.user_id, id);
        assert_eq!(ctx.role, Role::Driver);
    }

    #[test]
    fn rejects_wrong_secret_and_bad_subject() {
        let id = ObjectId::new();
        assert!(matches!(
            decode_context(&token(&id.to_hex(), "s3cret"), "other"),
            Err(AppError::AuthError)
        ));
        assert!(matches!(
            decode_context(&token("not-an-id", "s3cret"), "s3cret"),
            Err(AppError::AuthError)
        ));
    }
}
