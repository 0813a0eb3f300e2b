use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use tracing::{debug, warn};
use uuid::Uuid;

use super::claims::{Claims, TokenKind};
use crate::{config::JwtConfig, error::AppError, state::AppState};

/// Verification side of the identity service's tokens.
#[derive(Clone)]
pub struct JwtKeys {
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            secret,
            issuer,
            audience,
        } = state.config.jwt.clone();
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
        }
    }
}

impl JwtKeys {
    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }

    pub fn verify_access(&self, token: &str) -> anyhow::Result<Claims> {
        let claims = self.verify(token)?;
        if claims.kind != TokenKind::Access {
            anyhow::bail!("not an access token");
        }
        Ok(claims)
    }
}

/// The authenticated principal of a request.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or_else(|| AppError::Unauthorized("Invalid Authorization header".into()))?;

        match keys.verify_access(token) {
            Ok(claims) => Ok(AuthUser(claims.sub)),
            Err(e) => {
                warn!(error = %e, "rejected bearer token");
                Err(AppError::Unauthorized("Invalid or expired token".into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use time::{Duration, OffsetDateTime};

    fn token_for(user_id: Uuid, secret: &str, iss: &str, aud: &str, kind: TokenKind) -> String {
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: (now + Duration::minutes(5)).unix_timestamp() as usize,
            iss: iss.into(),
            aud: aud.into(),
            kind,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("encode token")
    }

    #[tokio::test]
    async fn verifies_access_token_from_configured_issuer() {
        let keys = JwtKeys::from_ref(&AppState::fake());
        let user_id = Uuid::new_v4();
        let token =
            token_for(user_id, "test-secret", "test-issuer", "test-aud", TokenKind::Access);

        let claims = keys.verify_access(&token).expect("verify token");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[tokio::test]
    async fn refresh_token_is_not_accepted_as_access() {
        let keys = JwtKeys::from_ref(&AppState::fake());
        let token = token_for(
            Uuid::new_v4(),
            "test-secret",
            "test-issuer",
            "test-aud",
            TokenKind::Refresh,
        );
        let err = keys.verify_access(&token).unwrap_err();
        assert!(err.to_string().contains("not an access token"));
    }

    #[tokio::test]
    async fn rejects_wrong_audience_or_secret() {
        let keys = JwtKeys::from_ref(&AppState::fake());
        let user = Uuid::new_v4();
        let wrong_aud = token_for(user, "test-secret", "test-issuer", "other", TokenKind::Access);
        assert!(keys.verify(&wrong_aud).is_err());

        let wrong_secret = token_for(user, "nope", "test-issuer", "test-aud", TokenKind::Access);
        assert!(keys.verify(&wrong_secret).is_err());
    }

    #[tokio::test]
    async fn extractor_reads_bearer_header() {
        let state = AppState::fake();
        let user_id = Uuid::new_v4();
        let token =
            token_for(user_id, "test-secret", "test-issuer", "test-aud", TokenKind::Access);
        let (mut parts, _) = Request::builder()
            .header("Authorization", format!("Bearer {token}"))
            .body(())
            .unwrap()
            .into_parts();

        let AuthUser(got) = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(got, user_id);
    }

    #[tokio::test]
    async fn extractor_rejects_missing_header() {
        let state = AppState::fake();
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();

        let err = AuthUser::from_request_parts(&mut parts, &state).await.err().unwrap();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }
}
