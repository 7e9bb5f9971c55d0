//! Bearer token verification.

use super::{
    errors::{IdentityError, IdentityResult},
    models::{IdentityClaims, VerifiedIdentity},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

/// Audience the auth provider stamps on signed-in users' tokens
pub const DEFAULT_AUDIENCE: &str = "authenticated";

/// Verifies HS256 access tokens against the provider's shared secret
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    /// Create a verifier
    ///
    /// # Arguments
    ///
    /// * `secret` - JWT signing secret shared with the auth provider
    /// * `audience` - Required `aud` claim, or `None` to skip the check
    pub fn new(secret: &str, audience: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        match audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Decode and validate a token into a verified identity
    pub fn verify(&self, token: &str) -> IdentityResult<VerifiedIdentity> {
        let token = token.trim();
        if token.is_empty() {
            return Err(IdentityError::MissingToken);
        }
        let data = decode::<IdentityClaims>(token, &self.key, &self.validation)?;
        VerifiedIdentity::try_from(data.claims)
    }

    /// Verify the value of an `Authorization` header
    pub fn verify_header(&self, header: Option<&str>) -> IdentityResult<VerifiedIdentity> {
        let token = header
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(IdentityError::MissingToken)?;
        self.verify(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::UserMetadata;
    use jsonwebtoken::{EncodingKey, Header, encode};

    const SECRET: &str = "test_secret_key_for_testing_only_32b";

    fn token(secret: &str, aud: &str, exp_offset: i64) -> String {
        let claims = IdentityClaims {
            sub: "auth-123".to_string(),
            email: Some("player@example.com".to_string()),
            aud: Some(aud.to_string()),
            exp: chrono::Utc::now().timestamp() + exp_offset,
            iat: Some(chrono::Utc::now().timestamp()),
            user_metadata: Some(UserMetadata {
                full_name: Some("Player One".to_string()),
            }),
            app_metadata: None,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_token_verifies() {
        let verifier = TokenVerifier::new(SECRET, Some(DEFAULT_AUDIENCE));
        let identity = verifier.verify(&token(SECRET, DEFAULT_AUDIENCE, 3600)).unwrap();
        assert_eq!(identity.auth_id, "auth-123");
        assert_eq!(identity.display_name.as_deref(), Some("Player One"));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let verifier = TokenVerifier::new(SECRET, Some(DEFAULT_AUDIENCE));
        let result = verifier.verify(&token("another_secret_entirely_000000000", DEFAULT_AUDIENCE, 3600));
        assert!(matches!(result, Err(IdentityError::InvalidToken(_))));
    }

    #[test]
    fn test_expired_token_rejected() {
        let verifier = TokenVerifier::new(SECRET, Some(DEFAULT_AUDIENCE));
        let result = verifier.verify(&token(SECRET, DEFAULT_AUDIENCE, -3600));
        assert!(matches!(result, Err(IdentityError::InvalidToken(_))));
    }

    #[test]
    fn test_audience_enforced() {
        let verifier = TokenVerifier::new(SECRET, Some(DEFAULT_AUDIENCE));
        assert!(verifier.verify(&token(SECRET, "anon", 3600)).is_err());

        let lenient = TokenVerifier::new(SECRET, None);
        assert!(lenient.verify(&token(SECRET, "anon", 3600)).is_ok());
    }

    #[test]
    fn test_header_requires_bearer_prefix() {
        let verifier = TokenVerifier::new(SECRET, Some(DEFAULT_AUDIENCE));
        let raw = token(SECRET, DEFAULT_AUDIENCE, 3600);
        assert!(matches!(
            verifier.verify_header(Some(&raw)),
            Err(IdentityError::MissingToken)
        ));
        assert!(matches!(
            verifier.verify_header(None),
            Err(IdentityError::MissingToken)
        ));
        assert!(verifier.verify_header(Some(&format!("Bearer {raw}"))).is_ok());
    }
}
