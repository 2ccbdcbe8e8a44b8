use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use crate::claims::{ClaimSet, TokenClaims, TokenError, validate_lifetime};
use crate::config::SigningConfig;
use crate::error::AuthError;

/// Validates bearer tokens presented on incoming requests.
pub trait TokenValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<ClaimSet, TokenError>;
}

/// HS256 JWT issuer/validator bound to one [`SigningConfig`].
pub struct Hs256TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    lifetime: Duration,
}

impl Hs256TokenCodec {
    pub fn new(config: &SigningConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[config.issuer()]);
        validation.set_audience(&[config.audience()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        // Lifetime is checked by `validate_lifetime` against the caller's clock.
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(config.key()),
            decoding_key: DecodingKey::from_secret(config.key()),
            validation,
            issuer: config.issuer().to_string(),
            audience: config.audience().to_string(),
            lifetime: config.lifetime(),
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    pub fn issue(&self, claims: &ClaimSet) -> Result<String, AuthError> {
        let wire = claims.to_wire(&self.issuer, &self.audience);
        encode(&Header::new(Algorithm::HS256), &wire, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }
}

impl TokenValidator for Hs256TokenCodec {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<ClaimSet, TokenError> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(map_jwt_error)?;
        let claims = ClaimSet::from_wire(data.claims)?;
        validate_lifetime(&claims, now)?;
        Ok(claims)
    }
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::InvalidSignature => TokenError::BadSignature,
        ErrorKind::InvalidIssuer | ErrorKind::InvalidAudience => TokenError::IssuerMismatch,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::ImmatureSignature => TokenError::NotYetValid,
        other => TokenError::Malformed(format!("{other:?}")),
    }
}
