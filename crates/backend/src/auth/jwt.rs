//! Identity token validation.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use super::types::{AuthConfig, Claims};

/// Validate an identity token and return its claims.
///
/// Tokens are HS256-signed with the client secret and must name the client
/// id as audience. Expiry is enforced; the issued-at time is not checked.
pub fn decode_id_token(
    config: &AuthConfig,
    token: &str,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[config.client_id.as_str()]);

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.client_secret.as_bytes()),
        &validation,
    )?;

    Ok(token_data.claims)
}

#[cfg(test)]
pub(crate) fn sign_test_token(secret: &str, claims: &serde_json::Value) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("should sign token")
}
