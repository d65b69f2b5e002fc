use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

/// Access token claims. Tokens are issued by the identity service; this
/// service only verifies them.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    pub sub: String,
    pub role: u8, // role id
    pub exp: usize,
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

#[cfg(test)]
pub fn issue_for_tests(user_id: u64, role: u8, secret: &str) -> String {
    use jsonwebtoken::{EncodingKey, Header, encode};

    let claims = Claims {
        user_id,
        sub: format!("user-{user_id}"),
        role,
        exp: usize::MAX / 2,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_own_tokens_and_rejects_foreign_ones() {
        let token = issue_for_tests(12, 3, "secret");
        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(claims.user_id, 12);
        assert_eq!(claims.role, 3);

        assert!(verify_token(&token, "other").is_err());
    }
}
