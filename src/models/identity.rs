//! Verified caller identity handed over by the authentication collaborator

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;

/// Caller role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Borrower,
    Staff,
    Admin,
}

/// JWT claims. `sub` is the borrower id for borrowers and the staff login otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn is_staff(&self) -> bool {
        matches!(self.role, Role::Staff | Role::Admin)
    }

    /// Require a staff or admin identity
    pub fn require_staff(&self) -> Result<(), AppError> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(AppError::Authorization("Staff privileges required".to_string()))
        }
    }

    /// Borrowers may only act on their own record
    pub fn require_self_or_staff(&self, borrower_id: &str) -> Result<(), AppError> {
        if self.is_staff() || self.sub == borrower_id {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "Cannot access another borrower's record".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn claims(sub: &str, role: Role) -> UserClaims {
        let now = Utc::now();
        UserClaims {
            sub: sub.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        }
    }

    #[test]
    fn token_round_trips_with_same_secret() {
        let token = claims("S1", Role::Borrower).create_token("secret").unwrap();
        let parsed = UserClaims::from_token(&token, "secret").unwrap();
        assert_eq!(parsed.sub, "S1");
        assert_eq!(parsed.role, Role::Borrower);

        assert!(UserClaims::from_token(&token, "other").is_err());
    }

    #[test]
    fn borrower_is_limited_to_own_record() {
        let reader = claims("S1", Role::Borrower);
        assert!(reader.require_staff().is_err());
        assert!(reader.require_self_or_staff("S1").is_ok());
        assert!(reader.require_self_or_staff("S2").is_err());

        let librarian = claims("desk", Role::Staff);
        assert!(librarian.require_staff().is_ok());
        assert!(librarian.require_self_or_staff("S2").is_ok());
    }
}
