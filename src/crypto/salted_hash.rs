#[cfg(test)]
use argon2::password_hash::PasswordVerifier;
use argon2::{
    Argon2,
    password_hash::{Error as Argon2Error, PasswordHash, PasswordHasher, SaltString, rand_core::OsRng},
};
use std::fmt::{self, Display, Formatter};

/// Argon2 PHC string of an account password
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaltedHash {
    hash: String,
}

impl SaltedHash {
    pub fn generate_from(password: &str) -> Result<Self, SaltedHashError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)?
            .to_string();

        Ok(Self { hash })
    }
}

#[cfg(test)]
impl SaltedHash {
    pub fn verify_password(&self, password: &str) -> Result<(), SaltedHashError> {
        let parsed_hash = PasswordHash::new(&self.hash)?;
        Argon2::default().verify_password(password.as_bytes(), &parsed_hash)?;
        Ok(())
    }
}

impl TryFrom<String> for SaltedHash {
    type Error = SaltedHashError;

    fn try_from(hash: String) -> Result<Self, Self::Error> {
        PasswordHash::new(&hash)
            .map_err(|e| SaltedHashError::HashParseError(format!("{:?}", e)))?;

        Ok(Self { hash })
    }
}

impl Display for SaltedHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hash)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SaltedHashError {
    #[error("Password hash validation failed")]
    InvalidPassword,
    #[error("Failed to parse password hash {0}")]
    HashParseError(String),
}

impl From<Argon2Error> for SaltedHashError {
    fn from(err: Argon2Error) -> Self {
        match err {
            Argon2Error::Password => SaltedHashError::InvalidPassword,
            _ => SaltedHashError::HashParseError(format!("{:?}", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_verifies_only_original_password() {
        let hash = SaltedHash::generate_from("Secret123!").unwrap();

        assert!(hash.verify_password("Secret123!").is_ok());
        assert!(matches!(
            hash.verify_password("secret123!"),
            Err(SaltedHashError::InvalidPassword)
        ));
    }

    #[test]
    fn test_stored_hash_round_trips_through_string() {
        let hash = SaltedHash::generate_from("Secret123!").unwrap();
        let restored = SaltedHash::try_from(hash.to_string()).unwrap();

        assert_eq!(hash, restored);
        assert!(SaltedHash::try_from("not-a-phc-string".to_string()).is_err());
    }
}
