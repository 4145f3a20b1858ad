use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use rand::Rng;

use crate::error::{Error, Result};

const ARGON2_MEMORY: u32 = 64 * 1024; // 64KB
const ARGON2_ITERATIONS: u32 = 1;
const ARGON2_PARALLELISM: u32 = 4;
const ARGON2_OUTPUT_LEN: usize = 32;

const LOOKUP_LENGTH: usize = 8;
const SECRET_BYTES: usize = 16;

/// A freshly generated archive secret, before it is stored.
#[derive(Debug, Clone)]
pub struct GeneratedToken {
    pub raw: String,
    pub lookup: String,
    pub hash: String,
}

/// Issues and checks archive access secrets of the form
/// `<prefix>_<lookup>_<secret>`.
pub struct TokenGenerator {
    argon2: Argon2<'static>,
    prefix: String,
}

impl TokenGenerator {
    pub fn new(prefix: impl Into<String>) -> Result<Self> {
        let params = Params::new(
            ARGON2_MEMORY,
            ARGON2_ITERATIONS,
            ARGON2_PARALLELISM,
            Some(ARGON2_OUTPUT_LEN),
        )
        .map_err(|e| Error::Config(format!("invalid argon2 params: {e}")))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            prefix: prefix.into(),
        })
    }

    pub fn generate(&self) -> Result<GeneratedToken> {
        let lookup = generate_lookup();
        let raw = format!("{}_{lookup}_{}", self.prefix, generate_secret());
        let hash = self.hash(&raw)?;
        Ok(GeneratedToken { raw, lookup, hash })
    }

    /// Hashes a raw token using Argon2id
    pub fn hash(&self, token: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(token.as_bytes(), &salt)
            .map_err(|e| Error::Config(format!("failed to hash token: {e}")))?;
        Ok(hash.to_string())
    }

    /// Verifies a raw token against a stored hash
    pub fn verify(&self, token: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| Error::Corrupt(format!("invalid hash format: {e}")))?;

        match self.argon2.verify_password(token.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::Config(format!("failed to verify token: {e}"))),
        }
    }

    /// Splits a raw token into (lookup, secret), rejecting foreign prefixes.
    pub fn parse(&self, token: &str) -> Result<(String, String)> {
        let rest = token
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('_'))
            .ok_or(Error::InvalidTokenFormat)?;

        let (lookup, secret) = rest.split_once('_').ok_or(Error::InvalidTokenFormat)?;
        if lookup.len() != LOOKUP_LENGTH || secret.len() != SECRET_BYTES * 2 {
            return Err(Error::InvalidTokenFormat);
        }

        Ok((lookup.to_string(), secret.to_string()))
    }
}

/// First 8 chars of a UUID.
fn generate_lookup() -> String {
    let uuid = uuid::Uuid::new_v4();
    uuid.simple().to_string()[..LOOKUP_LENGTH].to_string()
}

fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Random secret handed to the build farm for private archives.
#[must_use]
pub fn generate_build_secret() -> String {
    generate_secret()
}
