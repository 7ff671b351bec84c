use crate::application_port::*;
use crate::domain_model::{ClientId, Subject};
use crate::settings;
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use std::collections::HashMap;

/// Identities loaded from settings. Secrets are argon2-hashed once at startup
/// and the plaintext is dropped.
#[derive(Debug)]
pub struct StaticIdentityService {
    users: HashMap<String, String>,
    clients: HashMap<String, String>,
    // Verified against when the name is unknown, so both paths cost the same.
    decoy: String,
}

impl StaticIdentityService {
    pub fn try_new(identity: &settings::Identity) -> Result<Self, IdentityError> {
        let mut users = HashMap::with_capacity(identity.users.len());
        for entry in &identity.users {
            users.insert(entry.username.to_lowercase(), hash_secret(&entry.password)?);
        }
        let mut clients = HashMap::with_capacity(identity.clients.len());
        for entry in &identity.clients {
            clients.insert(entry.client_id.clone(), hash_secret(&entry.client_secret)?);
        }
        Ok(Self {
            users,
            clients,
            decoy: hash_secret("decoy")?,
        })
    }

    fn check(&self, stored: Option<&String>, secret: &str) -> Result<bool, IdentityError> {
        match stored {
            Some(hash) => verify_secret(secret, hash),
            None => {
                verify_secret(secret, &self.decoy)?;
                Ok(false)
            }
        }
    }
}

fn hash_secret(secret: &str) -> Result<String, IdentityError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|e| IdentityError::InternalError(e.to_string()))?
        .to_string();
    Ok(hash)
}

fn verify_secret(secret: &str, secret_hash: &str) -> Result<bool, IdentityError> {
    let parsed = PasswordHash::new(secret_hash)
        .map_err(|e| IdentityError::InternalError(format!("invalid PHC hash: {}", e)))?;

    match Argon2::default().verify_password(secret.as_bytes(), &parsed) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(IdentityError::InternalError(format!("verify error: {}", e))),
    }
}

#[async_trait::async_trait]
impl IdentityService for StaticIdentityService {
    async fn verify_password(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Subject, IdentityError> {
        let username = username.to_lowercase();
        if self.check(self.users.get(&username), password)? {
            Ok(Subject(username))
        } else {
            Err(IdentityError::InvalidCredentials)
        }
    }

    async fn verify_client(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<ClientId, IdentityError> {
        if self.check(self.clients.get(client_id), client_secret)? {
            Ok(ClientId(client_id.to_string()))
        } else {
            Err(IdentityError::InvalidClient)
        }
    }
}
