use crate::error::HdbError;
use chrono::{DateTime, Utc};
use rand::RngCore;
use rand::rngs::OsRng;

const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
// Largest multiple of the alphabet size that fits a byte; higher bytes are
// rejected to keep the suffix unbiased.
const ACCEPT_BELOW: u8 = (256 / ALPHANUMERIC.len() * ALPHANUMERIC.len()) as u8;

/// Builds uppercase `v<sep>display<sep>role<sep>random<sep>timestamp` usernames.
#[derive(Debug, Clone)]
pub struct UsernameGenerator {
    pub display_name_len: usize,
    pub role_name_len: usize,
    pub max_length: usize,
    pub separator: char,
    pub random_len: usize,
}

impl Default for UsernameGenerator {
    fn default() -> Self {
        Self::hana()
    }
}

impl UsernameGenerator {
    /// HANA identifiers: up to 127 characters, uppercase.
    pub fn hana() -> Self {
        Self {
            display_name_len: 32,
            role_name_len: 20,
            max_length: 127,
            separator: '_',
            random_len: 20,
        }
    }

    pub fn generate(&self, display_name: &str, role_name: &str) -> Result<String, HdbError> {
        self.generate_with(display_name, role_name, &mut OsRng, Utc::now())
    }

    pub fn generate_with<R: RngCore + ?Sized>(
        &self,
        display_name: &str,
        role_name: &str,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Result<String, HdbError> {
        let suffix = random_alphanumeric(rng, self.random_len)?;
        let timestamp = now.timestamp().to_string();
        let display: String = display_name.chars().take(self.display_name_len).collect();
        let role: String = role_name.chars().take(self.role_name_len).collect();

        let sep = self.separator.to_string();
        let joined = ["v", display.as_str(), role.as_str(), suffix.as_str(), timestamp.as_str()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(&sep);

        let truncated: String = if self.max_length > 0 {
            joined.chars().take(self.max_length).collect()
        } else {
            joined
        };

        Ok(truncated.to_uppercase())
    }
}

fn random_alphanumeric<R: RngCore + ?Sized>(rng: &mut R, len: usize) -> Result<String, HdbError> {
    let mut out = String::with_capacity(len);
    let mut buf = [0u8; 32];
    while out.len() < len {
        rng.try_fill_bytes(&mut buf)
            .map_err(|e| HdbError::Generation(format!("random source unavailable: {e}")))?;
        let remaining = len - out.len();
        out.extend(
            buf.iter()
                .filter(|b| **b < ACCEPT_BELOW)
                .map(|b| ALPHANUMERIC[*b as usize % ALPHANUMERIC.len()] as char)
                .take(remaining),
        );
    }
    Ok(out)
}

/// HANA rejects hyphens in identifiers and strongly prefers uppercase.
pub fn normalize_username(username: &str) -> String {
    username.replace('-', "_").to_uppercase()
}

/// Hyphens are swapped out to satisfy common HANA password policies.
pub fn normalize_password(password: &str) -> String {
    password.replace('-', "_")
}
