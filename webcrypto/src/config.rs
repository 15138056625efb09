//! Engine configuration
//!
//! Bounds that are policy rather than algorithm definition live here:
//! - RSA modulus size limits for generation and import
//! - PBKDF2 iteration ceiling
//! - How often long-running derivations poll their abort signal

use crate::error::{CryptoError, CryptoResult};
use std::str::FromStr;

pub const DEFAULT_MIN_RSA_MODULUS_BITS: usize = 1024;
pub const DEFAULT_MAX_RSA_MODULUS_BITS: usize = 16384;
pub const DEFAULT_ABORT_CHECK_INTERVAL: u32 = 1000;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Smallest RSA modulus accepted by generate and import
    pub min_rsa_modulus_bits: usize,

    /// Largest RSA modulus accepted by generate and import
    pub max_rsa_modulus_bits: usize,

    /// Upper bound on PBKDF2 iterations (`None` = unlimited)
    pub max_pbkdf2_iterations: Option<u32>,

    /// PBKDF2 rounds between abort-signal checks
    pub abort_check_interval: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_rsa_modulus_bits: DEFAULT_MIN_RSA_MODULUS_BITS,
            max_rsa_modulus_bits: DEFAULT_MAX_RSA_MODULUS_BITS,
            max_pbkdf2_iterations: None,
            abort_check_interval: DEFAULT_ABORT_CHECK_INTERVAL,
        }
    }
}

fn env_parse<T>(name: &str) -> CryptoResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| CryptoError::Configuration(format!("Invalid {name}: {e}"))),
        Err(_) => Ok(None),
    }
}

impl EngineConfig {
    /// Create a configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> CryptoResult<Self> {
        let mut config = Self::default();

        if let Some(bits) = env_parse("WEBCRYPTO_MIN_RSA_MODULUS_BITS")? {
            config.min_rsa_modulus_bits = bits;
        }
        if let Some(bits) = env_parse("WEBCRYPTO_MAX_RSA_MODULUS_BITS")? {
            config.max_rsa_modulus_bits = bits;
        }
        config.max_pbkdf2_iterations = env_parse("WEBCRYPTO_MAX_PBKDF2_ITERATIONS")?;
        if let Some(interval) = env_parse("WEBCRYPTO_ABORT_CHECK_INTERVAL")? {
            config.abort_check_interval = interval;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> CryptoResult<()> {
        if self.min_rsa_modulus_bits < 512 || self.min_rsa_modulus_bits % 8 != 0 {
            tracing::warn!(bits = self.min_rsa_modulus_bits, "rejecting RSA modulus minimum");
            return Err(CryptoError::Configuration(format!(
                "RSA modulus minimum must be a multiple of 8 and at least 512, got {}",
                self.min_rsa_modulus_bits
            )));
        }

        if self.max_rsa_modulus_bits < self.min_rsa_modulus_bits {
            tracing::warn!(
                min = self.min_rsa_modulus_bits,
                max = self.max_rsa_modulus_bits,
                "rejecting RSA modulus bounds"
            );
            return Err(CryptoError::Configuration(format!(
                "RSA modulus maximum ({}) is below the minimum ({})",
                self.max_rsa_modulus_bits, self.min_rsa_modulus_bits
            )));
        }

        if self.max_pbkdf2_iterations == Some(0) {
            return Err(CryptoError::Configuration(
                "PBKDF2 iteration ceiling must be at least 1".to_string(),
            ));
        }

        if self.abort_check_interval == 0 {
            return Err(CryptoError::Configuration(
                "Abort check interval must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Check whether an RSA modulus length is acceptable.
    pub fn rsa_modulus_allowed(&self, bits: usize) -> bool {
        bits % 8 == 0 && (self.min_rsa_modulus_bits..=self.max_rsa_modulus_bits).contains(&bits)
    }
}
