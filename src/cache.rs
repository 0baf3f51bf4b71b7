//! Time-boxed, encrypted in-memory credential cache.
//!
//! The sudo password is held only as ChaCha20-Poly1305 ciphertext under a
//! key generated at cache construction. The key never leaves process
//! memory and is regenerated on every start, so nothing useful survives
//! the process.

use std::fmt;
use std::time::{Duration, Instant};

use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use tracing::{debug, warn};
use zeroize::{Zeroize, Zeroizing};

/// How long a cached password stays valid.
pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

/// Callback invoked with the new "is active" state on every transition.
pub type StatusObserver = Box<dyn FnMut(bool)>;

/// Encrypted credential plus the moment it was cached.
///
/// Kept as a single unit inside an `Option` so ciphertext and timestamp
/// are present or absent together.
struct CachedCredential {
    nonce: Nonce,
    ciphertext: Vec<u8>,
    cached_at: Instant,
}

/// In-memory password cache with TTL expiry and a status observer.
pub struct CredentialCache {
    cipher: ChaCha20Poly1305,
    stored: Option<CachedCredential>,
    ttl: Duration,
    observer: Option<StatusObserver>,
}

impl CredentialCache {
    /// Create an empty cache with the default TTL and a fresh key.
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    /// Create an empty cache with a custom TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        let key = ChaCha20Poly1305::generate_key(&mut OsRng);
        Self {
            cipher: ChaCha20Poly1305::new(&key),
            stored: None,
            ttl,
            observer: None,
        }
    }

    /// Register the single status observer, replacing any previous one.
    ///
    /// The observer fires with `true` on [`cache`](Self::cache) and with
    /// `false` on [`clear`](Self::clear) and on expiry detection.
    pub fn set_status_observer(&mut self, observer: StatusObserver) {
        self.observer = Some(observer);
    }

    /// Encrypt and store a password, stamping the current time.
    pub fn cache(&mut self, password: &str) {
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        match self.cipher.encrypt(&nonce, password.as_bytes()) {
            Ok(ciphertext) => {
                self.stored = Some(CachedCredential {
                    nonce,
                    ciphertext,
                    cached_at: Instant::now(),
                });
                debug!("credential cached");
                self.notify(true);
            }
            Err(_) => {
                warn!("credential encryption failed, nothing cached");
                self.clear();
            }
        }
    }

    /// Decrypt and return the cached password, if still valid.
    ///
    /// An expired entry is cleared on detection (the observer fires with
    /// `false` exactly once) and `None` is returned.
    pub fn get(&mut self) -> Option<Zeroizing<String>> {
        let cached_at = self.stored.as_ref()?.cached_at;
        if cached_at.elapsed() > self.ttl {
            debug!("cached credential expired");
            self.clear();
            return None;
        }

        let stored = self.stored.as_ref()?;
        let bytes = match self
            .cipher
            .decrypt(&stored.nonce, stored.ciphertext.as_slice())
        {
            Ok(bytes) => bytes,
            Err(_) => {
                warn!("cached credential failed to decrypt, discarding");
                self.clear();
                return None;
            }
        };

        match String::from_utf8(bytes) {
            Ok(text) => Some(Zeroizing::new(text)),
            Err(err) => {
                let mut bytes = err.into_bytes();
                bytes.zeroize();
                warn!("cached credential is not valid UTF-8, discarding");
                self.clear();
                None
            }
        }
    }

    /// Discard any stored credential and notify the observer.
    ///
    /// Safe to call on an empty cache; the observer still fires with
    /// `false`.
    pub fn clear(&mut self) {
        if let Some(mut stored) = self.stored.take() {
            stored.ciphertext.zeroize();
        }
        self.notify(false);
    }

    /// Whether a credential is stored and within its TTL.
    ///
    /// Non-destructive peek; expiry is only acted on by
    /// [`get`](Self::get).
    pub fn is_active(&self) -> bool {
        self.stored
            .as_ref()
            .is_some_and(|stored| stored.cached_at.elapsed() <= self.ttl)
    }

    fn notify(&mut self, active: bool) {
        if let Some(observer) = self.observer.as_mut() {
            observer(active);
        }
    }
}

impl Default for CredentialCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CredentialCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialCache")
            .field(
                "stored",
                &self.stored.as_ref().map(|_| "[REDACTED]"),
            )
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
