//! Issues attendance tokens: 256 random bits, URL-safe base64, bounded lifetime.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Duration;
use rand::{rngs::OsRng, RngCore};
use std::sync::Arc;

use crate::error::{SessionError, SessionResult};
use crate::models::session::Token;
use crate::types::SessionId;
use crate::utils::time::Clock;

const TOKEN_BYTES: usize = 32;

#[derive(Clone)]
pub struct TokenIssuer {
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Builds a fresh token for `session_id` expiring `ttl` from now.
    ///
    /// Pure construction; installing the token on the session is the
    /// registry's job.
    pub fn issue(&self, session_id: SessionId, ttl: Duration) -> SessionResult<Token> {
        if ttl <= Duration::zero() {
            return Err(SessionError::Validation(
                "token lifetime must be positive".into(),
            ));
        }
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let expires_at = self.clock.now() + ttl;
        tracing::debug!(%session_id, %expires_at, "issued attendance token");
        Ok(Token {
            value: URL_SAFE_NO_PAD.encode(bytes),
            session_id,
            expires_at,
        })
    }
}
