//! Signed token encoding and validation.
//!
//! Tokens are compact JWS strings. The signing algorithm is fixed by the token
//! kind: access tokens use HS256, refresh tokens use HS512. A token verified
//! as the wrong kind fails on the algorithm check.
//!
//! Payload claims: `sub`, `iss`, `iat`, `exp` (unix seconds) and `scopes`, the
//! comma-joined scope list.

use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::auth::scope::{join_scopes, parse_scopes};
use crate::config::TokenConfig;
use crate::types::{EncodedToken, Username};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            Self::Access => Algorithm::HS256,
            Self::Refresh => Algorithm::HS512,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "ACCESS",
            Self::Refresh => "REFRESH",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token codec errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Nothing to verify
    Empty,
    /// `exp` has been reached
    Expired,
    /// Unparsable, bad signature, wrong algorithm, or required claims missing
    Malformed(String),
    /// Claims refused before signing
    InvalidClaims(String),
    /// The signing backend failed
    Signing(String),
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Token is empty"),
            Self::Expired => write!(f, "Token has expired"),
            Self::Malformed(msg) => write!(f, "Malformed token: {}", msg),
            Self::InvalidClaims(msg) => write!(f, "Invalid token claims: {}", msg),
            Self::Signing(msg) => write!(f, "Token signing failed: {}", msg),
        }
    }
}

impl std::error::Error for TokenError {}

/// Decoded contents of a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub subject: Username,
    pub issuer: String,
    /// Unix seconds
    pub issued_at: i64,
    /// Unix seconds
    pub expires_at: i64,
    pub kind: TokenKind,
    /// Scope names in grant order
    pub scopes: Vec<String>,
}

impl TokenClaims {
    pub fn new(
        kind: TokenKind,
        subject: Username,
        issuer: impl Into<String>,
        scopes: Vec<String>,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            subject,
            issuer: issuer.into(),
            issued_at: issued_at.timestamp(),
            expires_at: (issued_at + ttl).timestamp(),
            kind,
            scopes,
        }
    }

    /// The same claims, relabelled as another kind.
    pub fn with_kind(mut self, kind: TokenKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn issued_at_utc(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.issued_at, 0).unwrap_or_default()
    }

    pub fn expires_at_utc(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.expires_at, 0).unwrap_or_default()
    }

    fn check_signable(&self) -> Result<(), TokenError> {
        if self.subject.as_str().is_empty() {
            return Err(TokenError::InvalidClaims("subject is empty".to_string()));
        }
        if self.issuer.is_empty() {
            return Err(TokenError::InvalidClaims("issuer is empty".to_string()));
        }
        if self.expires_at <= self.issued_at {
            return Err(TokenError::InvalidClaims(
                "expiration must be after issued-at".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct OutgoingClaims<'a> {
    sub: &'a str,
    iss: &'a str,
    iat: i64,
    exp: i64,
    scopes: String,
}

#[derive(Debug, Deserialize)]
struct IncomingClaims {
    sub: Option<String>,
    #[serde(default)]
    iss: String,
    #[serde(default)]
    iat: i64,
    exp: i64,
    scopes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExpiryPeek {
    exp: Option<i64>,
}

fn now_seconds() -> i64 {
    Utc::now().timestamp()
}

/// Read `exp` from the payload segment without checking the signature.
fn peek_expiry(token: &str) -> Option<i64> {
    let mut segments = token.split('.');
    let (_, payload, _) = (segments.next()?, segments.next()?, segments.next()?);
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice::<ExpiryPeek>(&bytes).ok()?.exp
}

fn encode_claims(claims: &TokenClaims, key: &EncodingKey) -> Result<EncodedToken, TokenError> {
    claims.check_signable()?;

    let payload = OutgoingClaims {
        sub: claims.subject.as_str(),
        iss: &claims.issuer,
        iat: claims.issued_at,
        exp: claims.expires_at,
        scopes: join_scopes(&claims.scopes),
    };

    encode(&Header::new(claims.kind.algorithm()), &payload, key)
        .map(EncodedToken::new)
        .map_err(|e| TokenError::Signing(e.to_string()))
}

fn decode_claims(
    token: &str,
    kind: TokenKind,
    key: &DecodingKey,
) -> Result<TokenClaims, TokenError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(TokenError::Empty);
    }

    // Expiry wins over every other failure.
    if let Some(exp) = peek_expiry(token)
        && now_seconds() >= exp
    {
        return Err(TokenError::Expired);
    }

    let mut validation = Validation::new(kind.algorithm());
    validation.leeway = 0;
    validation.validate_exp = true;
    validation.validate_aud = false;
    validation.set_required_spec_claims(&["exp", "sub"]);

    let data = decode::<IncomingClaims>(token, key, &validation).map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Malformed(e.to_string()),
    })?;
    let incoming = data.claims;

    let subject = incoming
        .sub
        .filter(|sub| !sub.is_empty())
        .ok_or_else(|| TokenError::Malformed("missing subject".to_string()))?;
    let scopes = incoming
        .scopes
        .ok_or_else(|| TokenError::Malformed("missing scopes".to_string()))?;

    Ok(TokenClaims {
        subject: Username::new(subject),
        issuer: incoming.iss,
        issued_at: incoming.iat,
        expires_at: incoming.exp,
        kind,
        scopes: parse_scopes(&scopes),
    })
}

/// Sign `claims` with `secret`, using the algorithm of `claims.kind`.
pub fn sign(claims: &TokenClaims, secret: &[u8]) -> Result<EncodedToken, TokenError> {
    encode_claims(claims, &EncodingKey::from_secret(secret))
}

/// Verify a token of the given kind against `secret` and return its claims.
pub fn verify(token: &str, kind: TokenKind, secret: &[u8]) -> Result<TokenClaims, TokenError> {
    decode_claims(token, kind, &DecodingKey::from_secret(secret))
}

/// Upper bound on a configured lifetime (ten years).
const MAX_TTL_SECONDS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Clone)]
struct KindKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl KindKeys {
    fn new(secret: &str, ttl_seconds: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::seconds(ttl_seconds.min(MAX_TTL_SECONDS) as i64),
        }
    }
}

/// Issues and verifies both token kinds with the configured secrets.
///
/// Cheap to clone and safe to share across requests; it holds no mutable state.
#[derive(Clone)]
pub struct TokenCodec {
    issuer: String,
    access: KindKeys,
    refresh: KindKeys,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("issuer", &self.issuer)
            .field("access_ttl", &self.access.ttl)
            .field("refresh_ttl", &self.refresh.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(config: &TokenConfig) -> Self {
        Self {
            issuer: config.issuer.clone(),
            access: KindKeys::new(&config.access_secret, config.access_ttl_seconds),
            refresh: KindKeys::new(&config.refresh_secret, config.refresh_ttl_seconds),
        }
    }

    fn keys(&self, kind: TokenKind) -> &KindKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn ttl(&self, kind: TokenKind) -> Duration {
        self.keys(kind).ttl
    }

    /// Fresh claims for `subject`, valid from `now` for the kind's lifetime.
    pub fn claims_for(
        &self,
        kind: TokenKind,
        subject: Username,
        scopes: Vec<String>,
        now: DateTime<Utc>,
    ) -> TokenClaims {
        TokenClaims::new(kind, subject, self.issuer.clone(), scopes, now, self.ttl(kind))
    }

    pub fn sign(&self, claims: &TokenClaims) -> Result<EncodedToken, TokenError> {
        encode_claims(claims, &self.keys(claims.kind).encoding)
    }

    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<TokenClaims, TokenError> {
        decode_claims(token, kind, &self.keys(kind).decoding)
    }

    /// Build claims valid from now and sign them.
    pub fn issue(
        &self,
        kind: TokenKind,
        subject: Username,
        scopes: Vec<String>,
    ) -> Result<(TokenClaims, EncodedToken), TokenError> {
        let claims = self.claims_for(kind, subject, scopes, Utc::now());
        let token = self.sign(&claims)?;
        Ok((claims, token))
    }
}
