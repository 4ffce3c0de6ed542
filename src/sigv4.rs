//! AWS Signature Version 4 signing for presigned URLs.
//!
//! Produces query-string signatures that an S3-compatible server verifies
//! without the caller ever holding the secret key. The algorithm:
//! 1. Build a canonical request
//! 2. Build a string-to-sign
//! 3. Derive a signing key via HMAC chain
//! 4. Compute the signature
//!
//! Everything here is pure: no clock reads, no environment access. Callers
//! capture one instant per request and hand it in through [`SigningContext`].

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::{Digest, Sha256};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Signing algorithm identifier.
pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Service name in the credential scope.
pub const SERVICE: &str = "s3";

/// Final element of every credential scope.
pub const SCOPE_TERMINATOR: &str = "aws4_request";

/// Payload hash placeholder for presigned requests.
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// `X-Amz-Date` layout.
pub const AMZ_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Credential-scope date layout.
pub const DATE_STAMP_FORMAT: &str = "%Y%m%d";

/// Query parameter names used by query-string authentication.
pub const X_AMZ_ALGORITHM: &str = "X-Amz-Algorithm";
pub const X_AMZ_CREDENTIAL: &str = "X-Amz-Credential";
pub const X_AMZ_DATE: &str = "X-Amz-Date";
pub const X_AMZ_EXPIRES: &str = "X-Amz-Expires";
pub const X_AMZ_SIGNED_HEADERS: &str = "X-Amz-SignedHeaders";
pub const X_AMZ_SIGNATURE: &str = "X-Amz-Signature";

/// RFC 3986 unreserved characters pass through; everything else is encoded.
const URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Same as [`URI_ENCODE_SET`] but leaves `/` alone (object key paths).
const PATH_ENCODE_SET: &AsciiSet = &URI_ENCODE_SET.remove(b'/');

/// Failure inside a cryptographic primitive.
#[derive(Debug, Error)]
pub enum SigningError {
    /// The MAC implementation rejected the key.
    #[error("invalid HMAC key: {0}")]
    InvalidKey(String),
}

// ── Hash primitives ─────────────────────────────────────────────────

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Compute HMAC-SHA256.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, SigningError> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| SigningError::InvalidKey(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

// ── Signing key derivation ──────────────────────────────────────────

/// Scoped signing key. Lives for one request and is never printed.
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

/// Derive the signing key for a given date, region, and service.
///
/// ```text
/// kDate    = HMAC-SHA256("AWS4" + secret, dateStamp)
/// kRegion  = HMAC-SHA256(kDate, region)
/// kService = HMAC-SHA256(kRegion, service)
/// kSigning = HMAC-SHA256(kService, "aws4_request")
/// ```
pub fn derive_signing_key(
    secret_key: &str,
    date_stamp: &str,
    region: &str,
    service: &str,
) -> Result<SigningKey, SigningError> {
    let k_secret = format!("AWS4{secret_key}");
    let k_date = hmac_sha256(k_secret.as_bytes(), date_stamp.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    let k_signing = hmac_sha256(&k_service, SCOPE_TERMINATOR.as_bytes())?;
    Ok(SigningKey(k_signing))
}

// ── URI encoding ────────────────────────────────────────────────────

/// SigV4 URI encoding for query keys and values: `/` becomes `%2F`.
pub fn uri_encode(input: &str) -> String {
    utf8_percent_encode(input, URI_ENCODE_SET).to_string()
}

/// SigV4 URI encoding for paths: `/` separators are kept.
pub fn uri_encode_path(input: &str) -> String {
    utf8_percent_encode(input, PATH_ENCODE_SET).to_string()
}

// ── Canonical request construction ──────────────────────────────────

/// Build the canonical query string.
///
/// Parameters are ordered by raw name (the map's byte order), then each
/// name and value is encoded independently and joined with `=` and `&`.
pub fn canonical_query_string(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", uri_encode(k), uri_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// One `name:value\n` line per header, sorted by lowercase name.
pub fn canonical_headers(headers: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (name, value) in headers {
        out.push_str(name);
        out.push(':');
        out.push_str(value.trim());
        out.push('\n');
    }
    out
}

/// Semicolon-joined, sorted, lowercase header names.
pub fn signed_headers(headers: &BTreeMap<String, String>) -> String {
    headers.keys().cloned().collect::<Vec<_>>().join(";")
}

/// The request being signed.
#[derive(Debug, Clone)]
pub struct SigningRequest {
    method: String,
    canonical_uri: String,
    query: BTreeMap<String, String>,
    headers: BTreeMap<String, String>,
}

impl SigningRequest {
    /// `canonical_uri` must already be encoded (see [`uri_encode_path`]).
    pub fn new(method: impl Into<String>, canonical_uri: impl Into<String>) -> Self {
        let canonical_uri = canonical_uri.into();
        Self {
            method: method.into(),
            canonical_uri: if canonical_uri.is_empty() {
                "/".to_string()
            } else {
                canonical_uri
            },
            query: BTreeMap::new(),
            headers: BTreeMap::new(),
        }
    }

    /// Add a header. Names are stored lowercase; a repeated name replaces.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Add a query parameter. A repeated name replaces the earlier value.
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn canonical_uri(&self) -> &str {
        &self.canonical_uri
    }

    pub fn query(&self) -> &BTreeMap<String, String> {
        &self.query
    }

    pub fn canonical_query_string(&self) -> String {
        canonical_query_string(&self.query)
    }

    pub fn signed_headers(&self) -> String {
        signed_headers(&self.headers)
    }

    /// Build the canonical request string.
    ///
    /// ```text
    /// HTTPMethod + '\n' +
    /// CanonicalURI + '\n' +
    /// CanonicalQueryString + '\n' +
    /// CanonicalHeaders + '\n' +
    /// SignedHeaders + '\n' +
    /// UNSIGNED-PAYLOAD
    /// ```
    pub fn canonical_request(&self) -> String {
        format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            self.method,
            self.canonical_uri,
            self.canonical_query_string(),
            canonical_headers(&self.headers),
            self.signed_headers(),
            UNSIGNED_PAYLOAD
        )
    }
}

// ── Signing context ─────────────────────────────────────────────────

/// Credentials and scope for one signing operation.
///
/// The date stamp and timestamp are both rendered from the same instant, so
/// the date stamp is always the date prefix of the timestamp.
#[derive(Clone)]
pub struct SigningContext {
    access_key: String,
    secret_key: String,
    region: String,
    date_stamp: String,
    timestamp: String,
}

impl SigningContext {
    pub fn new(access_key: &str, secret_key: &str, region: &str, at: DateTime<Utc>) -> Self {
        Self {
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
            region: region.to_string(),
            date_stamp: at.format(DATE_STAMP_FORMAT).to_string(),
            timestamp: at.format(AMZ_DATE_FORMAT).to_string(),
        }
    }

    pub fn date_stamp(&self) -> &str {
        &self.date_stamp
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// `dateStamp/region/service/aws4_request`
    pub fn credential_scope(&self) -> String {
        format!(
            "{}/{}/{SERVICE}/{SCOPE_TERMINATOR}",
            self.date_stamp, self.region
        )
    }

    /// `accessKey/credentialScope`, the `X-Amz-Credential` value.
    pub fn credential(&self) -> String {
        format!("{}/{}", self.access_key, self.credential_scope())
    }

    pub fn signing_key(&self) -> Result<SigningKey, SigningError> {
        derive_signing_key(&self.secret_key, &self.date_stamp, &self.region, SERVICE)
    }

    /// Attach the query-string authentication parameters to `request`.
    ///
    /// `X-Amz-SignedHeaders` is taken from the request's own headers, so the
    /// headers must be added before calling this.
    pub fn presign_params(&self, request: SigningRequest, expires_in: u64) -> SigningRequest {
        let signed = request.signed_headers();
        request
            .with_query(X_AMZ_ALGORITHM, ALGORITHM)
            .with_query(X_AMZ_CREDENTIAL, self.credential())
            .with_query(X_AMZ_DATE, self.timestamp.clone())
            .with_query(X_AMZ_EXPIRES, expires_in.to_string())
            .with_query(X_AMZ_SIGNED_HEADERS, signed)
    }
}

impl fmt::Debug for SigningContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningContext")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("region", &self.region)
            .field("date_stamp", &self.date_stamp)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

// ── String to sign ──────────────────────────────────────────────────

/// Build the string to sign.
///
/// ```text
/// AWS4-HMAC-SHA256 + '\n' +
/// Timestamp + '\n' +
/// CredentialScope + '\n' +
/// HexEncode(SHA256(CanonicalRequest))
/// ```
pub fn build_string_to_sign(
    timestamp: &str,
    credential_scope: &str,
    canonical_request: &str,
) -> String {
    let hash = sha256_hex(canonical_request.as_bytes());
    format!("{ALGORITHM}\n{timestamp}\n{credential_scope}\n{hash}")
}

// ── Signature computation ───────────────────────────────────────────

/// Compute the signature: HexEncode(HMAC-SHA256(SigningKey, StringToSign)).
pub fn compute_signature(
    signing_key: &SigningKey,
    string_to_sign: &str,
) -> Result<String, SigningError> {
    let sig = hmac_sha256(signing_key.as_bytes(), string_to_sign.as_bytes())?;
    Ok(hex::encode(sig))
}

/// Sign `request` under `ctx` and return the lowercase hex signature.
pub fn sign(ctx: &SigningContext, request: &SigningRequest) -> Result<String, SigningError> {
    let string_to_sign = build_string_to_sign(
        ctx.timestamp(),
        &ctx.credential_scope(),
        &request.canonical_request(),
    );
    let signing_key = ctx.signing_key()?;
    compute_signature(&signing_key, &string_to_sign)
}

// ── Tests ───────────────────────────────────────────────────────────
