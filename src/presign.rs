//! Presigned upload URL assembly.
//!
//! Turns an [`UploadTarget`] and an object key into the pair of URLs the
//! API hands back: a SigV4 presigned `PUT` URL and the unsigned public URL
//! the object will live at once uploaded.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::sigv4::{self, SigningContext, SigningError, SigningRequest, X_AMZ_SIGNATURE};

/// HTTP method every presigned URL is issued for.
pub const UPLOAD_METHOD: &str = "PUT";

/// URL scheme of the storage endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn from_tls(use_tls: bool) -> Self {
        if use_tls {
            Scheme::Https
        } else {
            Scheme::Http
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

/// Storage endpoint: scheme, host, optional explicit port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub scheme: Scheme,
    pub host: String,
    pub port: Option<u16>,
}

impl Endpoint {
    /// `host` or `host:port`. The port is dropped when it is the scheme's
    /// default, matching what clients send in the `Host` header.
    pub fn authority(&self) -> String {
        match self.port {
            Some(port) if port != self.scheme.default_port() => format!("{}:{port}", self.host),
            _ => self.host.clone(),
        }
    }

    /// `scheme://authority`
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme.as_str(), self.authority())
    }
}

/// Everything needed to sign uploads into one bucket.
#[derive(Clone)]
pub struct UploadTarget {
    pub endpoint: Endpoint,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Validity window of issued URLs, in seconds.
    pub expires_in: u64,
}

impl fmt::Debug for UploadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadTarget")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("region", &self.region)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

impl UploadTarget {
    /// `/{bucket}/{encoded key}`, with `/` inside the key left as-is.
    pub fn canonical_uri(&self, key: &str) -> String {
        format!("/{}/{}", self.bucket, sigv4::uri_encode_path(key))
    }

    /// Unsigned URL of the object after upload.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}{}", self.endpoint.base_url(), self.canonical_uri(key))
    }
}

/// Response body of a successful presign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PresignedUpload {
    /// Presigned `PUT` URL; valid for the configured window.
    pub upload_url: String,
    /// URL the object is reachable at once uploaded (subject to bucket ACL).
    pub public_url: String,
}

/// Presign a `PUT` of `key` into `target`.
///
/// `now` is the single reference instant for this request: it becomes
/// `X-Amz-Date`, the credential date, and the start of the expiry window.
pub fn presign_put(
    target: &UploadTarget,
    key: &str,
    now: DateTime<Utc>,
) -> Result<PresignedUpload, SigningError> {
    let ctx = SigningContext::new(&target.access_key, &target.secret_key, &target.region, now);

    let canonical_uri = target.canonical_uri(key);
    let request = SigningRequest::new(UPLOAD_METHOD, canonical_uri)
        .with_header("host", target.endpoint.authority());
    let request = ctx.presign_params(request, target.expires_in);

    let signature = sigv4::sign(&ctx, &request)?;

    let upload_url = format!(
        "{}{}?{}&{X_AMZ_SIGNATURE}={signature}",
        target.endpoint.base_url(),
        request.canonical_uri(),
        request.canonical_query_string(),
    );

    Ok(PresignedUpload {
        upload_url,
        public_url: target.public_url(key),
    })
}
