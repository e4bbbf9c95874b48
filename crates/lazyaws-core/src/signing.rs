//! AWS Signature Version 4.
//!
//! Implements the signing algorithm documented at
//! <https://docs.aws.amazon.com/general/latest/gr/sigv4_signing.html>:
//!
//! 1. Create a canonical request
//! 2. Create the string to sign
//! 3. Calculate the signing key
//! 4. Add the signature to the request (header or query string)
//!
//! Two flavors exist. `Standard` URI-encodes the already encoded path a
//! second time; `S3` signs the path as sent and adds
//! `x-amz-content-sha256`.

use crate::config::is_valid_region;
use crate::credentials::Credentials;
use crate::error::{SdkError, SdkResult};
use crate::http::{Headers, Request};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// The hashing algorithm used by SigV4.
const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Hash of an empty payload.
pub const EMPTY_PAYLOAD_HASH: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// Longest validity accepted for a presigned URL (seven days).
pub const MAX_PRESIGN_EXPIRY: Duration = Duration::from_secs(7 * 24 * 3600);

/// Headers that intermediaries may rewrite; never signed.
const UNSIGNED_HEADERS: &[&str] = &["authorization", "user-agent", "expect", "x-amzn-trace-id"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignerFlavor {
    #[default]
    Standard,
    S3,
}

/// Signs requests for one region/service scope.
#[derive(Debug, Clone)]
pub struct SigV4Signer {
    pub flavor: SignerFlavor,
    pub region: String,
    pub service: String,
}

impl SigV4Signer {
    pub fn new(flavor: SignerFlavor, region: &str, service: &str) -> Self {
        Self {
            flavor,
            region: region.to_string(),
            service: service.to_string(),
        }
    }

    /// Add `x-amz-date`, the session token (if any) and the
    /// `Authorization` header to `request`.
    pub fn sign(
        &self,
        request: &mut Request,
        credentials: &Credentials,
        timestamp: DateTime<Utc>,
    ) -> SdkResult<()> {
        self.check_scope()?;
        let date_stamp = timestamp.format("%Y%m%d").to_string();
        let amz_date = timestamp.format("%Y%m%dT%H%M%SZ").to_string();

        for name in [
            "authorization",
            "x-amz-date",
            "x-amz-security-token",
            "x-amz-content-sha256",
        ] {
            request.headers.remove(name);
        }
        ensure_host(request)?;
        request.headers.insert("x-amz-date", amz_date.clone());

        let payload_hash = sha256_hex_bytes(&request.body);
        if self.flavor == SignerFlavor::S3 {
            request
                .headers
                .insert("x-amz-content-sha256", payload_hash.clone());
        }
        if let Some(ref token) = credentials.session_token {
            request.headers.insert("x-amz-security-token", token.clone());
        }

        let credential_scope = self.credential_scope(&date_stamp);
        let (canonical_headers, signed_headers) = canonical_headers(&request.headers);

        // Step 1: Create canonical request
        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            request.method,
            self.canonical_uri(&request.path),
            canonical_query(&request.query),
            canonical_headers,
            signed_headers,
            payload_hash
        );
        log::trace!("canonical request:\n{}", canonical_request);

        // Steps 2-4
        let signature = self.signature(
            &credentials.secret_access_key,
            &date_stamp,
            &amz_date,
            &credential_scope,
            &canonical_request,
        );

        let authorization = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, credentials.access_key_id, credential_scope, signed_headers, signature
        );
        request.headers.insert("authorization", authorization);
        Ok(())
    }

    /// Move the signature into the query string so the URL alone grants
    /// access until `expires` has elapsed.
    pub fn presign(
        &self,
        request: &mut Request,
        credentials: &Credentials,
        timestamp: DateTime<Utc>,
        expires: Duration,
    ) -> SdkResult<()> {
        self.check_scope()?;
        if expires.as_secs() == 0 || expires > MAX_PRESIGN_EXPIRY {
            return Err(SdkError::signing(format!(
                "presigned URL expiry must be between 1 second and 7 days, got {}s",
                expires.as_secs()
            )));
        }
        let date_stamp = timestamp.format("%Y%m%d").to_string();
        let amz_date = timestamp.format("%Y%m%dT%H%M%SZ").to_string();

        for name in ["authorization", "x-amz-date", "x-amz-security-token", "x-amz-content-sha256"] {
            request.headers.remove(name);
        }
        request.query.retain(|(k, _)| !k.starts_with("X-Amz-"));
        ensure_host(request)?;

        let credential_scope = self.credential_scope(&date_stamp);
        let (canonical_headers, signed_headers) = canonical_headers(&request.headers);

        request
            .query
            .push(("X-Amz-Algorithm".to_string(), ALGORITHM.to_string()));
        request.query.push((
            "X-Amz-Credential".to_string(),
            format!("{}/{}", credentials.access_key_id, credential_scope),
        ));
        request.query.push(("X-Amz-Date".to_string(), amz_date.clone()));
        request
            .query
            .push(("X-Amz-Expires".to_string(), expires.as_secs().to_string()));
        request
            .query
            .push(("X-Amz-SignedHeaders".to_string(), signed_headers.clone()));
        if let Some(ref token) = credentials.session_token {
            request
                .query
                .push(("X-Amz-Security-Token".to_string(), token.clone()));
        }

        let payload_hash = match self.flavor {
            SignerFlavor::S3 => UNSIGNED_PAYLOAD.to_string(),
            SignerFlavor::Standard => sha256_hex_bytes(&request.body),
        };
        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            request.method,
            self.canonical_uri(&request.path),
            canonical_query(&request.query),
            canonical_headers,
            signed_headers,
            payload_hash
        );
        let signature = self.signature(
            &credentials.secret_access_key,
            &date_stamp,
            &amz_date,
            &credential_scope,
            &canonical_request,
        );
        request
            .query
            .push(("X-Amz-Signature".to_string(), signature));
        Ok(())
    }

    fn check_scope(&self) -> SdkResult<()> {
        if !is_valid_region(&self.region) {
            return Err(SdkError::signing(format!(
                "cannot sign for region \"{}\"",
                self.region
            )));
        }
        if self.service.is_empty() {
            return Err(SdkError::signing("signing service name is empty"));
        }
        Ok(())
    }

    fn credential_scope(&self, date_stamp: &str) -> String {
        format!(
            "{}/{}/{}/aws4_request",
            date_stamp, self.region, self.service
        )
    }

    fn canonical_uri(&self, path: &str) -> String {
        if path.is_empty() {
            return "/".to_string();
        }
        match self.flavor {
            SignerFlavor::S3 => path.to_string(),
            SignerFlavor::Standard => uri_encode_path(path),
        }
    }

    /// Steps 2-4: string to sign, signing key, signature.
    fn signature(
        &self,
        secret_access_key: &str,
        date_stamp: &str,
        amz_date: &str,
        credential_scope: &str,
        canonical_request: &str,
    ) -> String {
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            credential_scope,
            sha256_hex(canonical_request)
        );
        let signing_key = self.derive_signing_key(secret_access_key, date_stamp);
        hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()))
    }

    /// kSecret  = "AWS4" + SecretAccessKey
    /// kDate    = HMAC-SHA256(kSecret, Date)
    /// kRegion  = HMAC-SHA256(kDate, Region)
    /// kService = HMAC-SHA256(kRegion, Service)
    /// kSigning = HMAC-SHA256(kService, "aws4_request")
    fn derive_signing_key(&self, secret_access_key: &str, date_stamp: &str) -> Vec<u8> {
        let k_secret = format!("AWS4{}", secret_access_key);
        let k_date = hmac_sha256(k_secret.as_bytes(), date_stamp.as_bytes());
        let k_region = hmac_sha256(&k_date, self.region.as_bytes());
        let k_service = hmac_sha256(&k_region, self.service.as_bytes());
        hmac_sha256(&k_service, b"aws4_request")
    }
}

fn ensure_host(request: &mut Request) -> SdkResult<()> {
    if !request.headers.contains("host") {
        let host = request
            .host()
            .ok_or_else(|| SdkError::signing(format!("request endpoint \"{}\" has no host", request.endpoint)))?;
        request.headers.insert("host", host);
    }
    Ok(())
}

/// Canonical header block and the `SignedHeaders` list. Values are trimmed
/// with inner whitespace runs collapsed; repeated headers join with `,`.
fn canonical_headers(headers: &Headers) -> (String, String) {
    let mut block = String::new();
    let mut names = Vec::new();
    for (name, values) in headers.iter() {
        if UNSIGNED_HEADERS.contains(&name) {
            continue;
        }
        let value = values
            .iter()
            .map(|v| v.split_whitespace().collect::<Vec<_>>().join(" "))
            .collect::<Vec<_>>()
            .join(",");
        block.push_str(name);
        block.push(':');
        block.push_str(&value);
        block.push('\n');
        names.push(name);
    }
    (block, names.join(";"))
}

/// Query pairs encoded and sorted by key, then value.
fn canonical_query(query: &[(String, String)]) -> String {
    let mut pairs: Vec<(String, String)> = query
        .iter()
        .map(|(k, v)| (uri_encode(k), uri_encode(v)))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

// ── Helper functions ────────────────────────────────────────────────────

/// Compute SHA-256 hash and return hex-encoded string.
pub fn sha256_hex(data: &str) -> String {
    sha256_hex_bytes(data.as_bytes())
}

/// Compute SHA-256 hash of bytes and return hex-encoded string.
pub fn sha256_hex_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute HMAC-SHA256.
fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Everything except RFC 3986 unreserved characters.
const AWS_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// URI-encode a string per RFC 3986; `/` is encoded too.
pub fn uri_encode(input: &str) -> String {
    utf8_percent_encode(input, AWS_ENCODE_SET).to_string()
}

/// URI-encode a URL path, preserving forward slashes.
pub fn uri_encode_path(path: &str) -> String {
    path.split('/')
        .map(uri_encode)
        .collect::<Vec<String>>()
        .join("/")
}
