//! AWS Signature Version 4 header signing.
//!
//! Used by the video upload path: session calls on the API are signed for
//! `execute-api`, part uploads for `s3`. Presigned part URLs already carry
//! their signature in the query string and are sent unsigned.

use hmac::{Hmac, Mac};
use jiff::Timestamp;
use reqwest::Url;
use sha2::{Digest, Sha256};

use crate::config::AwsCredentials;
use crate::error::{Error, Result};

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

pub const API_SERVICE: &str = "execute-api";
pub const STORAGE_SERVICE: &str = "s3";

#[derive(Clone)]
pub struct RequestSigner {
    credentials: AwsCredentials,
}

impl RequestSigner {
    pub fn new(credentials: AwsCredentials) -> Self {
        Self { credentials }
    }

    /// Headers to attach to the request, `authorization` included.
    pub fn sign(
        &self,
        method: &str,
        url: &Url,
        payload: &[u8],
        service: &str,
        now: Timestamp,
    ) -> Result<Vec<(&'static str, String)>> {
        let amz_date = now.strftime("%Y%m%dT%H%M%SZ").to_string();
        let date = now.strftime("%Y%m%d").to_string();
        let payload_hash = hex::encode(Sha256::digest(payload));

        let mut headers: Vec<(&'static str, String)> = vec![
            ("host", host_header(url)?),
            ("x-amz-content-sha256", payload_hash.clone()),
            ("x-amz-date", amz_date.clone()),
        ];
        if let Some(token) = &self.credentials.session_token {
            headers.push(("x-amz-security-token", token.clone()));
        }
        // already lowercase; the canonical form wants them sorted
        headers.sort_by(|a, b| a.0.cmp(b.0));

        let signed_headers = headers
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(";");
        let canonical_headers: String = headers
            .iter()
            .map(|(name, value)| format!("{name}:{}\n", value.trim()))
            .collect();

        let canonical_request = format!(
            "{method}\n{}\n{}\n{canonical_headers}\n{signed_headers}\n{payload_hash}",
            canonical_uri(url, service),
            canonical_query(url),
        );

        let scope = format!("{date}/{}/{service}/aws4_request", self.credentials.region);
        let string_to_sign = format!(
            "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let signing_key = self.signing_key(&date, service)?;
        let signature = hex::encode(hmac(&signing_key, string_to_sign.as_bytes())?);

        let authorization = format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            self.credentials.access_key_id
        );

        // reqwest sets host itself
        headers.retain(|(name, _)| *name != "host");
        headers.push(("authorization", authorization));
        Ok(headers)
    }

    fn signing_key(&self, date: &str, service: &str) -> Result<Vec<u8>> {
        let secret = format!("AWS4{}", self.credentials.secret_access_key);
        let k_date = hmac(secret.as_bytes(), date.as_bytes())?;
        let k_region = hmac(&k_date, self.credentials.region.as_bytes())?;
        let k_service = hmac(&k_region, service.as_bytes())?;
        hmac(&k_service, b"aws4_request")
    }
}

/// True when the URL already carries a query-string signature.
pub fn is_presigned(url: &Url) -> bool {
    url.query_pairs()
        .any(|(key, _)| key.eq_ignore_ascii_case("X-Amz-Signature"))
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|e| Error::Configuration(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn host_header(url: &Url) -> Result<String> {
    let host = url
        .host_str()
        .ok_or_else(|| Error::Configuration(format!("url '{url}' has no host")))?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

fn canonical_uri(url: &Url, service: &str) -> String {
    let path = url.path();
    if path.is_empty() {
        return "/".to_string();
    }
    // Url leaves `:`, `+`, `=` and friends literal; each segment is re-encoded
    // from its decoded form, and once more for everything but s3
    path.split('/')
        .map(|segment| {
            let decoded = urlencoding::decode(segment)
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| segment.to_string());
            let encoded = urlencoding::encode(&decoded).into_owned();
            if service == STORAGE_SERVICE {
                encoded
            } else {
                urlencoding::encode(&encoded).into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn canonical_query(url: &Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            (
                urlencoding::encode(&k).into_owned(),
                urlencoding::encode(&v).into_owned(),
            )
        })
        .collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}
