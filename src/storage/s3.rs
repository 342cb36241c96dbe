// src/storage/s3.rs
// Minimal S3-compatible client over plain HTTP with AWS Signature V4,
// enough for an R2/S3 bucket: head/put/get/list/delete plus presigned GET
// URLs. Path-style addressing against a configured endpoint.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Method;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::storage::{ObjectInfo, ObjectStore};
use crate::timeparse::parse_iso_utc;

type HmacSha256 = Hmac<Sha256>;

const EMPTY_PAYLOAD_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn uri_encode_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

fn encode_query(pairs: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = pairs
        .iter()
        .map(|(k, v)| (uri_encode_segment(k), uri_encode_segment(v)))
        .collect();
    encoded.sort();
    encoded
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

pub struct S3CompatStore {
    http: reqwest::Client,
    endpoint: String,
    host: String,
    bucket: String,
    region: String,
    access_key_id: String,
    secret_access_key: String,
}

impl S3CompatStore {
    pub fn new(
        access_key_id: String,
        secret_access_key: String,
        bucket: String,
        endpoint: String,
        region: String,
    ) -> Result<Self> {
        let parsed = url::Url::parse(&endpoint)
            .with_context(|| format!("parsing store endpoint {endpoint}"))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| anyhow!("store endpoint has no host: {endpoint}"))?;
        let host = match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .context("building store http client")?;
        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            host,
            bucket,
            region,
            access_key_id,
            secret_access_key,
        })
    }

    fn canonical_path(&self, key: &str) -> String {
        let encoded_key: Vec<String> = key.split('/').map(|s| uri_encode_segment(s)).collect();
        format!("/{}/{}", self.bucket, encoded_key.join("/"))
    }

    fn credential_scope(&self, date: &str) -> String {
        format!("{date}/{}/s3/aws4_request", self.region)
    }

    fn signing_key(&self, date: &str) -> Vec<u8> {
        let secret = format!("AWS4{}", self.secret_access_key);
        let k_date = hmac_sha256(secret.as_bytes(), date.as_bytes());
        let k_region = hmac_sha256(&k_date, self.region.as_bytes());
        let k_service = hmac_sha256(&k_region, b"s3");
        hmac_sha256(&k_service, b"aws4_request")
    }

    fn sign(
        &self,
        method: &str,
        canonical_path: &str,
        canonical_query: &str,
        canonical_headers: &str,
        signed_headers: &str,
        payload_hash: &str,
        amz_date: &str,
        date: &str,
    ) -> String {
        let canonical_request = format!(
            "{method}\n{canonical_path}\n{canonical_query}\n{canonical_headers}\n{signed_headers}\n{payload_hash}"
        );
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{amz_date}\n{}\n{}",
            self.credential_scope(date),
            sha256_hex(canonical_request.as_bytes())
        );
        hex::encode(hmac_sha256(&self.signing_key(date), string_to_sign.as_bytes()))
    }

    async fn send_signed(
        &self,
        method: Method,
        key: &str,
        query: &[(String, String)],
        body: Option<Vec<u8>>,
        content_type: Option<&str>,
    ) -> Result<reqwest::Response> {
        let now = Utc::now();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let payload_hash = match &body {
            Some(bytes) => sha256_hex(bytes),
            None => EMPTY_PAYLOAD_SHA256.to_string(),
        };

        let canonical_path = self.canonical_path(key);
        let canonical_query = encode_query(query);
        let canonical_headers = format!(
            "host:{}\nx-amz-content-sha256:{}\nx-amz-date:{}\n",
            self.host, payload_hash, amz_date
        );
        let signed_headers = "host;x-amz-content-sha256;x-amz-date";
        let signature = self.sign(
            method.as_str(),
            &canonical_path,
            &canonical_query,
            &canonical_headers,
            signed_headers,
            &payload_hash,
            &amz_date,
            &date,
        );
        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{},SignedHeaders={},Signature={}",
            self.access_key_id,
            self.credential_scope(&date),
            signed_headers,
            signature
        );

        let mut url = format!("{}{}", self.endpoint, canonical_path);
        if !canonical_query.is_empty() {
            url.push('?');
            url.push_str(&canonical_query);
        }

        let mut request = self
            .http
            .request(method, &url)
            .header("Authorization", authorization)
            .header("x-amz-content-sha256", payload_hash)
            .header("x-amz-date", amz_date);
        if let Some(ct) = content_type {
            request = request.header("Content-Type", ct);
        }
        if let Some(bytes) = body {
            request = request.body(bytes);
        }
        request.send().await.context("sending store request")
    }
}

#[derive(Debug, Deserialize)]
struct ListBucketResult {
    #[serde(rename = "Contents", default)]
    contents: Vec<ListEntry>,
    #[serde(rename = "IsTruncated", default)]
    is_truncated: bool,
    #[serde(rename = "NextContinuationToken")]
    next_continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListEntry {
    #[serde(rename = "Key")]
    key: String,
    #[serde(rename = "LastModified")]
    last_modified: String,
}

#[async_trait]
impl ObjectStore for S3CompatStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        let resp = self
            .send_signed(Method::HEAD, key, &[], None, None)
            .await?;
        match resp.status().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            status => bail!("unexpected status {status} checking object {key}"),
        }
    }

    async fn put_file(&self, local: &Path, key: &str, content_type: &str) -> Result<()> {
        let bytes = tokio::fs::read(local)
            .await
            .with_context(|| format!("reading {}", local.display()))?;
        let resp = self
            .send_signed(Method::PUT, key, &[], Some(bytes), Some(content_type))
            .await?;
        if !resp.status().is_success() {
            bail!("upload of {key} failed with status {}", resp.status());
        }
        tracing::info!(key, local = %local.display(), "uploaded object");
        Ok(())
    }

    async fn put_json(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value).context("encoding json document")?;
        let resp = self
            .send_signed(Method::PUT, key, &[], Some(bytes), Some("application/json"))
            .await?;
        if !resp.status().is_success() {
            bail!("put of {key} failed with status {}", resp.status());
        }
        Ok(())
    }

    async fn get_json(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let resp = self.send_signed(Method::GET, key, &[], None, None).await?;
        if resp.status().as_u16() == 404 {
            return Ok(None);
        }
        if !resp.status().is_success() {
            bail!("get of {key} failed with status {}", resp.status());
        }
        let bytes = resp.bytes().await.context("reading json document body")?;
        let value = serde_json::from_slice(&bytes)
            .with_context(|| format!("decoding json document at {key}"))?;
        Ok(Some(value))
    }

    async fn presign_get(&self, key: &str, expires_secs: u64) -> Result<String> {
        let now = Utc::now();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let canonical_path = self.canonical_path(key);

        let query: Vec<(String, String)> = vec![
            ("X-Amz-Algorithm".into(), "AWS4-HMAC-SHA256".into()),
            (
                "X-Amz-Credential".into(),
                format!("{}/{}", self.access_key_id, self.credential_scope(&date)),
            ),
            ("X-Amz-Date".into(), amz_date.clone()),
            ("X-Amz-Expires".into(), expires_secs.to_string()),
            ("X-Amz-SignedHeaders".into(), "host".into()),
        ];
        let canonical_query = encode_query(&query);
        let canonical_headers = format!("host:{}\n", self.host);
        let signature = self.sign(
            "GET",
            &canonical_path,
            &canonical_query,
            &canonical_headers,
            "host",
            UNSIGNED_PAYLOAD,
            &amz_date,
            &date,
        );
        Ok(format!(
            "{}{}?{}&X-Amz-Signature={}",
            self.endpoint, canonical_path, canonical_query, signature
        ))
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let mut out = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let mut query: Vec<(String, String)> = vec![
                ("list-type".into(), "2".into()),
                ("prefix".into(), prefix.to_string()),
            ];
            if let Some(token) = &continuation {
                query.push(("continuation-token".into(), token.clone()));
            }
            // Bucket-level request: empty key gives /{bucket}/ which S3 accepts
            // for listings.
            let resp = self
                .send_signed(Method::GET, "", &query, None, None)
                .await?;
            if !resp.status().is_success() {
                bail!("list of {prefix} failed with status {}", resp.status());
            }
            let body = resp.text().await.context("reading list response")?;
            let parsed: ListBucketResult =
                quick_xml::de::from_str(&body).context("parsing list response xml")?;
            for entry in parsed.contents {
                out.push(ObjectInfo {
                    last_modified: parse_iso_utc(&entry.last_modified)
                        .unwrap_or(DateTime::UNIX_EPOCH),
                    key: entry.key,
                });
            }
            match (parsed.is_truncated, parsed.next_continuation_token) {
                (true, Some(token)) => continuation = Some(token),
                _ => break,
            }
        }
        Ok(out)
    }

    async fn delete(&self, keys: &[String]) -> Result<usize> {
        let mut deleted = 0usize;
        for key in keys {
            let resp = self
                .send_signed(Method::DELETE, key, &[], None, None)
                .await?;
            if resp.status().is_success() || resp.status().as_u16() == 404 {
                deleted += 1;
            } else {
                bail!("delete of {key} failed with status {}", resp.status());
            }
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> S3CompatStore {
        S3CompatStore::new(
            "AKIDEXAMPLE".into(),
            "secret".into(),
            "clips".into(),
            "https://account.r2.example".into(),
            "auto".into(),
        )
        .unwrap()
    }

    #[test]
    fn canonical_path_encodes_segments_but_keeps_slashes() {
        let s = store();
        assert_eq!(
            s.canonical_path("videos/2024/01/09/big win-abc.mp4"),
            "/clips/videos/2024/01/09/big%20win-abc.mp4"
        );
    }

    #[test]
    fn query_encoding_sorts_pairs() {
        let q = encode_query(&[
            ("prefix".into(), "videos/".into()),
            ("list-type".into(), "2".into()),
        ]);
        assert_eq!(q, "list-type=2&prefix=videos%2F");
    }

    #[test]
    fn signature_is_deterministic_for_fixed_inputs() {
        let s = store();
        let sig1 = s.sign(
            "GET",
            "/clips/state/processed.json",
            "",
            "host:account.r2.example\nx-amz-content-sha256:abc\nx-amz-date:20240109T220000Z\n",
            "host;x-amz-content-sha256;x-amz-date",
            "abc",
            "20240109T220000Z",
            "20240109",
        );
        let sig2 = s.sign(
            "GET",
            "/clips/state/processed.json",
            "",
            "host:account.r2.example\nx-amz-content-sha256:abc\nx-amz-date:20240109T220000Z\n",
            "host;x-amz-content-sha256;x-amz-date",
            "abc",
            "20240109T220000Z",
            "20240109",
        );
        assert_eq!(sig1, sig2);
        assert_eq!(sig1.len(), 64);
        assert!(sig1.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
