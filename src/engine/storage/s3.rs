//! S3-Compatible Object Store
//!
//! Path-style S3 REST client over reqwest with AWS Signature V4 request
//! signing. Works against AWS S3 and MinIO-style deployments alike.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, Url};
use sha2::{Digest, Sha256};

use async_trait::async_trait;

use super::{ObjectEntry, ObjectStore, StorageError};
use crate::engine::config::S3Config;

type HmacSha256 = Hmac<Sha256>;

/// SHA-256 of the empty string, used for requests without a body.
const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

const SIGNED_HEADERS: &str = "host;x-amz-content-sha256;x-amz-date";

/// S3 client bound to one bucket. All settings come from the startup
/// configuration; nothing is read from the environment here.
pub struct S3ObjectStore {
    client: reqwest::Client,
    endpoint: String,
    host: String,
    bucket: String,
    region: String,
    access_key: String,
    secret_key: String,
}

impl S3ObjectStore {
    pub fn new(config: &S3Config) -> Result<Self, StorageError> {
        let endpoint = config.endpoint.trim_end_matches('/').to_string();
        let url = Url::parse(&endpoint)
            .map_err(|e| StorageError::InvalidEndpoint(format!("{}: {}", config.endpoint, e)))?;
        let host_str = url
            .host_str()
            .ok_or_else(|| StorageError::InvalidEndpoint(config.endpoint.clone()))?;
        // Port appears in the Host header only when non-default, matching
        // what reqwest sends on the wire.
        let host = match url.port() {
            Some(port) => format!("{}:{}", host_str, port),
            None => host_str.to_string(),
        };

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            host,
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            access_key: config.access_key.clone(),
            secret_key: config.secret_key.clone(),
        })
    }

    /// Issue one SigV4-signed request. `query` must already be sorted by
    /// parameter name as the canonical form requires.
    async fn signed_request(
        &self,
        method: Method,
        canonical_uri: &str,
        query: &[(String, String)],
        body: Option<Bytes>,
    ) -> Result<reqwest::Response, StorageError> {
        let now = Utc::now();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();

        let payload_hash = match &body {
            Some(bytes) => hex::encode(Sha256::digest(bytes)),
            None => EMPTY_SHA256.to_string(),
        };

        let canonical_query = query
            .iter()
            .map(|(k, v)| format!("{}={}", uri_encode(k, true), uri_encode(v, true)))
            .collect::<Vec<_>>()
            .join("&");

        let canonical_headers = format!(
            "host:{}\nx-amz-content-sha256:{}\nx-amz-date:{}\n",
            self.host, payload_hash, amz_date
        );
        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method, canonical_uri, canonical_query, canonical_headers, SIGNED_HEADERS, payload_hash
        );

        let scope = format!("{}/{}/s3/aws4_request", date, self.region);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let k_date = hmac_sha256(format!("AWS4{}", self.secret_key).as_bytes(), date.as_bytes());
        let k_region = hmac_sha256(&k_date, self.region.as_bytes());
        let k_service = hmac_sha256(&k_region, b"s3");
        let k_signing = hmac_sha256(&k_service, b"aws4_request");
        let signature = hex::encode(hmac_sha256(&k_signing, string_to_sign.as_bytes()));

        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            self.access_key, scope, SIGNED_HEADERS, signature
        );

        let url = if canonical_query.is_empty() {
            format!("{}{}", self.endpoint, canonical_uri)
        } else {
            format!("{}{}?{}", self.endpoint, canonical_uri, canonical_query)
        };

        let mut request = self
            .client
            .request(method, &url)
            .header("x-amz-date", amz_date)
            .header("x-amz-content-sha256", payload_hash)
            .header(AUTHORIZATION, authorization);
        if let Some(bytes) = body {
            request = request.body(bytes);
        }

        Ok(request.send().await?)
    }

    fn bucket_uri(&self) -> String {
        format!("/{}", uri_encode(&self.bucket, false))
    }

    fn key_uri(&self, key: &str) -> String {
        format!("{}/{}", self.bucket_uri(), uri_encode(key, false))
    }

    /// Fetch one page of a ListObjectsV2 result.
    async fn list_page(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
        token: Option<&str>,
    ) -> Result<ListPage, StorageError> {
        let mut query: Vec<(String, String)> = vec![
            ("list-type".to_string(), "2".to_string()),
            ("prefix".to_string(), prefix.to_string()),
        ];
        if let Some(d) = delimiter {
            query.push(("delimiter".to_string(), d.to_string()));
        }
        if let Some(t) = token {
            query.push(("continuation-token".to_string(), t.to_string()));
        }
        query.sort();

        let response = self
            .signed_request(Method::GET, &self.bucket_uri(), &query, None)
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Request {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let text = response.text().await?;
        parse_list_response(&text)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list_prefixes(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut prefixes = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self.list_page(prefix, Some("/"), token.as_deref()).await?;
            prefixes.extend(page.prefixes);
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(prefixes)
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectEntry>, StorageError> {
        let mut entries = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self.list_page(prefix, None, token.as_deref()).await?;
            entries.extend(page.entries);
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(entries)
    }

    async fn get_text(&self, key: &str) -> Result<String, StorageError> {
        let response = self
            .signed_request(Method::GET, &self.key_uri(key), &[], None)
            .await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(key.to_string()));
        }
        if !status.is_success() {
            return Err(StorageError::Request {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.text().await?)
    }

    async fn put_object(&self, key: &str, body: Bytes) -> Result<(), StorageError> {
        let response = self
            .signed_request(Method::PUT, &self.key_uri(key), &[], Some(body))
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Request {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint,
            self.bucket,
            uri_encode(key, false)
        )
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac =
        HmacSha256::new_from_slice(key).expect("HMAC-SHA256 accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// AWS-style URI encoding: unreserved characters pass through, everything
/// else becomes %XX. Slashes survive in paths but not in query values.
fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            b'/' if !encode_slash => out.push('/'),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// One page of a ListObjectsV2 response.
#[derive(Debug, Default)]
struct ListPage {
    prefixes: Vec<String>,
    entries: Vec<ObjectEntry>,
    next_token: Option<String>,
}

fn parse_list_response(xml: &str) -> Result<ListPage, StorageError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut page = ListPage::default();
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut current_key: Option<String> = None;
    let mut current_size: Option<u64> = None;
    let mut current_modified: Option<DateTime<Utc>> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name().as_ref().to_vec();
                if name == b"Contents" {
                    current_key = None;
                    current_size = None;
                    current_modified = None;
                }
                stack.push(name);
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| StorageError::InvalidListing(e.to_string()))?
                    .trim()
                    .to_string();
                let parent = stack.iter().rev().nth(1).map(|n| n.as_slice());
                let leaf = stack.last().map(|n| n.as_slice());
                match (parent, leaf) {
                    (Some(b"CommonPrefixes"), Some(b"Prefix")) => page.prefixes.push(text),
                    (Some(b"Contents"), Some(b"Key")) => current_key = Some(text),
                    (Some(b"Contents"), Some(b"Size")) => {
                        current_size = Some(text.parse().map_err(|_| {
                            StorageError::InvalidListing(format!("bad object size: {}", text))
                        })?);
                    }
                    (Some(b"Contents"), Some(b"LastModified")) => {
                        let parsed = DateTime::parse_from_rfc3339(&text).map_err(|e| {
                            StorageError::InvalidListing(format!(
                                "bad LastModified {}: {}",
                                text, e
                            ))
                        })?;
                        current_modified = Some(parsed.with_timezone(&Utc));
                    }
                    (Some(b"ListBucketResult"), Some(b"NextContinuationToken")) => {
                        page.next_token = Some(text);
                    }
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"Contents" {
                    let key = current_key.take().ok_or_else(|| {
                        StorageError::InvalidListing("Contents entry without Key".to_string())
                    })?;
                    let last_modified = current_modified.take().ok_or_else(|| {
                        StorageError::InvalidListing(format!(
                            "Contents entry for {} without LastModified",
                            key
                        ))
                    })?;
                    page.entries.push(ObjectEntry {
                        key,
                        size: current_size.take().unwrap_or(0),
                        last_modified,
                    });
                }
                stack.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(StorageError::InvalidListing(e.to_string())),
            _ => {}
        }
    }

    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_encode() {
        assert_eq!(uri_encode("app/1.0.0/app-1.0.0.tar.gz", false), "app/1.0.0/app-1.0.0.tar.gz");
        assert_eq!(uri_encode("1.0.0+build.5", false), "1.0.0%2Bbuild.5");
        assert_eq!(uri_encode("a/b", true), "a%2Fb");
        assert_eq!(uri_encode("hello world", true), "hello%20world");
    }

    #[test]
    fn test_parse_list_response_prefixes() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>releases</Name>
  <Prefix>app/windows/x86_64/</Prefix>
  <Delimiter>/</Delimiter>
  <IsTruncated>false</IsTruncated>
  <CommonPrefixes><Prefix>app/windows/x86_64/1.0.0/</Prefix></CommonPrefixes>
  <CommonPrefixes><Prefix>app/windows/x86_64/1.2.0/</Prefix></CommonPrefixes>
</ListBucketResult>"#;
        let page = parse_list_response(xml).unwrap();
        assert_eq!(
            page.prefixes,
            vec![
                "app/windows/x86_64/1.0.0/".to_string(),
                "app/windows/x86_64/1.2.0/".to_string(),
            ]
        );
        assert!(page.entries.is_empty());
        assert!(page.next_token.is_none());
    }

    #[test]
    fn test_parse_list_response_contents() {
        let xml = r#"<ListBucketResult>
  <IsTruncated>true</IsTruncated>
  <NextContinuationToken>token123</NextContinuationToken>
  <Contents>
    <Key>app/windows/x86_64/1.2.0/app-1.2.0.msi.zip</Key>
    <LastModified>2026-03-01T12:00:00.000Z</LastModified>
    <Size>10485760</Size>
  </Contents>
  <Contents>
    <Key>app/windows/x86_64/1.2.0/app-1.2.0.msi.zip.sig</Key>
    <LastModified>2026-03-01T12:00:01.000Z</LastModified>
    <Size>512</Size>
  </Contents>
</ListBucketResult>"#;
        let page = parse_list_response(xml).unwrap();
        assert_eq!(page.entries.len(), 2);
        assert_eq!(
            page.entries[0].key,
            "app/windows/x86_64/1.2.0/app-1.2.0.msi.zip"
        );
        assert_eq!(page.entries[0].size, 10_485_760);
        assert_eq!(page.next_token.as_deref(), Some("token123"));
    }

    #[test]
    fn test_parse_list_response_rejects_garbage() {
        assert!(parse_list_response("<Contents><Key>x</Key></Contents>").is_err());
    }

    #[test]
    fn test_object_url_encodes_key() {
        let store = S3ObjectStore::new(&S3Config {
            endpoint: "http://localhost:9000/".to_string(),
            bucket: "releases".to_string(),
            region: "us-east-1".to_string(),
            access_key: "minio".to_string(),
            secret_key: "minio123".to_string(),
        })
        .unwrap();
        assert_eq!(
            store.object_url("app/linux/x86_64/1.0.0+build/app.tar.gz"),
            "http://localhost:9000/releases/app/linux/x86_64/1.0.0%2Bbuild/app.tar.gz"
        );
    }
}
