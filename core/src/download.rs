//! Ephemeral download-link proxy
//!
//! Reserve URIs that point at the configured file store are replaced by
//! short-lived opaque links through this tool, so the store itself is never
//! exposed to students and a leaked link dies with its token.

use log::error;
use url::Url;

use crate::cache::DownloadTokenCache;
use crate::course::Reserve;
use crate::error::{ApiError, Result};
use crate::platform::{Clock, HttpClient};

pub const DOWNLOAD_PATH_PREFIX: &str = "/lti-courses/download/";

/// Download tokens are longer than nonces: they live longer and are the only
/// secret guarding the file.
const DOWNLOAD_TOKEN_LENGTH: usize = 32;

/// A proxied file ready to stream back to the browser
#[derive(Debug)]
pub struct DownloadPayload {
    pub file_name: String,
    pub body: Vec<u8>,
}

/// Rewrite file-store URIs in `reserves` to tokenized download links
pub fn tokenize_file_links(
    reserves: &mut [Reserve],
    file_store_host: &str,
    tool_base_url: &str,
    cache: &DownloadTokenCache,
    clock: &dyn Clock,
) {
    for reserve in reserves {
        let Ok(parsed) = Url::parse(&reserve.uri) else {
            continue;
        };
        if parsed.host_str() != Some(file_store_host) {
            continue;
        }

        let token = crate::lti::random_token(DOWNLOAD_TOKEN_LENGTH);
        cache.put(&token, Some(reserve.uri.clone()), clock);
        reserve.uri = format!("{}{}{}", tool_base_url, DOWNLOAD_PATH_PREFIX, token);
    }
}

/// Resolve a download token and fetch the file it points at
pub async fn fetch_download(
    token: &str,
    cache: &DownloadTokenCache,
    http: &dyn HttpClient,
    clock: &dyn Clock,
) -> Result<DownloadPayload> {
    let file_url = cache.get(token, clock).ok_or_else(|| {
        ApiError::invalid_request(
            "This file is no longer available for download. Reload the list of \
             reserves and try again.",
        )
    })?;

    let response = http
        .get(&file_url, &[("User-Agent", "lti-courses")])
        .await?;

    if response.status != 200 {
        error!("file store returned HTTP {} for a proxied download", response.status);
        return Err(ApiError::upstream(format!(
            "file store returned HTTP {}",
            response.status
        )));
    }

    let file_name = Url::parse(&file_url)
        .ok()
        .and_then(|url| {
            url.path_segments()
                .and_then(|segments| segments.last().map(str::to_string))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "download".to_string());

    Ok(DownloadPayload {
        file_name,
        body: response.body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TtlCache;
    use crate::test_support::{MockClock, MockHttp};

    fn reserve_with_uri(uri: &str) -> Reserve {
        Reserve {
            item_id: "item-1".to_string(),
            barcode: String::new(),
            instance_hrid: String::new(),
            title: "Readings".to_string(),
            uri: uri.to_string(),
            start_date: None,
            end_date: None,
            primary_contributor: String::new(),
            location_display_name: "?".to_string(),
            suppress_discovery: false,
        }
    }

    #[test]
    fn test_tokenize_rewrites_only_file_store_uris() {
        let clock = MockClock::new(1_700_000_000);
        let cache: DownloadTokenCache = TtlCache::new(3600, 300, 100);
        let mut reserves = vec![
            reserve_with_uri("https://files.example.edu/syllabus.pdf"),
            reserve_with_uri("https://discover.example.edu/record/1"),
            reserve_with_uri(""),
        ];

        tokenize_file_links(
            &mut reserves,
            "files.example.edu",
            "https://reserves.example.edu",
            &cache,
            &clock,
        );

        assert!(reserves[0]
            .uri
            .starts_with("https://reserves.example.edu/lti-courses/download/"));
        assert_eq!(reserves[1].uri, "https://discover.example.edu/record/1");
        assert_eq!(reserves[2].uri, "");
        assert_eq!(cache.len(), 1);

        // the token resolves back to the upstream URL
        let token = reserves[0].uri.rsplit('/').next().unwrap();
        assert_eq!(
            cache.get(token, &clock).as_deref(),
            Some("https://files.example.edu/syllabus.pdf")
        );
    }

    #[tokio::test]
    async fn test_fetch_download_proxies_the_file() {
        let clock = MockClock::new(1_700_000_000);
        let cache: DownloadTokenCache = TtlCache::new(3600, 300, 100);
        cache.put(
            "token-1",
            Some("https://files.example.edu/week1/syllabus.pdf".to_string()),
            &clock,
        );

        let http = MockHttp::new(vec![(
            "files.example.edu".to_string(),
            200,
            b"%PDF-1.4".to_vec(),
        )]);

        let payload = fetch_download("token-1", &cache, &http, &clock)
            .await
            .expect("download should succeed");

        assert_eq!(payload.file_name, "syllabus.pdf");
        assert_eq!(payload.body, b"%PDF-1.4");
    }

    #[tokio::test]
    async fn test_unknown_token_is_a_client_error() {
        let clock = MockClock::new(1_700_000_000);
        let cache: DownloadTokenCache = TtlCache::new(3600, 300, 100);
        let http = MockHttp::new(Vec::new());

        let err = fetch_download("gone", &cache, &http, &clock)
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_expired_token_is_a_client_error() {
        let clock = MockClock::new(1_700_000_000);
        let cache: DownloadTokenCache = TtlCache::new(60, 10, 100);
        cache.put(
            "token-1",
            Some("https://files.example.edu/syllabus.pdf".to_string()),
            &clock,
        );
        clock.advance(61);

        let http = MockHttp::new(Vec::new());
        let err = fetch_download("token-1", &cache, &http, &clock)
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_file_store_failure_is_an_upstream_error() {
        let clock = MockClock::new(1_700_000_000);
        let cache: DownloadTokenCache = TtlCache::new(3600, 300, 100);
        cache.put(
            "token-1",
            Some("https://files.example.edu/syllabus.pdf".to_string()),
            &clock,
        );

        let http = MockHttp::new(vec![("files.example.edu".to_string(), 500, Vec::new())]);
        let err = fetch_download("token-1", &cache, &http, &clock)
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 502);
    }
}
