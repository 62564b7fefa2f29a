//! Course catalog client
//!
//! Thin functions over the HttpClient collaborator for the three backend
//! lookups: platform configuration by issuer, course by query, and reserves
//! by course listing id. The catalog's JSON shapes are parsed in
//! `crate::course`; this module owns URLs, headers, and status handling.

use log::error;
use serde::Deserialize;
use url::Url;

use crate::config::DEFAULT_NO_RESERVES_MESSAGE;
use crate::course::{self, Course, Reserve};
use crate::error::{ApiError, Result};
use crate::platform::HttpClient;

const TENANT_HEADER: &str = "X-Okapi-Tenant";
const USER_AGENT: &str = "lti-courses";

/// Where and how to reach the course catalog
pub struct CatalogConfig {
    pub base_url: String,
    pub tenant: String,
}

impl CatalogConfig {
    pub fn new(base_url: impl Into<String>, tenant: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            tenant: tenant.into(),
        }
    }
}

/// LTI platform configuration, stored in the configuration backend keyed by issuer
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Platform {
    pub issuer: String,
    pub client_id: String,
    pub jwks_url: String,
    pub oidc_auth_url: String,
    #[serde(default)]
    pub search_url: Option<String>,
    #[serde(default)]
    pub css_url: Option<String>,
    #[serde(default = "default_no_reserves_message")]
    pub no_reserves_message: String,
}

fn default_no_reserves_message() -> String {
    DEFAULT_NO_RESERVES_MESSAGE.to_string()
}

#[derive(Deserialize)]
struct ConfigurationsEnvelope {
    #[serde(default)]
    configs: Vec<ConfigurationEntry>,
}

#[derive(Deserialize)]
struct ConfigurationEntry {
    /// The platform record, JSON-encoded as a string by the store
    value: String,
}

/// Which course field a launch looks the LTI context title up by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseIdType {
    CourseNumber,
    ExternalId,
    RegistrarId,
    ListingId,
}

impl CourseIdType {
    fn query_field(self) -> &'static str {
        match self {
            Self::CourseNumber => "courseNumber",
            Self::ExternalId => "courseListing.externalId",
            Self::RegistrarId => "courseListing.registrarId",
            Self::ListingId => "courseListingId",
        }
    }
}

/// Fetch the platform configured for `issuer`
pub async fn get_platform(
    issuer: &str,
    http: &dyn HttpClient,
    catalog: &CatalogConfig,
) -> Result<Platform> {
    if issuer.is_empty() {
        return Err(ApiError::invalid_request("issuer not provided"));
    }

    // The configuration store can't run queries containing slashes, so the
    // issuer is stored and looked up without its protocol.
    let issuer_code = match issuer.find("://") {
        Some(index) => &issuer[index + 3..],
        None => issuer,
    };

    let mut url = parse_base(&catalog.base_url, "/configurations/entries")?;
    url.query_pairs_mut()
        .append_pair("limit", "100")
        .append_pair(
            "query",
            &format!(
                "(module=LTICOURSES and configName=platform and code={})",
                issuer_code
            ),
        );

    let response = http.get(url.as_str(), &headers(catalog)).await?;
    if response.status != 200 {
        return Err(ApiError::upstream(format!(
            "platform lookup returned HTTP {}",
            response.status
        )));
    }

    let envelope: ConfigurationsEnvelope = response
        .json()
        .map_err(|e| ApiError::upstream(format!("invalid platform configuration: {}", e)))?;

    let entry = envelope
        .configs
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::unknown_platform(issuer))?;

    let platform: Platform = serde_json::from_str(&entry.value).map_err(|e| {
        error!("stored platform record is malformed: {}", e);
        ApiError::internal("stored platform record is malformed")
    })?;

    if platform.issuer != issuer {
        return Err(ApiError::unknown_platform(issuer));
    }

    Ok(platform)
}

/// Look up a course by the LTI context title; `None` when nothing matches
pub async fn get_course(
    id_type: CourseIdType,
    course_title: &str,
    http: &dyn HttpClient,
    catalog: &CatalogConfig,
) -> Result<Option<Course>> {
    let mut url = parse_base(&catalog.base_url, "/coursereserves/courses")?;
    url.query_pairs_mut().append_pair(
        "query",
        &format!("({}=\"{}\")", id_type.query_field(), course_title),
    );

    let response = http.get(url.as_str(), &headers(catalog)).await?;
    if response.status != 200 {
        return Err(ApiError::upstream(format!(
            "course lookup returned HTTP {}",
            response.status
        )));
    }

    match course::course_from_response(&response.body) {
        Ok(course) => Ok(course),
        Err(e) => {
            // An unparseable course record renders as "no reserves" rather
            // than failing the launch.
            error!("failed to parse course response: {}", e);
            Ok(None)
        }
    }
}

/// Fetch every reserve for a course listing, catalog-sorted by title
pub async fn get_course_reserves(
    course_listing_id: &str,
    http: &dyn HttpClient,
    catalog: &CatalogConfig,
) -> Result<Vec<Reserve>> {
    let path = format!(
        "/coursereserves/courselistings/{}/reserves",
        course_listing_id
    );
    let mut url = parse_base(&catalog.base_url, &path)?;
    url.query_pairs_mut()
        .append_pair("limit", "500")
        .append_pair("expand", "*")
        .append_pair("query", "cql.allRecords=1 sortby copiedItem.title");

    let response = http.get(url.as_str(), &headers(catalog)).await?;
    if response.status != 200 {
        return Err(ApiError::upstream(format!(
            "reserves lookup returned HTTP {}",
            response.status
        )));
    }

    course::reserves_from_response(&response.body)
        .map_err(|e| ApiError::upstream(format!("invalid reserves response: {}", e)))
}

fn parse_base(base_url: &str, path: &str) -> Result<Url> {
    Url::parse(&format!("{}{}", base_url, path))
        .map_err(|_| ApiError::internal(format!("invalid catalog URL: {}{}", base_url, path)))
}

fn headers(catalog: &CatalogConfig) -> [(&'static str, &str); 3] {
    [
        ("Accept", "application/json"),
        ("User-Agent", USER_AGENT),
        (TENANT_HEADER, catalog.tenant.as_str()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockHttp;

    fn platform_value() -> String {
        serde_json::json!({
            "issuer": "https://lms.example.edu",
            "clientId": "client-1",
            "jwksUrl": "https://lms.example.edu/jwks",
            "oidcAuthUrl": "https://lms.example.edu/auth",
            "searchUrl": "https://discover.example.edu/search?q=[BARCODE]"
        })
        .to_string()
    }

    fn catalog() -> CatalogConfig {
        CatalogConfig::new("http://okapi.example.edu/", "diku")
    }

    #[tokio::test]
    async fn test_get_platform_parses_stored_record() {
        let http = MockHttp::with_json(vec![(
            "/configurations/entries",
            200,
            serde_json::json!({"configs": [{"value": platform_value()}]}),
        )]);

        let platform = get_platform("https://lms.example.edu", &http, &catalog())
            .await
            .expect("platform should resolve");

        assert_eq!(platform.client_id, "client-1");
        assert_eq!(
            platform.no_reserves_message,
            crate::config::DEFAULT_NO_RESERVES_MESSAGE
        );
        assert_eq!(platform.css_url, None);
    }

    #[tokio::test]
    async fn test_get_platform_unknown_issuer() {
        let http = MockHttp::with_json(vec![(
            "/configurations/entries",
            200,
            serde_json::json!({"configs": []}),
        )]);

        let err = get_platform("https://nobody.example.edu", &http, &catalog())
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::UnknownPlatform { .. }));
    }

    #[tokio::test]
    async fn test_get_platform_issuer_mismatch_is_unknown() {
        let http = MockHttp::with_json(vec![(
            "/configurations/entries",
            200,
            serde_json::json!({"configs": [{"value": platform_value()}]}),
        )]);

        let err = get_platform("https://other.example.edu", &http, &catalog())
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::UnknownPlatform { .. }));
    }

    #[tokio::test]
    async fn test_get_course_not_found_is_none() {
        let http = MockHttp::with_json(vec![(
            "/coursereserves/courses",
            200,
            serde_json::json!({"courses": []}),
        )]);

        let course = get_course(CourseIdType::CourseNumber, "CAL101", &http, &catalog())
            .await
            .expect("lookup should succeed");

        assert!(course.is_none());
    }

    #[tokio::test]
    async fn test_get_course_upstream_failure() {
        let http = MockHttp::with_json(vec![(
            "/coursereserves/courses",
            500,
            serde_json::json!({"error": "boom"}),
        )]);

        let err = get_course(CourseIdType::CourseNumber, "CAL101", &http, &catalog())
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 502);
    }
}
