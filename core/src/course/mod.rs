//! Course, term, and reserve models
//!
//! Built fresh from catalog JSON on every launch, never cached. The wire
//! shapes are deliberately lenient: a catalog record missing a field becomes
//! an empty string rather than a parse failure, matching how the catalog
//! actually behaves.

pub mod dates;
mod window;

pub use window::current_reserves;

use chrono::{DateTime, Utc};
use log::error;
use serde::Deserialize;

/// Course-listing-level default validity window, date-only granularity
#[derive(Debug, Clone, Default)]
pub struct Term {
    pub start_date: String,
    pub end_date: String,
}

impl Term {
    fn from_raw(start: &str, end: &str) -> Self {
        Self {
            start_date: normalize_or_empty(start),
            end_date: normalize_or_empty(end),
        }
    }
}

fn normalize_or_empty(raw: &str) -> String {
    match dates::normalize_date(raw) {
        Ok(date) => date,
        Err(err) => {
            error!("failed to normalize term date: {}", err);
            String::new()
        }
    }
}

/// One item on reserve for a course
#[derive(Debug, Clone, PartialEq)]
pub struct Reserve {
    pub item_id: String,
    pub barcode: String,
    pub instance_hrid: String,
    pub title: String,
    pub uri: String,
    /// Per-item override of the term window; `None` falls back to the term
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub primary_contributor: String,
    pub location_display_name: String,
    pub suppress_discovery: bool,
}

/// A course with its term and ordered reserves
#[derive(Debug, Clone)]
pub struct Course {
    pub id: String,
    pub course_listing_id: String,
    pub term: Term,
    reserves: Vec<Reserve>,
    search_url: Option<String>,
}

impl Course {
    pub fn set_search_url(&mut self, search_url: Option<String>) {
        self.search_url = search_url;
    }

    pub fn set_reserves(&mut self, reserves: Vec<Reserve>) {
        self.reserves = reserves;
    }

    /// Reserves active at `now`, in catalog order, with effective dates
    /// resolved and empty URIs filled from the platform's search template.
    pub fn current_reserves(&self, now: DateTime<Utc>) -> Vec<Reserve> {
        let mut current = window::current_reserves(&self.term, &self.reserves, now);

        for reserve in &mut current {
            if reserve.uri.is_empty() {
                if let Some(search_url) = &self.search_url {
                    reserve.uri = fill_search_url(search_url, reserve);
                }
            }
        }

        current
    }
}

/// Substitute the reserve's identifiers into the platform search template
fn fill_search_url(search_url: &str, reserve: &Reserve) -> String {
    if search_url.contains("[BARCODE]") {
        search_url.replace("[BARCODE]", &reserve.barcode)
    } else if search_url.contains("[INSTANCE_HRID]") {
        search_url.replace("[INSTANCE_HRID]", &reserve.instance_hrid)
    } else {
        search_url.to_string()
    }
}

// Wire shapes, as returned by the course catalog.

#[derive(Deserialize, Default)]
struct CoursesEnvelope {
    #[serde(default)]
    courses: Vec<CourseJson>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct CourseJson {
    #[serde(default)]
    id: String,
    #[serde(default)]
    course_listing_id: String,
    #[serde(default)]
    course_listing_object: CourseListingJson,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct CourseListingJson {
    #[serde(default)]
    term_object: TermJson,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct TermJson {
    #[serde(default)]
    start_date: String,
    #[serde(default)]
    end_date: String,
}

#[derive(Deserialize, Default)]
struct ReservesEnvelope {
    #[serde(default)]
    reserves: Vec<ReserveJson>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ReserveJson {
    #[serde(default)]
    item_id: String,
    #[serde(default)]
    start_date: String,
    #[serde(default)]
    end_date: String,
    #[serde(default)]
    copied_item: CopiedItemJson,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct CopiedItemJson {
    #[serde(default)]
    barcode: String,
    #[serde(default)]
    instance_hrid: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    instance_discovery_suppress: bool,
    #[serde(default)]
    permanent_location_object: LocationJson,
    #[serde(default)]
    temporary_location_object: LocationJson,
    #[serde(default)]
    contributors: Vec<ContributorJson>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct LocationJson {
    #[serde(default)]
    discovery_display_name: Option<String>,
}

#[derive(Deserialize, Default)]
struct ContributorJson {
    #[serde(default)]
    name: String,
    #[serde(default)]
    primary: bool,
}

/// Parse a catalog course-search response; `None` when no course matched
pub fn course_from_response(body: &[u8]) -> Result<Option<Course>, serde_json::Error> {
    let envelope: CoursesEnvelope = serde_json::from_slice(body)?;
    Ok(envelope.courses.into_iter().next().map(Course::from))
}

/// Parse a catalog reserves-listing response
pub fn reserves_from_response(body: &[u8]) -> Result<Vec<Reserve>, serde_json::Error> {
    let envelope: ReservesEnvelope = serde_json::from_slice(body)?;
    Ok(envelope.reserves.into_iter().map(Reserve::from).collect())
}

impl From<CourseJson> for Course {
    fn from(json: CourseJson) -> Self {
        let term = json.course_listing_object.term_object;

        Self {
            id: json.id,
            course_listing_id: json.course_listing_id,
            term: Term::from_raw(&term.start_date, &term.end_date),
            reserves: Vec::new(),
            search_url: None,
        }
    }
}

impl From<ReserveJson> for Reserve {
    fn from(json: ReserveJson) -> Self {
        let item = json.copied_item;

        // Prefer the temporary location's display name over the permanent one.
        let location_display_name = item
            .temporary_location_object
            .discovery_display_name
            .or(item.permanent_location_object.discovery_display_name)
            .unwrap_or_else(|| "?".to_string());

        // The contributor flagged as primary wins; otherwise the first listed.
        let mut primary_contributor = item
            .contributors
            .first()
            .map(|c| c.name.clone())
            .unwrap_or_default();
        for contributor in &item.contributors {
            if contributor.primary {
                primary_contributor = contributor.name.clone();
            }
        }

        Self {
            item_id: json.item_id,
            barcode: item.barcode,
            instance_hrid: item.instance_hrid,
            title: item.title,
            uri: item.uri,
            start_date: optional_date(&json.start_date),
            end_date: optional_date(&json.end_date),
            primary_contributor,
            location_display_name,
            suppress_discovery: item.instance_discovery_suppress,
        }
    }
}

/// An absent or unnormalizable override behaves as "no override"
fn optional_date(raw: &str) -> Option<String> {
    match dates::normalize_date(raw) {
        Ok(date) if date.is_empty() => None,
        Ok(date) => Some(date),
        Err(err) => {
            error!("failed to normalize reserve date: {}", err);
            None
        }
    }
}
