//! Rendering seam
//!
//! The renderer is a purely presentational collaborator: core hands it typed
//! view models and receives finished HTML (or a render error) back.

use crate::catalog::Platform;
use crate::config::DEFAULT_NO_RESERVES_MESSAGE;
use crate::course::Reserve;
use crate::error::Result;
use crate::lti::deep_link::DeepLinkResponse;

/// Platform-specific presentation settings
pub struct Branding<'a> {
    pub css_url: Option<&'a str>,
    pub no_reserves_message: &'a str,
}

impl<'a> Branding<'a> {
    pub fn from_platform(platform: &'a Platform) -> Self {
        Self {
            css_url: platform.css_url.as_deref(),
            no_reserves_message: &platform.no_reserves_message,
        }
    }
}

impl Default for Branding<'static> {
    /// Used where no platform is in scope (the deep-linked reserves endpoint)
    fn default() -> Self {
        Self {
            css_url: None,
            no_reserves_message: DEFAULT_NO_RESERVES_MESSAGE,
        }
    }
}

/// Model for the reserves page
pub struct ReservesView<'a> {
    pub branding: Branding<'a>,
    pub reserves: &'a [Reserve],
}

pub trait Renderer {
    /// The list of current reserves for a launched course
    fn render_reserves(&self, view: &ReservesView<'_>) -> Result<String>;

    /// Shown when the course is unknown or nothing is currently on reserve
    fn render_no_reserves(&self, branding: &Branding<'_>) -> Result<String>;

    /// Auto-submitting form that POSTs a Deep Linking response back to the platform
    fn render_deep_link(&self, response: &DeepLinkResponse) -> Result<String>;
}
