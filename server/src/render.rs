//! String-template HTML renderer
//!
//! Purely presentational: interpolation and escaping only, no decisions
//! about which reserves to show.

use lti_courses_core::course::Reserve;
use lti_courses_core::error::Result;
use lti_courses_core::lti::deep_link::DeepLinkResponse;
use lti_courses_core::render::{Branding, Renderer, ReservesView};

pub struct HtmlRenderer;

impl Renderer for HtmlRenderer {
    fn render_reserves(&self, view: &ReservesView<'_>) -> Result<String> {
        let rows: String = view.reserves.iter().map(reserve_row).collect();

        let body = format!(
            "<h1>Course Reserves</h1>\n<ul class=\"reserves\">\n{}</ul>",
            rows
        );

        Ok(page("Course Reserves", &view.branding, &body))
    }

    fn render_no_reserves(&self, branding: &Branding<'_>) -> Result<String> {
        let body = format!(
            "<h1>Course Reserves</h1>\n<p class=\"no-reserves\">{}</p>",
            escape_html(branding.no_reserves_message)
        );

        Ok(page("Course Reserves", branding, &body))
    }

    fn render_deep_link(&self, response: &DeepLinkResponse) -> Result<String> {
        // The browser immediately re-POSTs the signed response to the platform.
        let body = format!(
            concat!(
                "<form id=\"deep-link-response\" method=\"post\" action=\"{}\">\n",
                "<input type=\"hidden\" name=\"JWT\" value=\"{}\">\n",
                "</form>\n",
                "<script>document.getElementById(\"deep-link-response\").submit();</script>"
            ),
            escape_html(&response.return_url),
            escape_html(&response.jwt),
        );

        Ok(page_without_branding("Returning to your course...", &body))
    }
}

fn reserve_row(reserve: &Reserve) -> String {
    // A suppressed item is listed but never linked out.
    let title = if reserve.uri.is_empty() || reserve.suppress_discovery {
        escape_html(&reserve.title)
    } else {
        format!(
            "<a href=\"{}\">{}</a>",
            escape_html(&reserve.uri),
            escape_html(&reserve.title)
        )
    };

    let dates = match (&reserve.start_date, &reserve.end_date) {
        (Some(start), Some(end)) => format!("{} – {}", escape_html(start), escape_html(end)),
        _ => String::new(),
    };

    format!(
        concat!(
            "<li class=\"reserve\">\n",
            "<span class=\"title\">{}</span>\n",
            "<span class=\"contributor\">{}</span>\n",
            "<span class=\"location\">{}</span>\n",
            "<span class=\"dates\">{}</span>\n",
            "</li>\n"
        ),
        title,
        escape_html(&reserve.primary_contributor),
        escape_html(&reserve.location_display_name),
        dates,
    )
}

fn page(title: &str, branding: &Branding<'_>, body: &str) -> String {
    let stylesheet = branding
        .css_url
        .map(|url| format!("<link rel=\"stylesheet\" href=\"{}\">\n", escape_html(url)))
        .unwrap_or_default();

    format!(
        concat!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n",
            "<meta charset=\"utf-8\">\n",
            "<title>{}</title>\n",
            "{}",
            "</head>\n<body>\n{}\n</body>\n</html>\n"
        ),
        escape_html(title),
        stylesheet,
        body,
    )
}

fn page_without_branding(title: &str, body: &str) -> String {
    page(
        title,
        &Branding {
            css_url: None,
            no_reserves_message: "",
        },
        body,
    )
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
