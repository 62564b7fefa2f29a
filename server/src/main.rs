//! lti-courses-server: native HTTP adapter for the LTI course reserves tool
//!
//! Lightweight hyper http1 server on a single-threaded tokio runtime
//! (compatible with core's !Send async traits). Owns the composition root:
//! configuration, caches, tool keys, and the collaborator implementations.

use std::collections::HashMap;
use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use log::{error, info};

use lti_courses_core::cache::{DownloadTokenCache, OidcStateCache, TtlCache};
use lti_courses_core::catalog::{self, CatalogConfig, CourseIdType};
use lti_courses_core::config::Config;
use lti_courses_core::course::Course;
use lti_courses_core::download::{self, DOWNLOAD_PATH_PREFIX};
use lti_courses_core::error::{ApiError, ErrorResponse};
use lti_courses_core::lti::keys::ToolKeys;
use lti_courses_core::lti::{self, LaunchRequest, LoginInitRequest, LtiMessage, VerifiedLaunch};
use lti_courses_core::render::{Branding, Renderer, ReservesView};

mod platform;
mod render;

use platform::{ProcessEnv, ReqwestHttpClient, SystemClock};
use render::HtmlRenderer;

const RESERVES_PATH_PREFIX: &str = "/lti-courses/reserves/";

/// Shared application state
struct AppState {
    config: Config,
    catalog_config: CatalogConfig,
    oidc_cache: OidcStateCache,
    download_cache: DownloadTokenCache,
    http: ReqwestHttpClient,
    clock: SystemClock,
    renderer: HtmlRenderer,
    keys: ToolKeys,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();

    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".into())
        .parse()
        .expect("PORT must be a number");
    let request_timeout_ms: u64 = std::env::var("REQUEST_TIMEOUT_MS")
        .unwrap_or_else(|_| "10000".into())
        .parse()
        .expect("REQUEST_TIMEOUT_MS must be a number");

    let config = Config::from_env(&ProcessEnv).expect("configuration is incomplete");
    let keys = ToolKeys::from_config(&config).expect("tool keys failed to load");

    let state = Arc::new(AppState {
        catalog_config: CatalogConfig::new(config.catalog_url.as_str(), config.tenant.as_str()),
        oidc_cache: TtlCache::new(
            config.oidc_ttl_secs,
            config.oidc_null_ttl_secs,
            config.oidc_cache_capacity,
        ),
        download_cache: TtlCache::new(
            config.download_ttl_secs,
            config.download_ttl_secs,
            config.download_cache_capacity,
        ),
        http: ReqwestHttpClient::new(request_timeout_ms),
        clock: SystemClock,
        renderer: HtmlRenderer,
        keys,
        config,
    });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .expect("failed to bind");

    info!("lti-courses-server listening on port {}", port);

    loop {
        let (stream, _) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("accept failed: {}", e);
                continue;
            }
        };
        let state = state.clone();

        // Each connection is handled sequentially (single-threaded runtime)
        let io = hyper_util::rt::TokioIo::new(stream);
        let service = service_fn(move |req| {
            let state = state.clone();
            async move { handle_request(req, &state).await }
        });

        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
            error!("connection error: {}", e);
        }
    }
}

type HyperResponse = Response<Full<Bytes>>;

async fn handle_request(
    req: Request<Incoming>,
    state: &AppState,
) -> Result<HyperResponse, std::convert::Infallible> {
    Ok(route_request(req, state).await)
}

async fn route_request(req: Request<Incoming>, state: &AppState) -> HyperResponse {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    if method == Method::GET {
        if let Some(token) = path.strip_prefix(DOWNLOAD_PATH_PREFIX) {
            return handle_download(token.to_string(), state).await;
        }
        if let Some(listing_id) = path.strip_prefix(RESERVES_PATH_PREFIX) {
            return handle_reserves_by_id(listing_id.to_string(), state).await;
        }
    }

    match (method, path.as_str()) {
        (Method::GET, "/admin/health") => handle_health(),
        (Method::GET, "/lti-courses/oidc-login-init") => handle_login_init(req, state).await,
        (Method::POST, "/lti-courses/launches") => {
            handle_launch(req, state, CourseIdType::CourseNumber).await
        }
        (Method::POST, "/lti-courses/launches/externalId") => {
            handle_launch(req, state, CourseIdType::ExternalId).await
        }
        (Method::POST, "/lti-courses/launches/registrarId") => {
            handle_launch(req, state, CourseIdType::RegistrarId).await
        }
        (Method::GET, "/lti-courses/jwks") => handle_jwks(state),
        _ => json_response(
            StatusCode::NOT_FOUND,
            &serde_json::json!({"error": "not_found"}),
        ),
    }
}

fn handle_health() -> HyperResponse {
    json_response(
        StatusCode::OK,
        &serde_json::json!({
            "name": "lti-courses",
            "status": "ok"
        }),
    )
}

/// OIDC login initiation: answer with a 302 to the platform's authorization endpoint
async fn handle_login_init(req: Request<Incoming>, state: &AppState) -> HyperResponse {
    let params = parse_params(req.uri().query().unwrap_or("").as_bytes());

    let request = LoginInitRequest {
        iss: params.get("iss").cloned().unwrap_or_default(),
        login_hint: params.get("login_hint").cloned().unwrap_or_default(),
        target_link_uri: params.get("target_link_uri").cloned().unwrap_or_default(),
        lti_message_hint: params.get("lti_message_hint").cloned(),
    };

    match lti::initiate_login(
        &request,
        &state.oidc_cache,
        &state.http,
        &state.catalog_config,
        &state.clock,
    )
    .await
    {
        Ok(redirect) => Response::builder()
            .status(StatusCode::FOUND)
            .header("location", redirect)
            .body(Full::new(Bytes::new()))
            .unwrap(),
        Err(e) => error_response(&e),
    }
}

/// Verified launch: render reserves or answer a deep-linking request
async fn handle_launch(
    req: Request<Incoming>,
    state: &AppState,
    id_type: CourseIdType,
) -> HyperResponse {
    let body = match req.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => return error_response(&ApiError::invalid_request("failed to read body")),
    };
    let form = parse_params(&body);

    let request = LaunchRequest {
        id_token: form.get("id_token").cloned().unwrap_or_default(),
        state: form.get("state").cloned().unwrap_or_default(),
    };

    let verified = match lti::verify_launch(
        &request,
        &state.oidc_cache,
        &state.http,
        &state.catalog_config,
        &state.clock,
        state.config.ignore_oidc_state,
    )
    .await
    {
        Ok(verified) => verified,
        Err(e) => return error_response(&e),
    };

    match lti::dispatch(&verified.claims) {
        Ok(LtiMessage::ResourceLink) => render_resource_link(state, &verified, id_type).await,
        Ok(LtiMessage::DeepLinking) => render_deep_link(state, &verified, id_type).await,
        Err(e) => error_response(&e),
    }
}

/// Look up the launched course and render its current reserves
async fn render_resource_link(
    state: &AppState,
    verified: &VerifiedLaunch,
    id_type: CourseIdType,
) -> HyperResponse {
    let branding = Branding::from_platform(&verified.platform);

    let course = match fetch_course_for_launch(state, verified, id_type).await {
        Ok(Some(course)) => course,
        Ok(None) => return html_or_error(state.renderer.render_no_reserves(&branding)),
        Err(e) => return error_response(&e),
    };

    let mut current = course.current_reserves(now(state));

    if let Some(host) = &state.config.file_store_host {
        download::tokenize_file_links(
            &mut current,
            host,
            &state.config.tool_base_url,
            &state.download_cache,
            &state.clock,
        );
    }

    if current.is_empty() {
        return html_or_error(state.renderer.render_no_reserves(&branding));
    }

    html_or_error(state.renderer.render_reserves(&ReservesView {
        branding,
        reserves: &current,
    }))
}

/// Answer a deep-linking request with a signed response pointing at the
/// launched course's reserves endpoint
async fn render_deep_link(
    state: &AppState,
    verified: &VerifiedLaunch,
    id_type: CourseIdType,
) -> HyperResponse {
    let branding = Branding::from_platform(&verified.platform);

    let course = match fetch_course_for_launch(state, verified, id_type).await {
        Ok(Some(course)) => course,
        Ok(None) => return html_or_error(state.renderer.render_no_reserves(&branding)),
        Err(e) => return error_response(&e),
    };

    let content_url = format!(
        "{}{}{}",
        state.config.tool_base_url, RESERVES_PATH_PREFIX, course.course_listing_id
    );
    let content_title = verified
        .claims
        .context
        .as_ref()
        .and_then(|context| context.title.clone())
        .unwrap_or_else(|| "Course Reserves".to_string());

    let response = match lti::deep_link::build_response(
        &verified.claims,
        &verified.platform,
        &state.keys,
        &content_url,
        &content_title,
        &state.clock,
    ) {
        Ok(response) => response,
        Err(e) => return error_response(&e),
    };

    html_or_error(state.renderer.render_deep_link(&response))
}

/// Shared course lookup for both launch flavors: the LTI context claim names
/// the course, reserves are attached, the platform search URL fills gaps.
async fn fetch_course_for_launch(
    state: &AppState,
    verified: &VerifiedLaunch,
    id_type: CourseIdType,
) -> Result<Option<Course>, ApiError> {
    let course_title = verified
        .claims
        .context
        .as_ref()
        .and_then(|context| context.title.clone())
        .unwrap_or_default();

    if course_title.is_empty() {
        return Err(ApiError::invalid_request(
            "LTI context claim does not name a course",
        ));
    }

    info!("launch requested reserves for course '{}'", course_title);

    let Some(mut course) =
        catalog::get_course(id_type, &course_title, &state.http, &state.catalog_config).await?
    else {
        return Ok(None);
    };

    course.set_search_url(verified.platform.search_url.clone());

    let reserves = catalog::get_course_reserves(
        &course.course_listing_id,
        &state.http,
        &state.catalog_config,
    )
    .await?;
    course.set_reserves(reserves);

    Ok(Some(course))
}

/// The endpoint a deep-linked content item embeds: reserves by course listing id
async fn handle_reserves_by_id(listing_id: String, state: &AppState) -> HyperResponse {
    let branding = Branding::default();

    let course = match catalog::get_course(
        CourseIdType::ListingId,
        &listing_id,
        &state.http,
        &state.catalog_config,
    )
    .await
    {
        Ok(Some(course)) => course,
        Ok(None) => return html_or_error(state.renderer.render_no_reserves(&branding)),
        Err(e) => return error_response(&e),
    };

    let reserves = match catalog::get_course_reserves(
        &course.course_listing_id,
        &state.http,
        &state.catalog_config,
    )
    .await
    {
        Ok(reserves) => reserves,
        Err(e) => return error_response(&e),
    };

    let mut course = course;
    course.set_reserves(reserves);

    let mut current = course.current_reserves(now(state));

    if let Some(host) = &state.config.file_store_host {
        download::tokenize_file_links(
            &mut current,
            host,
            &state.config.tool_base_url,
            &state.download_cache,
            &state.clock,
        );
    }

    if current.is_empty() {
        return html_or_error(state.renderer.render_no_reserves(&branding));
    }

    html_or_error(state.renderer.render_reserves(&ReservesView {
        branding,
        reserves: &current,
    }))
}

/// Tool public key set, for platforms verifying deep-link responses
fn handle_jwks(state: &AppState) -> HyperResponse {
    json_response(StatusCode::OK, state.keys.jwks_document())
}

/// Proxy a tokenized file download
async fn handle_download(token: String, state: &AppState) -> HyperResponse {
    match download::fetch_download(&token, &state.download_cache, &state.http, &state.clock).await
    {
        Ok(payload) => Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "application/octet-stream")
            .header(
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", payload.file_name),
            )
            .body(Full::new(Bytes::from(payload.body)))
            .unwrap(),
        Err(e) => error_response(&e),
    }
}

fn now(state: &AppState) -> chrono::DateTime<chrono::Utc> {
    use lti_courses_core::platform::Clock;

    chrono::DateTime::from_timestamp(state.clock.now_secs() as i64, 0).unwrap_or_default()
}

fn parse_params(raw: &[u8]) -> HashMap<String, String> {
    url::form_urlencoded::parse(raw).into_owned().collect()
}

fn html_or_error(html: lti_courses_core::error::Result<String>) -> HyperResponse {
    match html {
        Ok(html) => Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "text/html;charset=UTF-8")
            .body(Full::new(Bytes::from(html)))
            .unwrap(),
        Err(e) => error_response(&e),
    }
}

fn error_response(err: &ApiError) -> HyperResponse {
    // The full reason stays in the log; the response body only carries the
    // public surface.
    error!("request failed: {}", err);

    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    json_response(status, &ErrorResponse::from(err))
}

fn json_response<T: serde::Serialize>(status: StatusCode, body: &T) -> HyperResponse {
    let json = serde_json::to_vec(body).unwrap_or_default();
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(json)))
        .unwrap()
}
