use std::net::SocketAddr;
use std::sync::Arc;

use warp::{Filter, Rejection, Reply};

use crate::abuse::client_ip;
use crate::app::AppState;

/// Builds the full warp filter tree: banned-IP admission, CORS, the session
/// cookie lookup, the WebSocket upgrade, health and metrics routes.
pub fn routes(app: Arc<AppState>) -> warp::filters::BoxedFilter<(impl Reply,)> {
    let cors = warp::cors()
        .allow_origin(app.config.web_url.as_str())
        .allow_credentials(true)
        .allow_headers(vec!["content-type"])
        .allow_methods(vec!["GET", "POST", "PUT", "DELETE"]);

    let ws_route = ws_filter(app);
    let metrics_route = warp::path("metrics")
        .and(warp::get())
        .map(metrics_handler)
        .map(|r: String| r.into_response());
    let health_route = crate::health::routes().map(Reply::into_response);

    ws_route
        .or(health_route)
        .unify()
        .or(metrics_route)
        .unify()
        .recover(handle_rejection)
        .with(cors)
        .boxed()
}

fn ws_filter(
    app: Arc<AppState>,
) -> impl Filter<Extract = (warp::reply::Response,), Error = Rejection> + Clone {
    warp::path("ws")
        .and(warp::ws())
        .and(with_app(app))
        .and(warp::header::optional::<String>("x-forwarded-for"))
        .and(warp::addr::remote())
        .and(warp::filters::cookie::optional("session"))
        .and_then(upgrade)
}

fn with_app(
    app: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || app.clone())
}

async fn upgrade(
    ws: warp::ws::Ws,
    app: Arc<AppState>,
    forwarded_for: Option<String>,
    remote_addr: Option<SocketAddr>,
    session_cookie: Option<String>,
) -> Result<warp::reply::Response, Rejection> {
    let ip = client_ip(forwarded_for.as_deref(), remote_addr);
    if app.abuse_list.is_banned(&ip) {
        tracing::warn!(ip = %ip, "rejected connection from banned ip");
        return Err(warp::reject::custom(Forbidden));
    }

    let user = match session_cookie {
        Some(cookie) if !cookie.is_empty() => app
            .store
            .get_user_from_session(&cookie)
            .await
            .unwrap_or(None),
        _ => None,
    };

    Ok(ws.on_upgrade(move |socket| crate::dispatcher::handle_connection(socket, app, user))
        .into_response())
}

fn metrics_handler() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = vec![];
    let metric_families = prometheus::gather();
    let _ = encoder.encode(&metric_families, &mut buffer);
    String::from_utf8(buffer).unwrap_or_default()
}

#[derive(Debug)]
struct Forbidden;
impl warp::reject::Reject for Forbidden {}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, std::convert::Infallible> {
    if err.find::<Forbidden>().is_some() {
        Ok(warp::reply::with_status(
            "banned",
            warp::http::StatusCode::FORBIDDEN,
        ))
    } else {
        Ok(warp::reply::with_status(
            "not found",
            warp::http::StatusCode::NOT_FOUND,
        ))
    }
}
