use warp::Filter;

/// Liveness route: `GET /healthz` replies 200 once the server has started
/// serving. Replaces the teacher's gRPC health-checking-protocol service —
/// there is no gRPC surface left to report on, just a plain HTTP probe for
/// container orchestrators.
pub fn routes() -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::path("healthz")
        .and(warp::get())
        .map(|| warp::reply::with_status("ok", warp::http::StatusCode::OK))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_healthz_returns_200() {
        let filter = routes();
        let res = warp::test::request().path("/healthz").reply(&filter).await;
        assert_eq!(res.status(), 200);
    }
}
