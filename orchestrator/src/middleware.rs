use std::time::Duration;

use tracing::info;

/// The API is read-and-run only: browsers may GET the catalog and POST tasks.
pub fn cors() -> warp::cors::Builder {
    warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["Content-Type", "Accept", "Origin", "User-Agent"])
        .allow_methods(vec!["POST", "GET", "OPTIONS"])
        .max_age(Duration::from_secs(600))
}

/// Request log line with method, path, status and latency.
pub fn access_log() -> warp::log::Log<impl Fn(warp::log::Info<'_>) + Clone> {
    warp::log::custom(|req| {
        info!(
            method = %req.method(),
            path = req.path(),
            status = req.status().as_u16(),
            elapsed_ms = req.elapsed().as_millis() as u64,
            "api request"
        );
    })
}
