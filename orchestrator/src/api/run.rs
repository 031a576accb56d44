use std::sync::Arc;

use tracing::{error, info};
use warp::{Rejection, Reply};

use crate::error::ApiError;
use crate::models::{RunRequest, RunResponse};
use crate::pipeline::Pipeline;

pub async fn handle_run(
    request: RunRequest,
    pipeline: Arc<Pipeline>,
) -> Result<impl Reply, Rejection> {
    let task = request.task;
    if task.trim().is_empty() {
        return Err(warp::reject::custom(ApiError::BadRequest(
            "task must not be empty".to_string(),
        )));
    }

    info!("Processing task: {}", task);
    match pipeline.run(&task).await {
        Ok(state) => Ok(warp::reply::json(&RunResponse::from(state))),
        Err(e) => {
            error!("Pipeline run aborted: {}", e);
            Err(warp::reject::custom(ApiError::Pipeline(e)))
        }
    }
}
