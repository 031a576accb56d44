use std::sync::Arc;

use tracing::info;
use warp::{Rejection, Reply};

use crate::pipeline::Pipeline;

pub async fn handle_list_actions(pipeline: Arc<Pipeline>) -> Result<impl Reply, Rejection> {
    info!("Listing registered actions");
    Ok(warp::reply::json(&pipeline.actions().descriptors()))
}
