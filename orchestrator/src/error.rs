use thiserror::Error;
use warp::{reject::Reject, Reply, Rejection};

/// Failures that escape an action. Everything else an action encounters is
/// returned to the caller as an `error` payload.
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("{0} not found. Please set it in your .env file.")]
    MissingConfig(&'static str),

    #[error("{0} is not a valid tool, try one of the listed tools")]
    UnknownAction(String),

    #[error("invalid arguments for {action}: {reason}")]
    InvalidArguments { action: String, reason: String },
}

impl ActionError {
    /// Only deployment defects abort a run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ActionError::MissingConfig(_))
    }
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("http error: {0}")]
    Http(String),

    #[error("response error: {0}")]
    Response(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("tool-calling agent did not finish within {0} steps")]
    StepLimit(usize),
}

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("planner output is not valid JSON: {source}")]
    Parse {
        #[source]
        source: serde_json::Error,
        raw: String,
    },

    #[error("planner output must be a JSON object or array, got {kind}")]
    NotStructured { kind: &'static str, raw: String },

    #[error("plan failed validation: {0}")]
    Validation(String),
}

/// Any of these aborts the whole run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("action error: {0}")]
    Action(#[from] ActionError),
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl Reject for ApiError {}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Rejection> {
    if let Some(api_err) = err.find::<ApiError>() {
        let (code, message) = match api_err {
            ApiError::BadRequest(_) => (400, "Bad request"),
            ApiError::Pipeline(PipelineError::Plan(_)) => (422, "Planner produced an unusable plan"),
            ApiError::Pipeline(_) => (500, "Internal server error"),
        };

        let json = warp::reply::json(&serde_json::json!({
            "error": message,
            "details": api_err.to_string(),
        }));

        let status = warp::http::StatusCode::from_u16(code)
            .unwrap_or(warp::http::StatusCode::INTERNAL_SERVER_ERROR);
        Ok(warp::reply::with_status(json, status))
    } else {
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_missing_config_is_fatal() {
        assert!(ActionError::MissingConfig("WEATHER_API_KEY").is_fatal());
        assert!(!ActionError::UnknownAction("fly".into()).is_fatal());
        assert!(!ActionError::InvalidArguments {
            action: "get_weather".into(),
            reason: "missing field `city`".into(),
        }
        .is_fatal());
    }

    #[test]
    fn missing_config_names_the_variable() {
        let err = ActionError::MissingConfig("EXCHANGE_RATE_API_KEY");
        assert_eq!(
            err.to_string(),
            "EXCHANGE_RATE_API_KEY not found. Please set it in your .env file."
        );
    }

    #[tokio::test]
    async fn plan_errors_map_to_unprocessable_entity() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = ApiError::Pipeline(PipelineError::Plan(PlanError::Parse {
            source,
            raw: "{".into(),
        }));
        let reply = handle_rejection(warp::reject::custom(err)).await.ok().unwrap();
        let response = reply.into_response();
        assert_eq!(response.status(), 422);
    }

    #[tokio::test]
    async fn foreign_rejections_pass_through() {
        assert!(handle_rejection(warp::reject::not_found()).await.is_err());
    }
}
