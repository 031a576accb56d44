// Verifier Agent: Validates execution results and produces the final answer

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::PipelineError;
use crate::llm::{LanguageModel, Prompt};

pub const EMPTY_INPUT: &str = "No results to verify - execution returned empty output.";

const SYSTEM_PROMPT: &str = "You are a Verifier agent.\n\
Validate execution results and produce a clean final answer.\n\
Do NOT call tools.";

pub struct VerifierAgent {
    model: Arc<dyn LanguageModel>,
}

impl VerifierAgent {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// The model's answer is returned untouched.
    pub async fn verify(&self, execution_result: &str) -> Result<String, PipelineError> {
        if execution_result.trim().is_empty() {
            warn!("Verifier: execution result is empty, skipping model call");
            return Ok(EMPTY_INPUT.to_string());
        }

        info!("Verifier: Validating execution result");
        let prompt = Prompt::new(SYSTEM_PROMPT, execution_result);
        Ok(self.model.complete(&prompt).await?)
    }
}
