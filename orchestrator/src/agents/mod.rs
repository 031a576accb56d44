pub mod planner;
pub mod executor;
pub mod verifier;

pub use executor::ExecutorAgent;
pub use planner::PlannerAgent;
pub use verifier::VerifierAgent;
