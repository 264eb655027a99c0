//! Plan generation workflow
//!
//! A goal becomes a session with one plan per style. Requests run
//! concurrently and land in the session in whatever order they finish.

mod generator;
mod response;

use thiserror::Error;

pub use generator::{
    ARCHITECTED_MESSAGE, GenerationReport, GeneratorOptions, PlanGenerator, SlotOutcome, UNAVAILABLE_MESSAGE,
};
pub use response::{PlanItem, PlanResponse, parse_plan, plan_response_schema};

use crate::state::StateError;

/// Errors from plan generation
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Plan response did not parse: {0}")]
    Parse(String),

    #[error("Prompt rendering failed: {0}")]
    Prompt(String),

    #[error("Generation task failed: {0}")]
    Task(String),

    #[error(transparent)]
    State(#[from] StateError),
}
