// src/policy.rs

//! Exit-code propagation policies.
//!
//! The two commands deliberately report failures differently:
//!
//! - `Swallow` (supervisor): a launch that failed is a transient race as far
//!   as the scheduler is concerned; it is logged, and the command exits 0.
//! - `Propagate` (dispatcher): the worker's exit code is the task's business
//!   outcome and becomes the command's exit code unchanged.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagationPolicy {
    Swallow,
    Propagate,
}

impl PropagationPolicy {
    pub fn exit_code(self, outcome_code: i32) -> i32 {
        match self {
            PropagationPolicy::Swallow => 0,
            PropagationPolicy::Propagate => outcome_code,
        }
    }
}
