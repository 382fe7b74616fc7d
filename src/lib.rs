//! Mailweave: Email Thread Generation Engine
//!
//! Turns storyline beats (a target email count and a date window) into branching email
//! threads with validated bodies, reply/forward structure, planned attachments and narrative
//! continuity, while tolerating unreliable output from the completion capability.

pub mod attachments;
pub mod carryover;
pub mod cli;
pub mod config;
pub mod error;
pub mod facts;
pub mod generation;
pub mod input;
pub mod logging;
pub mod model;
pub mod orchestrator;
pub mod planning;
pub mod progress;
pub mod provider;
pub mod rng;
pub mod sink;
pub mod topics;
