//! Integration tests for thread generation, attachment carryover and multi-thread runs

mod attachment_carryover;
mod orchestrator_run;
mod test_utils;
mod thread_generation;
