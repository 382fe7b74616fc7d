//! Property-based tests for planning and attachment carryover

mod carryover;
mod planning;
