//! CLI output: error mapping from engine errors to stable CLI surface.

use crate::error::EngineError;

/// Map engine errors to a string for CLI output.
pub fn map_error(e: &EngineError) -> String {
    match e {
        EngineError::ContractViolation(_) => {
            format!("{}\n\nThe generation input is inconsistent; nothing was generated.", e)
        }
        EngineError::Cancelled => "Generation cancelled; threads saved so far are kept.".to_string(),
        _ => e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_violations_explain_that_nothing_ran() {
        let message = map_error(&EngineError::ContractViolation("Beat 'b1' mismatch".into()));
        assert!(message.starts_with("Contract violation: Beat 'b1' mismatch"));
        assert!(message.contains("nothing was generated"));
    }
}
