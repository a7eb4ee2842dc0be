//! Error handling and display for the CLI.

use colored::Colorize;
use machinecfg_resource::{Diagnostic, ResourceError};
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("No state found at {0}")]
    NoState(String),

    #[error("Plan is incomplete: {0} is not known yet")]
    Incomplete(String),
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    let Some(resource_err) = err.downcast_ref::<ResourceError>() else {
        eprintln!("{} {:#}", "Error:".red().bold(), err);

        if let Some(CliError::NoState(_)) = err.downcast_ref::<CliError>() {
            eprintln!(
                "\n{}",
                "Hint: Run `mcfg apply` to create the record first.".yellow()
            );
        }
        return;
    };

    let diagnostic = Diagnostic::from(resource_err);
    eprintln!("{} {}", "Error:".red().bold(), diagnostic.summary);
    eprintln!("  {}", diagnostic.detail);

    if let Some(hint) = hint(resource_err) {
        eprintln!("\n{}", hint.yellow());
    }
}

fn hint(err: &ResourceError) -> Option<&'static str> {
    match err {
        ResourceError::Credentials(_) => {
            Some("Hint: client_configuration values must be base64-encoded PEM.")
        }
        ResourceError::ComputedAttributeSet(_) => Some(
            "Hint: machine_configuration is computed; set machine_configuration_input instead.",
        ),
        ResourceError::DeadlineExceeded { .. } => Some(
            "Hint: Check that the node is reachable at the endpoint, or raise timeouts.create/timeouts.update.",
        ),
        ResourceError::Rejected(_) => {
            Some("Hint: The node rejected the document; check it is valid for the node's version.")
        }
        ResourceError::Upgrade(_) => {
            Some("Hint: The state file was written by a newer or unknown version of mcfg.")
        }
        _ if err.is_configuration_error() => {
            Some("Hint: Fix the resource file and run `mcfg plan` again.")
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_hints() {
        assert!(hint(&ResourceError::MissingAttribute("node"))
            .unwrap()
            .contains("resource file"));
        assert!(hint(&ResourceError::DeadlineExceeded {
            elapsed: Duration::from_secs(1),
            attempts: 1,
            last: None,
        })
        .unwrap()
        .contains("reachable"));
    }
}
