use std::process::ExitStatus;

use thiserror::Error;

/// Generator failures. Both variants abort the publish pipeline.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to start generator `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("generator `{program}` exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
}
