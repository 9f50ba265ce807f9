use std::io;

/// Reasons a launch did not produce a running child.
///
/// None of these leave a trace in the job table.
#[derive(thiserror::Error, Debug)]
pub enum LaunchError {
    #[error("empty command")]
    EmptyCommand,

    /// The program does not exist on `PATH`.
    #[error("command not found")]
    NotFound { program: String },

    #[error("permission denied")]
    PermissionDenied { program: String },

    /// The OS refused to create the process (for example, resources exhausted).
    #[error("failed to start process: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to wait for process: {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },
}

impl LaunchError {
    pub(crate) fn from_spawn(program: &str, source: io::Error) -> Self {
        let program = program.to_string();
        match source.kind() {
            io::ErrorKind::NotFound => LaunchError::NotFound { program },
            io::ErrorKind::PermissionDenied => LaunchError::PermissionDenied { program },
            _ => LaunchError::Spawn { program, source },
        }
    }

    /// The program the error is about, used as the diagnostic prefix.
    pub fn program(&self) -> Option<&str> {
        match self {
            LaunchError::EmptyCommand => None,
            LaunchError::NotFound { program }
            | LaunchError::PermissionDenied { program }
            | LaunchError::Spawn { program, .. }
            | LaunchError::Wait { program, .. } => Some(program),
        }
    }
}
