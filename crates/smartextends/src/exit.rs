use std::process::ExitCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitStatus {
    Success,
    Error,
}

/// Outcome of a command, with an optional message for the user.
#[derive(Debug)]
pub struct Exit {
    status: ExitStatus,
    message: Option<String>,
}

impl Exit {
    pub fn success() -> Self {
        Self {
            status: ExitStatus::Success,
            message: None,
        }
    }

    pub fn error() -> Self {
        Self {
            status: ExitStatus::Error,
            message: None,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Print the message, unless `quiet`, and convert to a process exit code.
    ///
    /// Error messages go to stderr so they never mix with rendered output.
    pub fn process(self, quiet: bool) -> ExitCode {
        if let Some(message) = self.message.as_deref().filter(|_| !quiet) {
            match self.status {
                ExitStatus::Success => println!("{message}"),
                ExitStatus::Error => eprintln!("{message}"),
            }
        }
        self.code()
    }

    fn code(&self) -> ExitCode {
        match self.status {
            ExitStatus::Success => ExitCode::SUCCESS,
            ExitStatus::Error => ExitCode::FAILURE,
        }
    }
}
