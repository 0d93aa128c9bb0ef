use std::path::PathBuf;
use std::process::ExitCode;

use kiln::diagnostics::{Error as CompileError, ErrorKind};

/// Failures of a `kiln` invocation.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    /// The component catalog is inconsistent.
    #[error("cannot load the component catalog: {0}")]
    Catalog(#[source] CompileError),
    /// The document does not compile.
    #[error(transparent)]
    Compile(#[from] CompileError),
    /// An output directory or file cannot be written.
    #[error("cannot write `{}`: {source}", path.display())]
    Io {
        /// The path being written.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
    /// An artifact cannot be serialized.
    #[error("cannot serialize `{name}`: {source}")]
    Json {
        /// The artifact name.
        name: &'static str,
        /// The underlying error.
        #[source]
        source: serde_json::Error,
    },
}

impl CliError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) const fn code(&self) -> u8 {
        match self {
            Self::Compile(error) => match error.kind() {
                ErrorKind::Validation | ErrorKind::Document | ErrorKind::Emission => 1,
                ErrorKind::UnsupportedTarget => 3,
                ErrorKind::Output | ErrorKind::Internal => 2,
            },
            Self::Catalog(_) | Self::Io { .. } | Self::Json { .. } => 2,
        }
    }

    pub(crate) fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }
}
