use std::fmt;
use std::fs::DirBuilder;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::defaults::default_socket_mode;

const MAX_MODE: u32 = 0o7777;
const PARENT_DIRECTORY_MODE: u32 = 0o755;

/// Declarative configuration for the daemon's Unix domain socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketSettings {
    path: Utf8PathBuf,
    mode: SocketMode,
    owner: SocketOwner,
}

impl SocketSettings {
    /// Builds settings for `path` with the default mode and no ownership change.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: default_socket_mode(),
            owner: SocketOwner::default(),
        }
    }

    /// Replaces the permission bits applied after binding.
    #[must_use]
    pub fn with_mode(mut self, mode: SocketMode) -> Self {
        self.mode = mode;
        self
    }

    /// Replaces the requested owner of the socket file.
    #[must_use]
    pub fn with_owner(mut self, owner: SocketOwner) -> Self {
        self.owner = owner;
        self
    }

    /// Filesystem path of the socket.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        self.path.as_ref()
    }

    /// Permission bits applied to the socket file.
    #[must_use]
    pub fn mode(&self) -> SocketMode {
        self.mode
    }

    /// Requested user and group for the socket file.
    #[must_use]
    pub fn owner(&self) -> &SocketOwner {
        &self.owner
    }

    /// Ensures the socket's parent directory exists.
    pub fn prepare_filesystem(&self) -> Result<(), SocketPreparationError> {
        let Some(parent) = self.path.parent() else {
            return Err(SocketPreparationError::MissingParent {
                path: self.path.clone(),
            });
        };
        if parent.as_str().is_empty() {
            return Ok(());
        }

        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(PARENT_DIRECTORY_MODE);
        }

        if let Err(source) = builder.create(parent.as_std_path())
            && source.kind() != std::io::ErrorKind::AlreadyExists
        {
            return Err(SocketPreparationError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            });
        }

        Ok(())
    }
}

impl fmt::Display for SocketSettings {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "unix://{}", self.path)
    }
}

/// Permission bits for the socket file, written and parsed in octal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketMode(u32);

impl SocketMode {
    /// Wraps raw permission bits.
    #[must_use]
    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw permission bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }
}

impl Default for SocketMode {
    fn default() -> Self {
        default_socket_mode()
    }
}

impl fmt::Display for SocketMode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{:#o}", self.0)
    }
}

impl FromStr for SocketMode {
    type Err = SocketModeParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        let digits = trimmed
            .strip_prefix("0o")
            .or_else(|| trimmed.strip_prefix("0O"))
            .unwrap_or(trimmed);
        let bits = u32::from_str_radix(digits, 8)
            .map_err(|_| SocketModeParseError::NotOctal(input.to_owned()))?;
        if bits > MAX_MODE {
            return Err(SocketModeParseError::OutOfRange(input.to_owned()));
        }
        Ok(Self(bits))
    }
}

/// Errors encountered while parsing a [`SocketMode`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SocketModeParseError {
    /// The text is not an octal number.
    #[error("invalid mode '{0}'; use octal format like 0666")]
    NotOctal(String),
    /// The value does not fit in the permission bits.
    #[error("mode '{0}' exceeds 07777")]
    OutOfRange(String),
}

/// A user or group given either by numeric id or by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerSpec {
    /// Numeric uid or gid.
    Id(u32),
    /// Name resolved against the system databases at startup.
    Name(String),
}

impl fmt::Display for OwnerSpec {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(formatter, "{id}"),
            Self::Name(name) => formatter.write_str(name),
        }
    }
}

impl FromStr for OwnerSpec {
    type Err = OwnerParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(OwnerParseError::Empty);
        }
        if trimmed.bytes().all(|byte| byte.is_ascii_digit()) {
            return trimmed
                .parse()
                .map(Self::Id)
                .map_err(|_| OwnerParseError::IdOutOfRange(trimmed.to_owned()));
        }
        Ok(Self::Name(trimmed.to_owned()))
    }
}

/// Errors encountered while parsing an [`OwnerSpec`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OwnerParseError {
    /// Blank input.
    #[error("owner must not be empty")]
    Empty,
    /// Numeric id does not fit in 32 bits.
    #[error("numeric id '{0}' is out of range")]
    IdOutOfRange(String),
}

/// Requested ownership of the socket file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SocketOwner {
    /// Owning user, if one was requested.
    pub user: Option<OwnerSpec>,
    /// Owning group, if one was requested.
    pub group: Option<OwnerSpec>,
}

impl SocketOwner {
    /// Returns `true` when neither a user nor a group was requested.
    #[must_use]
    pub fn is_unset(&self) -> bool {
        self.user.is_none() && self.group.is_none()
    }
}

/// Errors raised when preparing socket directories.
#[derive(Debug, Error)]
pub enum SocketPreparationError {
    /// The socket path has no parent component.
    #[error("socket path '{path}' has no parent directory")]
    MissingParent { path: Utf8PathBuf },
    /// Failed to create the socket directory.
    #[error("failed to create socket directory '{path}': {source}")]
    CreateDirectory {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}
