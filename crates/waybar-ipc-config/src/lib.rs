//! Shared configuration for the waybar IPC daemon.
//!
//! The daemon consumes three socket values (path, permission mode and an
//! optional owner) plus its logging preferences. Each value can be supplied on
//! the command line or through the environment; command-line flags take
//! precedence over environment variables, which take precedence over the
//! built-in defaults.

mod defaults;
mod logging;
mod socket;

use std::ffi::OsString;

use camino::Utf8PathBuf;
use clap::Parser;
use thiserror::Error;

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_SOCKET_MODE, DEFAULT_SOCKET_NAME, default_log_filter,
    default_log_format, default_socket_mode, default_socket_path,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{
    OwnerParseError, OwnerSpec, SocketMode, SocketModeParseError, SocketOwner,
    SocketPreparationError, SocketSettings,
};

/// Environment variable naming the socket path.
pub const SOCKET_FILE_ENV: &str = "SOCKET_FILE";
/// Environment variable naming the socket owner user.
pub const SOCKET_USER_ENV: &str = "SOCKET_USER";
/// Environment variable naming the socket owner group.
pub const SOCKET_GROUP_ENV: &str = "SOCKET_GROUP";
/// Environment variable holding the octal socket mode.
pub const SOCKET_MODE_ENV: &str = "SOCKET_MODE";
/// Environment variable holding the log filter expression.
pub const LOG_FILTER_ENV: &str = "WAYBAR_IPC_LOG";
/// Environment variable selecting the log output format.
pub const LOG_FORMAT_ENV: &str = "WAYBAR_IPC_LOG_FORMAT";

/// Resolved daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Socket endpoint, permissions and ownership.
    pub socket: SocketSettings,
    /// Filter expression for the tracing subscriber.
    pub log_filter: String,
    /// Output format for the tracing subscriber.
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket: SocketSettings::new(default_socket_path()),
            log_filter: default_log_filter().to_owned(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Loads configuration from the process arguments and environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_iter(std::env::args_os())
    }

    /// Loads configuration from an explicit argument list and the environment.
    ///
    /// The first item is treated as the binary name, matching
    /// [`std::env::args_os`].
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let parsed = ConfigArgs::try_parse_from(args).map_err(ConfigError::from_clap)?;
        Ok(parsed.into_config())
    }

    /// Socket endpoint, permissions and ownership.
    #[must_use]
    pub fn socket(&self) -> &SocketSettings {
        &self.socket
    }

    /// Filter expression for the tracing subscriber.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Output format for the tracing subscriber.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

/// Command-line surface of the daemon.
#[derive(Debug, Parser)]
#[command(
    name = "waybar-ipcd",
    version,
    about = "Serves waybar module methods over a Unix domain socket",
    after_help = "Examples:\n  \
        waybar-ipcd\n  \
        sudo waybar-ipcd -u myuser -g mygroup\n  \
        sudo waybar-ipcd -m 0660\n  \
        sudo waybar-ipcd -u waybar -g users -m 0664"
)]
struct ConfigArgs {
    /// Socket path [default: <temp dir>/waybar_modules.socket]
    #[arg(short = 's', long = "socket", env = SOCKET_FILE_ENV)]
    socket: Option<Utf8PathBuf>,
    /// Socket owner user (name or UID)
    #[arg(short = 'u', long = "user", env = SOCKET_USER_ENV)]
    user: Option<OwnerSpec>,
    /// Socket owner group (name or GID)
    #[arg(short = 'g', long = "group", env = SOCKET_GROUP_ENV)]
    group: Option<OwnerSpec>,
    /// Socket file permissions in octal
    #[arg(short = 'm', long = "mode", env = SOCKET_MODE_ENV, default_value = "0666")]
    mode: SocketMode,
    /// Tracing filter expression
    #[arg(long = "log-filter", env = LOG_FILTER_ENV, default_value = DEFAULT_LOG_FILTER)]
    log_filter: String,
    /// Log output format (compact or json)
    #[arg(long = "log-format", env = LOG_FORMAT_ENV, default_value_t = default_log_format())]
    log_format: LogFormat,
}

impl ConfigArgs {
    fn into_config(self) -> Config {
        let path = self.socket.unwrap_or_else(default_socket_path);
        let owner = SocketOwner {
            user: self.user,
            group: self.group,
        };
        Config {
            socket: SocketSettings::new(path)
                .with_mode(self.mode)
                .with_owner(owner),
            log_filter: self.log_filter,
            log_format: self.log_format,
        }
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Help or version output was requested instead of a configuration.
    #[error("{0}")]
    Display(clap::Error),
    /// A flag or environment value was rejected.
    #[error("invalid configuration: {0}")]
    Invalid(clap::Error),
}

impl ConfigError {
    fn from_clap(error: clap::Error) -> Self {
        use clap::error::ErrorKind;

        match error.kind() {
            ErrorKind::DisplayHelp
            | ErrorKind::DisplayVersion
            | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => Self::Display(error),
            _ => Self::Invalid(error),
        }
    }

    /// Writes the underlying message to the terminal the way `clap` would.
    pub fn print(&self) -> std::io::Result<()> {
        match self {
            Self::Display(error) | Self::Invalid(error) => error.print(),
        }
    }

    /// Returns `true` for help or version requests.
    #[must_use]
    pub fn is_display(&self) -> bool {
        matches!(self, Self::Display(_))
    }
}
