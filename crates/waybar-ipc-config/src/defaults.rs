use std::env;

use camino::Utf8PathBuf;

use crate::logging::LogFormat;
use crate::socket::SocketMode;

/// File name of the socket placed in the system temporary directory.
pub const DEFAULT_SOCKET_NAME: &str = "waybar_modules.socket";

/// Default permission bits applied to the socket file.
pub const DEFAULT_SOCKET_MODE: u32 = 0o666;

/// Default log filter expression used by the daemon.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default log filter expression used by the daemon.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format for the daemon.
pub fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Default permission bits for the socket file.
pub fn default_socket_mode() -> SocketMode {
    SocketMode::new(DEFAULT_SOCKET_MODE)
}

/// Computes the default socket path under the system temporary directory.
pub fn default_socket_path() -> Utf8PathBuf {
    let base = Utf8PathBuf::from_path_buf(env::temp_dir())
        .unwrap_or_else(|_| Utf8PathBuf::from("/tmp"));
    base.join(DEFAULT_SOCKET_NAME)
}
