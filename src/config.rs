//! Server configuration.
//!
//! [`ServerConfig::default`] matches the reference game: a 6 × 9 board,
//! up to four players per room and six-character room codes. Use the
//! `with_*` builders or [`ServerConfig::from_env`] to adjust it.
//!
//! # Example
//!
//! ```
//! use chain_reaction_server::config::ServerConfig;
//!
//! let config = ServerConfig::default()
//!     .with_bind_address("127.0.0.1:4000")
//!     .with_default_grid(8, 8);
//! assert_eq!(config.default_grid_rows, 8);
//! assert_eq!(config.max_players, 4);
//! ```

use std::time::Duration;

use tracing::warn;

use crate::grid::DEFAULT_CASCADE_LIMIT;

/// Default listen address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3001";

/// Default number of grid rows for new rooms.
pub const DEFAULT_GRID_ROWS: u32 = 6;

/// Default number of grid columns for new rooms.
pub const DEFAULT_GRID_COLS: u32 = 9;

/// Smallest board side length a room may use.
pub const MIN_GRID_DIMENSION: u32 = 2;

/// Default largest board side length a room may request.
pub const DEFAULT_MAX_GRID_DIMENSION: u32 = 32;

/// Default room capacity.
pub const DEFAULT_MAX_PLAYERS: usize = 4;

/// Default length of generated room codes.
pub const DEFAULT_ROOM_CODE_LENGTH: usize = 6;

/// Default time a new TCP client has to complete the WebSocket handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for a Chain Reaction server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_address: String,
    /// Rows used when `create_room` omits `gridRows` (or sends 0).
    pub default_grid_rows: u32,
    /// Columns used when `create_room` omits `gridCols` (or sends 0).
    pub default_grid_cols: u32,
    /// Requested dimensions are clamped into `[2, max_grid_dimension]`.
    pub max_grid_dimension: u32,
    /// Maximum number of players per room.
    pub max_players: usize,
    /// Number of characters in generated room codes.
    pub room_code_length: usize,
    /// Upper bound on cascade passes per move.
    pub cascade_limit: usize,
    /// Accepted sockets that have not finished the WebSocket handshake by
    /// then are dropped.
    pub handshake_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            default_grid_rows: DEFAULT_GRID_ROWS,
            default_grid_cols: DEFAULT_GRID_COLS,
            max_grid_dimension: DEFAULT_MAX_GRID_DIMENSION,
            max_players: DEFAULT_MAX_PLAYERS,
            room_code_length: DEFAULT_ROOM_CODE_LENGTH,
            cascade_limit: DEFAULT_CASCADE_LIMIT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Build a configuration from `HOST` and `PORT` environment variables.
    ///
    /// Unset variables keep the defaults. A `PORT` that is not a valid port
    /// number is logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let config = Self::default();
        let (default_host, default_port) = config
            .bind_address
            .rsplit_once(':')
            .unwrap_or(("0.0.0.0", "3001"));

        let host = lookup("HOST")
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| default_host.to_string());
        let port = match lookup("PORT") {
            Some(raw) => match raw.trim().parse::<u16>() {
                Ok(port) => port.to_string(),
                Err(e) => {
                    warn!(port = %raw, "ignoring invalid PORT: {e}");
                    default_port.to_string()
                }
            },
            None => default_port.to_string(),
        };

        config.with_bind_address(format!("{host}:{port}"))
    }

    /// Set the listen address.
    #[must_use]
    pub fn with_bind_address(mut self, address: impl Into<String>) -> Self {
        self.bind_address = address.into();
        self
    }

    /// Set the board size used when clients do not request one.
    ///
    /// Values are clamped into the allowed dimension range.
    #[must_use]
    pub fn with_default_grid(mut self, rows: u32, cols: u32) -> Self {
        self.default_grid_rows = rows.clamp(MIN_GRID_DIMENSION, self.max_grid_dimension);
        self.default_grid_cols = cols.clamp(MIN_GRID_DIMENSION, self.max_grid_dimension);
        self
    }

    /// Set the largest board side length. Values below 2 are raised to 2.
    #[must_use]
    pub fn with_max_grid_dimension(mut self, max: u32) -> Self {
        self.max_grid_dimension = max.max(MIN_GRID_DIMENSION);
        self
    }

    /// Set the room capacity. Values below 2 are raised to 2.
    #[must_use]
    pub fn with_max_players(mut self, max_players: usize) -> Self {
        self.max_players = max_players.max(2);
        self
    }

    /// Set the generated room code length. Values below 4 are raised to 4.
    #[must_use]
    pub fn with_room_code_length(mut self, length: usize) -> Self {
        self.room_code_length = length.max(4);
        self
    }

    /// Set the cascade pass limit. Values below 1 are raised to 1.
    #[must_use]
    pub fn with_cascade_limit(mut self, limit: usize) -> Self {
        self.cascade_limit = limit.max(1);
        self
    }

    /// Set the WebSocket handshake deadline.
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Resolve a requested `(rows, cols)` pair into the board size a new room
    /// will use. Missing or zero values fall back to the defaults; negative
    /// values clamp up to the minimum.
    pub fn grid_dimensions(&self, rows: Option<i64>, cols: Option<i64>) -> (u32, u32) {
        let min = i64::from(MIN_GRID_DIMENSION);
        let max = i64::from(self.max_grid_dimension);
        let pick = |requested: Option<i64>, default: u32| match requested {
            None | Some(0) => default,
            Some(n) => u32::try_from(n.clamp(min, max)).unwrap_or(MIN_GRID_DIMENSION),
        };
        (
            pick(rows, self.default_grid_rows),
            pick(cols, self.default_grid_cols),
        )
    }
}
