use std::path::PathBuf;
use std::time::Duration;

use plotty_core::{PlotError, PlotResult};
use plotty_live::{DEFAULT_HOST, DEFAULT_PORT};

use crate::monitor::{poll_interval_from_secs, SpeedPreset, DEFAULT_POLL_INTERVAL};

/// Monitor configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Explicit workspace root; discovered when `None`.
    pub workspace: Option<PathBuf>,
    /// Clamped poll interval.
    pub poll_interval: Duration,
    /// Keep polling instead of printing a single snapshot.
    pub follow: bool,
    /// Use pushed updates from the status service instead of polling.
    pub live: bool,
    pub ws_host: String,
    pub ws_port: u16,
    /// Clear the terminal before each frame.
    pub clear_screen: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            workspace: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            follow: false,
            live: false,
            ws_host: DEFAULT_HOST.to_string(),
            ws_port: DEFAULT_PORT,
            clear_screen: true,
        }
    }
}

impl MonitorConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var            | Default       |
    /// |--------------------|---------------|
    /// | `PLOTTY_WORKSPACE` | discovered    |
    /// | `PLOTTY_POLL_RATE` | `1.0` seconds |
    /// | `PLOTTY_SPEED`     | unset (`fast` / `slow` override the rate) |
    /// | `PLOTTY_FOLLOW`    | `false`       |
    /// | `PLOTTY_LIVE`      | `false`       |
    /// | `PLOTTY_WS_HOST`   | `localhost`   |
    /// | `PLOTTY_WS_PORT`   | `8765`        |
    /// | `PLOTTY_CLEAR`     | `true`        |
    pub fn from_env() -> PlotResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> PlotResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let workspace = var("PLOTTY_WORKSPACE").map(PathBuf::from);

        let mut poll_interval = match var("PLOTTY_POLL_RATE") {
            Some(raw) => {
                let secs: f64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| invalid("PLOTTY_POLL_RATE", &raw, "a number of seconds"))?;
                if secs.is_nan() {
                    return Err(invalid("PLOTTY_POLL_RATE", &raw, "a number of seconds"));
                }
                poll_interval_from_secs(secs)
            }
            None => defaults.poll_interval,
        };

        if let Some(raw) = var("PLOTTY_SPEED") {
            let preset: SpeedPreset = raw
                .parse()
                .map_err(|e: String| PlotError::config(e, Some("PLOTTY_SPEED".into())))?;
            poll_interval = preset.interval();
        }

        let follow = parse_bool(&var, "PLOTTY_FOLLOW", defaults.follow)?;
        let live = parse_bool(&var, "PLOTTY_LIVE", defaults.live)?;
        let clear_screen = parse_bool(&var, "PLOTTY_CLEAR", defaults.clear_screen)?;

        let ws_host = var("PLOTTY_WS_HOST").unwrap_or(defaults.ws_host);
        let ws_port = match var("PLOTTY_WS_PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| invalid("PLOTTY_WS_PORT", &raw, "a port number"))?,
            None => defaults.ws_port,
        };

        Ok(Self {
            workspace,
            poll_interval,
            follow,
            live,
            ws_host,
            ws_port,
            clear_screen,
        })
    }
}

fn parse_bool<F>(var: &F, key: &str, default: bool) -> PlotResult<bool>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = var(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, &raw, "true or false")),
    }
}

fn invalid(key: &str, raw: &str, expected: &str) -> PlotError {
    PlotError::config(
        format!("{key} must be {expected}, got '{raw}'"),
        Some(key.to_string()),
    )
}
