// Application configuration, loaded from environment variables and CLI flags.

use std::path::PathBuf;

use crate::engine::config::DEFAULT_TICK_INTERVAL_MS;

/// Application configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// TCP port of the game socket.
    pub game_port: u16,
    /// Port of the HTTP admin API.
    pub admin_port: u16,
    /// Global tick interval in milliseconds.
    pub tick_ms: u64,
    /// Directory with `maps/`, `champions.json` and `troops.json`.
    /// Built-in data is used when unset.
    pub data_dir: Option<PathBuf>,
    /// Maximum number of concurrently running matches.
    pub max_matches: usize,
    /// Whether to run in local mode (plain user ids as tokens, test matches).
    pub local_mode: bool,
    /// Seed for per-match randomness. Entropy when unset.
    pub rng_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            game_port: 7070,
            admin_port: 7071,
            tick_ms: DEFAULT_TICK_INTERVAL_MS,
            data_dir: None,
            max_matches: 64,
            local_mode: false,
            rng_seed: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables and CLI arguments.
    ///
    /// Environment variables:
    /// - `GAME_PORT` - game socket port (default: 7070)
    /// - `ADMIN_PORT` - admin HTTP port (default: 7071)
    /// - `TICK_INTERVAL_MS` - tick interval (default: 50)
    /// - `GAME_DATA_DIR` - path to game data
    /// - `MAX_MATCHES` - concurrent match capacity (default: 64)
    /// - `ARENA_LOCAL_MODE` - set to `true` to enable local mode
    /// - `RNG_SEED` - fixed seed for match randomness
    ///
    /// CLI flags take precedence:
    /// - `--port <PORT>`, `--admin-port <PORT>`, `--tick-ms <MS>`, `--data-dir <DIR>`
    /// - `--local` - enable local mode
    pub fn load() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_sources(&args, |key| std::env::var(key).ok())
    }

    /// Resolves settings from CLI args first, then `env`, then defaults.
    pub fn from_sources(args: &[String], env: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Config::default();

        let game_port = Self::parse_cli_value(args, "--port")
            .and_then(|v| v.parse().ok())
            .or_else(|| env("GAME_PORT").and_then(|v| v.parse().ok()))
            .unwrap_or(defaults.game_port);

        let admin_port = Self::parse_cli_value(args, "--admin-port")
            .and_then(|v| v.parse().ok())
            .or_else(|| env("ADMIN_PORT").and_then(|v| v.parse().ok()))
            .unwrap_or(defaults.admin_port);

        let tick_ms = Self::parse_cli_value(args, "--tick-ms")
            .and_then(|v| v.parse().ok())
            .or_else(|| env("TICK_INTERVAL_MS").and_then(|v| v.parse().ok()))
            .filter(|ms: &u64| *ms > 0)
            .unwrap_or(defaults.tick_ms);

        let data_dir = Self::parse_cli_value(args, "--data-dir")
            .or_else(|| env("GAME_DATA_DIR"))
            .map(PathBuf::from);

        let max_matches = env("MAX_MATCHES")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_matches);

        let local_mode = args.iter().any(|a| a == "--local")
            || env("ARENA_LOCAL_MODE")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false);

        let rng_seed = env("RNG_SEED").and_then(|v| v.parse().ok());

        Config {
            game_port,
            admin_port,
            tick_ms,
            data_dir,
            max_matches,
            local_mode,
            rng_seed,
        }
    }

    /// Parse a CLI flag value like `--port 8080`.
    fn parse_cli_value(args: &[String], flag: &str) -> Option<String> {
        args.windows(2).find_map(|pair| {
            if pair[0] == flag {
                Some(pair[1].clone())
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults_without_sources() {
        let cfg = Config::from_sources(&args(&["arena-backend"]), |_| None);
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.tick_ms, 50);
    }

    #[test]
    fn test_cli_overrides_env() {
        let env: HashMap<&str, &str> = [
            ("GAME_PORT", "9000"),
            ("TICK_INTERVAL_MS", "20"),
            ("GAME_DATA_DIR", "/env/data"),
            ("MAX_MATCHES", "3"),
            ("RNG_SEED", "42"),
        ]
        .into_iter()
        .collect();
        let cfg = Config::from_sources(
            &args(&["bin", "--port", "9100", "--data-dir", "/cli/data", "--local"]),
            |k| env.get(k).map(|v| v.to_string()),
        );
        assert_eq!(cfg.game_port, 9100);
        assert_eq!(cfg.admin_port, 7071);
        assert_eq!(cfg.tick_ms, 20);
        assert_eq!(cfg.data_dir, Some(PathBuf::from("/cli/data")));
        assert_eq!(cfg.max_matches, 3);
        assert_eq!(cfg.rng_seed, Some(42));
        assert!(cfg.local_mode);
    }

    #[test]
    fn test_zero_tick_interval_falls_back() {
        let cfg = Config::from_sources(&args(&["bin", "--tick-ms", "0"]), |_| None);
        assert_eq!(cfg.tick_ms, 50);
    }
}
