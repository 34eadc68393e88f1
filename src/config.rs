//! Application-level configuration loading: match rules, opponent tuning,
//! matchmaking policy and the question generator endpoint.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, DurationSeconds, serde_as};
use tracing::{info, warn};

use crate::{
    dao::models::MatchmakingPolicy,
    match_engine::{
        driver::MatchTiming,
        opponent::OpponentProfile,
        resolver::DamageTable,
        session::MatchRules,
    },
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUIZ_CLASH_BACK_CONFIG_PATH";
/// Environment variable that overrides the question generator base URL.
const QUESTION_SOURCE_ENV: &str = "QUESTION_SOURCE_URL";
/// Topic used when a request leaves it blank.
pub const DEFAULT_TOPIC: &str = "General Knowledge";

#[derive(Debug, Clone, PartialEq)]
/// Where questions are generated.
pub struct QuestionSourceConfig {
    /// Base URL of the generator; `POST {base_url}/predict` is called.
    pub base_url: String,
    /// Upper bound on one generation request.
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Countdown budget and damage table of every match.
    pub rules: MatchRules,
    /// Resolution pause and finished-match retention.
    pub timing: MatchTiming,
    /// Simulated opponent tuning.
    pub opponent: OpponentProfile,
    /// Fixed opponent name; a random roster name is used when absent.
    pub default_opponent_name: Option<String>,
    /// Lobby join window and player cap.
    pub matchmaking: MatchmakingPolicy,
    /// Topic used when requests do not name one.
    pub default_topic: String,
    /// Question generator; the built-in question is served when absent.
    pub question_source: Option<QuestionSourceConfig>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        round_secs = app_config.rules.round_duration_secs,
                        generator = app_config.question_source.is_some(),
                        "loaded match configuration from config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        config.with_question_source_override(env::var(QUESTION_SOURCE_ENV).ok())
    }

    /// Replace the generator base URL when `base_url` is a non-empty value.
    pub fn with_question_source_override(mut self, base_url: Option<String>) -> Self {
        let Some(base_url) = base_url.filter(|url| !url.trim().is_empty()) else {
            return self;
        };

        let timeout = self
            .question_source
            .as_ref()
            .map(|source| source.timeout)
            .unwrap_or(RawQuestionSource::DEFAULT_TIMEOUT);
        info!(base_url = %base_url, "question generator overridden from environment");
        self.question_source = Some(QuestionSourceConfig {
            base_url: base_url.trim().to_string(),
            timeout,
        });
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(rename = "match")]
    match_settings: RawMatch,
    opponent: OpponentProfile,
    matchmaking: RawMatchmaking,
    question_source: Option<RawQuestionSource>,
}

#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawMatch {
    round_duration_secs: u32,
    damage: DamageTable,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    resolution_pause_ms: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    finished_match_retention_secs: Duration,
    default_opponent_name: Option<String>,
}

impl Default for RawMatch {
    fn default() -> Self {
        let timing = MatchTiming::default();
        Self {
            round_duration_secs: MatchRules::default().round_duration_secs,
            damage: DamageTable::default(),
            resolution_pause_ms: timing.resolution_pause,
            finished_match_retention_secs: timing.retention,
            default_opponent_name: None,
        }
    }
}

#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawMatchmaking {
    #[serde_as(as = "DurationSeconds<u64>")]
    window_secs: Duration,
    player_cap: usize,
    default_topic: String,
}

impl Default for RawMatchmaking {
    fn default() -> Self {
        let policy = MatchmakingPolicy::default();
        Self {
            window_secs: policy.window,
            player_cap: policy.player_cap,
            default_topic: DEFAULT_TOPIC.to_string(),
        }
    }
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct RawQuestionSource {
    base_url: String,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "RawQuestionSource::default_timeout")]
    timeout_ms: Duration,
}

impl RawQuestionSource {
    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    fn default_timeout() -> Duration {
        Self::DEFAULT_TIMEOUT
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let RawConfig {
            match_settings,
            opponent,
            matchmaking,
            question_source,
        } = value;

        let default_topic = match matchmaking.default_topic.trim() {
            "" => DEFAULT_TOPIC.to_string(),
            topic => topic.to_string(),
        };

        Self {
            rules: MatchRules {
                round_duration_secs: match_settings.round_duration_secs.max(1),
                damage: match_settings.damage,
            },
            timing: MatchTiming {
                resolution_pause: match_settings.resolution_pause_ms,
                retention: match_settings.finished_match_retention_secs,
            },
            opponent: opponent.sanitized(),
            default_opponent_name: match_settings
                .default_opponent_name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            matchmaking: MatchmakingPolicy {
                window: matchmaking.window_secs,
                player_cap: matchmaking.player_cap.max(1),
            },
            default_topic,
            question_source: question_source
                .filter(|source| !source.base_url.trim().is_empty())
                .map(|source| QuestionSourceConfig {
                    base_url: source.base_url.trim().trim_end_matches('/').to_string(),
                    timeout: source.timeout_ms,
                }),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_game_rules() {
        let config = AppConfig::default();
        assert_eq!(config.rules.round_duration_secs, 30);
        assert_eq!(config.rules.damage, DamageTable::default());
        assert_eq!(config.timing.resolution_pause, Duration::from_millis(2_000));
        assert_eq!(config.opponent, OpponentProfile::default());
        assert_eq!(config.matchmaking.window, Duration::from_secs(60));
        assert_eq!(config.matchmaking.player_cap, 20);
        assert_eq!(config.default_topic, DEFAULT_TOPIC);
        assert_eq!(config.question_source, None);
    }

    #[test]
    fn partial_files_keep_defaults_for_missing_keys() {
        let raw: RawConfig = serde_json::from_str(
            r#"{
                "match": { "resolution_pause_ms": 500, "damage": { "opponent_hit": 25 } },
                "opponent": { "accuracy": 0.9 },
                "question_source": { "base_url": "http://generator:8000/" }
            }"#,
        )
        .unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config.timing.resolution_pause, Duration::from_millis(500));
        assert_eq!(config.rules.damage.opponent_hit, 25);
        assert_eq!(config.rules.damage.fast_hit, 30);
        assert_eq!(config.opponent.accuracy, 0.9);
        assert_eq!(config.opponent.max_delay_secs, 30);
        assert_eq!(
            config.question_source,
            Some(QuestionSourceConfig {
                base_url: "http://generator:8000".into(),
                timeout: Duration::from_secs(10),
            })
        );
    }

    #[test]
    fn environment_override_replaces_generator_url() {
        let config = AppConfig::default()
            .with_question_source_override(Some("http://localhost:9000".into()));
        assert_eq!(
            config.question_source.map(|source| source.base_url),
            Some("http://localhost:9000".into())
        );

        let untouched = AppConfig::default().with_question_source_override(Some("  ".into()));
        assert_eq!(untouched.question_source, None);
    }

    #[test]
    fn blank_topic_and_opponent_name_fall_back() {
        let raw: RawConfig = serde_json::from_str(
            r#"{ "match": { "default_opponent_name": " " }, "matchmaking": { "default_topic": "" } }"#,
        )
        .unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.default_topic, DEFAULT_TOPIC);
        assert_eq!(config.default_opponent_name, None);
    }
}
