//! Environment validation.
//!
//! Every problem found is collected before failing, so an operator fixing a
//! `.env` file sees the complete list at once. The single exception is an
//! over-long instance `NAME`, which fails immediately: the name is used
//! downstream as a length-limited identifier.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::EnvSnapshot;

/// Maximum instance name length, in characters.
pub const MAX_NAME_LEN: usize = 16;

const MONGO_URI: &str = "MONGO_URI";
const BOT_TOKEN: &str = "BOT_TOKEN";
const CLIENT_ID: &str = "CLIENT_ID";
const GUILD_ID: &str = "GUILD_ID";
const NAME: &str = "NAME";
const PORT: &str = "PORT";
const GAME_SERVERS: &str = "GAME_SERVERS";
const ALLOW_REBOOT: &str = "ALLOW_REBOOT";
const MATCHMAKER_IP: &str = "MATCHMAKER_IP";
const MAIN_SEASON: &str = "MAIN_SEASON";
const USE_S3: &str = "USE_S3";
const S3_BUCKET_NAME: &str = "S3_BUCKET_NAME";
const S3_ENDPOINT: &str = "S3_ENDPOINT";
const S3_ACCESS_KEY_ID: &str = "S3_ACCESS_KEY_ID";
const S3_SECRET_ACCESS_KEY: &str = "S3_SECRET_ACCESS_KEY";
const USE_REDIS: &str = "USE_REDIS";
const REDIS_URL: &str = "REDIS_URL";
const USER_ENVIRONMENT: &str = "USERENVIROMENT";
const DOCKER: &str = "DOCKER";

/// Optional backend modules and whether they start enabled.
const FEATURE_MODULES: &[(&str, bool)] = &[("Shop", false), ("Matchmaking", false)];

/// Object-storage settings, present only when `USE_S3=true`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStorage {
    pub bucket_name: String,
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// External cache settings, present only when `USE_REDIS=true`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCache {
    pub url: String,
}

/// Validated, immutable runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    pub mongo_uri: String,
    pub bot_token: String,
    pub client_id: Option<String>,
    pub guild_id: Option<String>,
    /// Instance name with spaces replaced by underscores.
    pub name: String,
    pub port: u16,
    pub game_servers: Vec<String>,
    pub allow_reboot: bool,
    pub matchmaker_ip: String,
    pub main_season: u32,
    pub object_storage: Option<ObjectStorage>,
    pub external_cache: Option<ExternalCache>,
    pub is_dev: bool,
    pub is_docker: bool,
    modules: BTreeMap<String, bool>,
}

impl Configuration {
    pub fn uses_object_storage(&self) -> bool {
        self.object_storage.is_some()
    }

    pub fn uses_external_cache(&self) -> bool {
        self.external_cache.is_some()
    }

    /// Whether an optional backend module (e.g. `Shop`) is enabled.
    /// Unknown modules are reported as disabled.
    pub fn module_enabled(&self, module: &str) -> bool {
        self.modules.get(module).copied().unwrap_or(false)
    }
}

/// A single offending environment variable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("{field} is missing")]
    Missing { field: &'static str },
    #[error("{field} is not true or false (value: {value:?})")]
    NotABoolean { field: &'static str, value: String },
    #[error("{field} is not a valid integer (value: {value:?})")]
    NotAnInteger { field: &'static str, value: String },
    #[error("{field} is out of range (value: {value:?})")]
    OutOfRange { field: &'static str, value: String },
}

impl FieldError {
    pub fn field(&self) -> &'static str {
        match self {
            FieldError::Missing { field }
            | FieldError::NotABoolean { field, .. }
            | FieldError::NotAnInteger { field, .. }
            | FieldError::OutOfRange { field, .. } => field,
        }
    }

    fn is_missing(&self) -> bool {
        matches!(self, FieldError::Missing { .. })
    }
}

/// Aggregate of every missing or malformed variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationError {
    errors: Vec<FieldError>,
}

impl ConfigurationError {
    /// Names of the offending variables, in declaration order.
    pub fn fields(&self) -> Vec<&'static str> {
        self.errors.iter().map(FieldError::field).collect()
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let many = self.errors.len() > 1;
        let all_missing = self.errors.iter().all(FieldError::is_missing);

        write!(
            f,
            "The environment {} {} {} {}, please declare {} {}in the .env file.",
            if many { "variables" } else { "variable" },
            self.fields().join(", "),
            if many { "are" } else { "is" },
            if all_missing { "missing" } else { "missing or malformed" },
            if many { "them" } else { "it" },
            if all_missing { "" } else { "correctly " },
        )?;

        let details: Vec<String> = self
            .errors
            .iter()
            .filter(|e| !e.is_missing())
            .map(ToString::to_string)
            .collect();
        if !details.is_empty() {
            write!(f, " Details: {}.", details.join("; "))?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigurationError {}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("The environment variable NAME is too long ({len} characters, at most {max}), please shorten it in the .env file.")]
    NameTooLong { len: usize, max: usize },
    #[error(transparent)]
    Invalid(#[from] ConfigurationError),
}

/// Strict boolean parsing: only the literals `true` and `false` are accepted.
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Reads fields out of a snapshot, recording every failure.
///
/// Accessors return a placeholder on failure so the caller can keep going;
/// the placeholders never escape because `finish` rejects any recorded error.
struct Collector<'a> {
    env: &'a EnvSnapshot,
    errors: Vec<FieldError>,
}

impl<'a> Collector<'a> {
    fn new(env: &'a EnvSnapshot) -> Self {
        Self {
            env,
            errors: Vec::new(),
        }
    }

    fn optional(&self, key: &'static str) -> Option<String> {
        self.env
            .get(key)
            .filter(|v| !v.trim().is_empty())
            .map(ToOwned::to_owned)
    }

    fn required(&mut self, key: &'static str) -> String {
        self.optional(key).unwrap_or_else(|| {
            self.errors.push(FieldError::Missing { field: key });
            String::new()
        })
    }

    fn boolean(&mut self, key: &'static str) -> Option<bool> {
        let Some(raw) = self.env.get(key) else {
            self.errors.push(FieldError::Missing { field: key });
            return None;
        };
        let parsed = parse_bool(raw);
        if parsed.is_none() {
            self.errors.push(FieldError::NotABoolean {
                field: key,
                value: raw.to_string(),
            });
        }
        parsed
    }

    fn integer<T: FromStr + Default>(&mut self, key: &'static str) -> T {
        let Some(raw) = self.optional(key) else {
            self.errors.push(FieldError::Missing { field: key });
            return T::default();
        };
        let trimmed = raw.trim();
        trimmed.parse().unwrap_or_else(|_| {
            // A well-formed integer that doesn't fit the field's type.
            let error = if trimmed.parse::<i128>().is_ok() {
                FieldError::OutOfRange {
                    field: key,
                    value: raw.clone(),
                }
            } else {
                FieldError::NotAnInteger {
                    field: key,
                    value: raw.clone(),
                }
            };
            self.errors.push(error);
            T::default()
        })
    }

    fn list(&mut self, key: &'static str) -> Vec<String> {
        let items: Vec<String> = self
            .optional(key)
            .map(|raw| raw.split_whitespace().map(ToOwned::to_owned).collect())
            .unwrap_or_default();
        if items.is_empty() {
            self.errors.push(FieldError::Missing { field: key });
        }
        items
    }

    fn finish(self) -> Result<(), ConfigurationError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigurationError {
                errors: self.errors,
            })
        }
    }
}

/// Validate a snapshot into a [`Configuration`].
///
/// `CLIENT_ID` and `GUILD_ID` are optional (they are not known before the bot
/// is first registered). Object-storage and external-cache settings are only
/// required when their toggle is `true`.
pub fn validate(env: &EnvSnapshot) -> Result<Configuration, ConfigError> {
    let mut c = Collector::new(env);

    let mongo_uri = c.required(MONGO_URI);
    let bot_token = c.required(BOT_TOKEN);
    let client_id = c.optional(CLIENT_ID);
    let guild_id = c.optional(GUILD_ID);

    let raw_name = c.required(NAME);
    let name_len = raw_name.chars().count();
    if name_len > MAX_NAME_LEN {
        return Err(ConfigError::NameTooLong {
            len: name_len,
            max: MAX_NAME_LEN,
        });
    }
    let name = raw_name.replace(' ', "_");

    let port = c.integer::<u16>(PORT);
    let game_servers = c.list(GAME_SERVERS);
    let allow_reboot = c.boolean(ALLOW_REBOOT).unwrap_or(false);
    let matchmaker_ip = c.required(MATCHMAKER_IP);
    let main_season = c.integer::<u32>(MAIN_SEASON);

    let object_storage = match c.boolean(USE_S3) {
        Some(true) => Some(ObjectStorage {
            bucket_name: c.required(S3_BUCKET_NAME),
            endpoint: c.required(S3_ENDPOINT),
            access_key_id: c.required(S3_ACCESS_KEY_ID),
            secret_access_key: c.required(S3_SECRET_ACCESS_KEY),
        }),
        _ => None,
    };

    let external_cache = match c.boolean(USE_REDIS) {
        Some(true) => Some(ExternalCache {
            url: c.required(REDIS_URL),
        }),
        _ => None,
    };

    c.finish()?;

    Ok(Configuration {
        mongo_uri,
        bot_token,
        client_id,
        guild_id,
        name,
        port,
        game_servers,
        allow_reboot,
        matchmaker_ip,
        main_season,
        object_storage,
        external_cache,
        is_dev: is_dev(env),
        is_docker: env.get(DOCKER) == Some("true"),
        modules: FEATURE_MODULES
            .iter()
            .map(|(module, enabled)| (module.to_string(), *enabled))
            .collect(),
    })
}

/// The external cache endpoint, if `USE_REDIS=true` and `REDIS_URL` is set.
///
/// Used before full validation runs; malformed toggles yield `None` here and
/// are reported by [`validate`].
pub fn external_cache_endpoint(env: &EnvSnapshot) -> Option<String> {
    if env.get(USE_REDIS).and_then(parse_bool) != Some(true) {
        return None;
    }
    env.get(REDIS_URL)
        .filter(|url| !url.trim().is_empty())
        .map(ToOwned::to_owned)
}

/// Development deployments log at debug level.
pub fn is_dev(env: &EnvSnapshot) -> bool {
    env.get(USER_ENVIRONMENT) == Some("development")
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: &[&str] = &[
        MONGO_URI,
        BOT_TOKEN,
        NAME,
        PORT,
        GAME_SERVERS,
        ALLOW_REBOOT,
        MATCHMAKER_IP,
        MAIN_SEASON,
        USE_S3,
        USE_REDIS,
    ];

    fn valid_env() -> EnvSnapshot {
        [
            (MONGO_URI, "mongodb://127.0.0.1/momentum"),
            (BOT_TOKEN, "bot-token"),
            (NAME, "Momentum"),
            (PORT, "3551"),
            (GAME_SERVERS, "127.0.0.1:7777 127.0.0.1:7778"),
            (ALLOW_REBOOT, "false"),
            (MATCHMAKER_IP, "127.0.0.1:80"),
            (MAIN_SEASON, "12"),
            (USE_S3, "false"),
            (USE_REDIS, "false"),
        ]
        .into_iter()
        .collect()
    }

    fn invalid(env: &EnvSnapshot) -> ConfigurationError {
        match validate(env) {
            Err(ConfigError::Invalid(e)) => e,
            other => panic!("expected aggregate error, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_environment() {
        let config = validate(&valid_env()).unwrap();
        assert_eq!(config.port, 3551);
        assert_eq!(config.main_season, 12);
        assert_eq!(config.game_servers, vec!["127.0.0.1:7777", "127.0.0.1:7778"]);
        assert!(!config.allow_reboot);
        assert!(!config.uses_object_storage());
        assert!(!config.uses_external_cache());
        assert_eq!(config.client_id, None);
        assert!(!config.is_dev);
        assert!(!config.module_enabled("Shop"));
        assert!(!config.module_enabled("Matchmaking"));
    }

    #[test]
    fn test_missing_subset_is_reported_exactly() {
        let omitted = [BOT_TOKEN, PORT, MAIN_SEASON];
        let mut env = valid_env();
        for key in omitted {
            env.remove(key);
        }

        let err = invalid(&env);
        assert_eq!(err.fields(), omitted.to_vec());
        assert_eq!(
            err.to_string(),
            "The environment variables BOT_TOKEN, PORT, MAIN_SEASON are missing, please declare them in the .env file."
        );
    }

    #[test]
    fn test_every_required_field_missing() {
        let err = invalid(&EnvSnapshot::default());
        assert_eq!(err.fields(), REQUIRED.to_vec());
    }

    #[test]
    fn test_single_missing_field_is_singular() {
        let mut env = valid_env();
        env.remove(MONGO_URI);
        assert_eq!(
            invalid(&env).to_string(),
            "The environment variable MONGO_URI is missing, please declare it in the .env file."
        );
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let mut env = valid_env();
        env.set(MATCHMAKER_IP, "  ");
        assert_eq!(invalid(&env).fields(), vec![MATCHMAKER_IP]);
    }

    #[test]
    fn test_boolean_literals() {
        for (raw, expected) in [("true", true), ("false", false)] {
            let mut env = valid_env();
            env.set(ALLOW_REBOOT, raw);
            assert_eq!(validate(&env).unwrap().allow_reboot, expected);
        }

        for raw in ["True", "FALSE", "1", "yes", ""] {
            let mut env = valid_env();
            env.set(ALLOW_REBOOT, raw);
            let err = invalid(&env);
            assert_eq!(
                err.errors,
                vec![FieldError::NotABoolean {
                    field: ALLOW_REBOOT,
                    value: raw.to_string()
                }]
            );
            assert!(err.to_string().contains("missing or malformed"));
            assert!(err.to_string().contains(&format!("{:?}", raw)));
        }
    }

    #[test]
    fn test_malformed_integers_are_aggregated() {
        let mut env = valid_env();
        env.set(PORT, "eighty");
        env.set(MAIN_SEASON, "-3");
        env.remove(MONGO_URI);

        let err = invalid(&env);
        assert_eq!(err.fields(), vec![MONGO_URI, PORT, MAIN_SEASON]);
        assert!(matches!(err.errors[1], FieldError::NotAnInteger { .. }));
        assert!(matches!(err.errors[2], FieldError::OutOfRange { .. }));
    }

    #[test]
    fn test_integers_outside_the_field_type_are_out_of_range() {
        let mut env = valid_env();
        env.set(PORT, "70000");
        env.set(MAIN_SEASON, "-3");

        let err = invalid(&env);
        assert_eq!(
            err.errors,
            vec![
                FieldError::OutOfRange {
                    field: PORT,
                    value: "70000".to_string()
                },
                FieldError::OutOfRange {
                    field: MAIN_SEASON,
                    value: "-3".to_string()
                },
            ]
        );
        let message = err.to_string();
        assert!(message.contains("PORT is out of range (value: \"70000\")"));
        assert!(!message.contains("not a valid integer"));
    }

    #[test]
    fn test_name_length_limit() {
        let mut env = valid_env();
        env.set(NAME, "a".repeat(16));
        assert_eq!(validate(&env).unwrap().name.len(), 16);

        env.set(NAME, "a".repeat(17));
        assert_eq!(
            validate(&env),
            Err(ConfigError::NameTooLong { len: 17, max: 16 })
        );
    }

    #[test]
    fn test_name_too_long_wins_over_missing_fields() {
        let mut env = valid_env();
        env.remove(PORT);
        env.set(NAME, "this name is far too long");
        assert!(matches!(
            validate(&env),
            Err(ConfigError::NameTooLong { .. })
        ));
    }

    #[test]
    fn test_name_spaces_become_underscores() {
        let mut env = valid_env();
        env.set(NAME, "My Cool Server");
        assert_eq!(validate(&env).unwrap().name, "My_Cool_Server");
    }

    #[test]
    fn test_optional_identifiers() {
        let mut env = valid_env();
        env.set(CLIENT_ID, "1234");
        let config = validate(&env).unwrap();
        assert_eq!(config.client_id.as_deref(), Some("1234"));
        assert_eq!(config.guild_id, None);
    }

    #[test]
    fn test_object_storage_required_only_when_enabled() {
        let mut env = valid_env();
        env.set(USE_S3, "true");
        assert_eq!(
            invalid(&env).fields(),
            vec![S3_BUCKET_NAME, S3_ENDPOINT, S3_ACCESS_KEY_ID, S3_SECRET_ACCESS_KEY]
        );

        env.set(S3_BUCKET_NAME, "bucket");
        env.set(S3_ENDPOINT, "https://s3.example.com");
        env.set(S3_ACCESS_KEY_ID, "id");
        env.set(S3_SECRET_ACCESS_KEY, "secret");
        let storage = validate(&env).unwrap().object_storage.unwrap();
        assert_eq!(storage.bucket_name, "bucket");
    }

    #[test]
    fn test_external_cache_required_only_when_enabled() {
        let mut env = valid_env();
        env.set(USE_REDIS, "true");
        assert_eq!(invalid(&env).fields(), vec![REDIS_URL]);
        assert_eq!(external_cache_endpoint(&env), None);

        env.set(REDIS_URL, "redis://a");
        let config = validate(&env).unwrap();
        assert_eq!(config.external_cache.unwrap().url, "redis://a");
        assert_eq!(external_cache_endpoint(&env).as_deref(), Some("redis://a"));
    }

    #[test]
    fn test_external_cache_endpoint_ignores_malformed_toggle() {
        let mut env = valid_env();
        env.set(USE_REDIS, "yes");
        env.set(REDIS_URL, "redis://a");
        assert_eq!(external_cache_endpoint(&env), None);
    }

    #[test]
    fn test_deployment_flags() {
        let mut env = valid_env();
        env.set(USER_ENVIRONMENT, "development");
        env.set(DOCKER, "true");
        let config = validate(&env).unwrap();
        assert!(config.is_dev);
        assert!(config.is_docker);
    }
}
