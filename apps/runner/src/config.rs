use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use fieldops_core::{AppError, AppResult};
use fieldops_domain::TaskId;
use url::Url;

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:3001";
const DEFAULT_PERFORMED_BY: &str = "field-technician";

/// Where the runner reads tasks from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskSource {
    /// The task API.
    Api {
        /// API root.
        base_url: Url,
        /// Optional bearer token.
        api_token: Option<String>,
    },
    /// A JSON file holding one task or a list of tasks, completed locally.
    File {
        /// Task file path.
        path: PathBuf,
        /// Name recorded on steps resolved from this file.
        performed_by: String,
    },
}

/// Runner settings read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    pub source: TaskSource,
    pub task_id: Option<TaskId>,
    pub http_timeout_seconds: u64,
    pub http_max_attempts: u8,
    pub http_retry_backoff_ms: u64,
}

impl RunnerConfig {
    pub fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let task_id = optional("FIELDOPS_TASK_ID")
            .map(|value| {
                value.parse::<i64>().map(TaskId::new).map_err(|error| {
                    AppError::Configuration(format!(
                        "invalid FIELDOPS_TASK_ID value '{value}': {error}"
                    ))
                })
            })
            .transpose()?;

        let source = match optional("FIELDOPS_TASK_FILE") {
            Some(path) => TaskSource::File {
                path: PathBuf::from(path),
                performed_by: optional("FIELDOPS_PERFORMED_BY")
                    .unwrap_or_else(|| DEFAULT_PERFORMED_BY.to_owned()),
            },
            None => {
                if task_id.is_none() {
                    return Err(AppError::Configuration(
                        "FIELDOPS_TASK_ID is required unless FIELDOPS_TASK_FILE is set".to_owned(),
                    ));
                }

                let raw_base_url = optional("FIELDOPS_API_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_owned());
                let base_url = Url::parse(raw_base_url.as_str()).map_err(|error| {
                    AppError::Configuration(format!(
                        "invalid FIELDOPS_API_BASE_URL value '{raw_base_url}': {error}"
                    ))
                })?;
                if !matches!(base_url.scheme(), "http" | "https") {
                    return Err(AppError::Configuration(format!(
                        "FIELDOPS_API_BASE_URL must use http or https, got '{}'",
                        base_url.scheme()
                    )));
                }

                TaskSource::Api {
                    base_url,
                    api_token: optional("FIELDOPS_API_TOKEN"),
                }
            }
        };

        let http_timeout_seconds = parse_var(
            optional("FIELDOPS_HTTP_TIMEOUT_SECONDS"),
            "FIELDOPS_HTTP_TIMEOUT_SECONDS",
            15,
        )?;
        let http_max_attempts = parse_var(
            optional("FIELDOPS_HTTP_MAX_ATTEMPTS"),
            "FIELDOPS_HTTP_MAX_ATTEMPTS",
            3,
        )?;
        let http_retry_backoff_ms = parse_var(
            optional("FIELDOPS_HTTP_RETRY_BACKOFF_MS"),
            "FIELDOPS_HTTP_RETRY_BACKOFF_MS",
            250,
        )?;

        if http_timeout_seconds == 0 {
            return Err(AppError::Configuration(
                "FIELDOPS_HTTP_TIMEOUT_SECONDS must be greater than zero".to_owned(),
            ));
        }

        if http_max_attempts == 0 {
            return Err(AppError::Configuration(
                "FIELDOPS_HTTP_MAX_ATTEMPTS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            source,
            task_id,
            http_timeout_seconds,
            http_max_attempts,
            http_retry_backoff_ms,
        })
    }
}

fn parse_var<T>(value: Option<String>, name: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    match value {
        Some(value) => value.parse::<T>().map_err(|error| {
            AppError::Configuration(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;

    use fieldops_core::AppError;
    use fieldops_domain::TaskId;

    use super::{RunnerConfig, TaskSource};

    fn load(pairs: &[(&str, &str)]) -> Result<RunnerConfig, AppError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect();
        RunnerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn api_source_uses_defaults() {
        let config = load(&[("FIELDOPS_TASK_ID", "42")]);
        assert!(config.is_ok());
        let config = config.unwrap_or_else(|_| unreachable!());

        assert_eq!(config.task_id, Some(TaskId::new(42)));
        assert_eq!(config.http_timeout_seconds, 15);
        assert_eq!(config.http_max_attempts, 3);
        assert_eq!(config.http_retry_backoff_ms, 250);
        let TaskSource::Api {
            base_url,
            api_token,
        } = config.source
        else {
            unreachable!()
        };
        assert_eq!(base_url.as_str(), "http://127.0.0.1:3001/");
        assert!(api_token.is_none());
    }

    #[test]
    fn task_id_is_required_without_a_task_file() {
        assert!(matches!(load(&[]), Err(AppError::Configuration(_))));

        let config =
            load(&[("FIELDOPS_TASK_FILE", "tasks.json")]).unwrap_or_else(|_| unreachable!());
        assert_eq!(
            config.source,
            TaskSource::File {
                path: PathBuf::from("tasks.json"),
                performed_by: "field-technician".to_owned(),
            }
        );
        assert!(config.task_id.is_none());
    }

    #[test]
    fn performed_by_only_applies_to_the_task_file() {
        let file = load(&[
            ("FIELDOPS_TASK_FILE", "tasks.json"),
            ("FIELDOPS_PERFORMED_BY", "tech-7"),
        ])
        .unwrap_or_else(|_| unreachable!());
        assert!(matches!(
            file.source,
            TaskSource::File { ref performed_by, .. } if performed_by == "tech-7"
        ));

        let api = load(&[("FIELDOPS_TASK_ID", "42"), ("FIELDOPS_PERFORMED_BY", "tech-7")])
            .unwrap_or_else(|_| unreachable!());
        assert!(matches!(api.source, TaskSource::Api { .. }));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(load(&[("FIELDOPS_TASK_ID", "abc")]).is_err());
        assert!(
            load(&[
                ("FIELDOPS_TASK_ID", "1"),
                ("FIELDOPS_API_BASE_URL", "ftp://example.com")
            ])
            .is_err()
        );
        assert!(
            load(&[
                ("FIELDOPS_TASK_ID", "1"),
                ("FIELDOPS_HTTP_MAX_ATTEMPTS", "0")
            ])
            .is_err()
        );
        assert!(
            load(&[
                ("FIELDOPS_TASK_ID", "1"),
                ("FIELDOPS_HTTP_TIMEOUT_SECONDS", "soon")
            ])
            .is_err()
        );
    }
}
