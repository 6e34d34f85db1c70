use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // AmoCRM
    pub amocrm_domain: String,
    pub amocrm_access_token: String,

    // Postgres
    pub database_url: String,

    // Telegram notifications
    pub telegram_bot_token: String,
    pub telegram_chat_ids: Vec<i64>,

    // Web server
    pub web_host: String,
    pub web_port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            amocrm_domain: required_env("AMOCRM_DOMAIN"),
            amocrm_access_token: required_env("AMOCRM_ACCESS_TOKEN"),
            database_url: required_env("DATABASE_URL"),
            telegram_bot_token: required_env("TELEGRAM_BOT_TOKEN"),
            telegram_chat_ids: parse_chat_ids(&required_env("TELEGRAM_CHAT_IDS")),
            web_host: env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: env::var("WEB_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("WEB_PORT must be a number"),
        }
    }

    /// Load a minimal config for the historical import CLIs (no Telegram needed).
    pub fn import_from_env() -> Self {
        Self {
            amocrm_domain: required_env("AMOCRM_DOMAIN"),
            amocrm_access_token: required_env("AMOCRM_ACCESS_TOKEN"),
            database_url: required_env("DATABASE_URL"),
            telegram_bot_token: String::new(),
            telegram_chat_ids: Vec::new(),
            web_host: String::new(),
            web_port: 0,
        }
    }

    /// Log the loaded configuration with secrets redacted.
    pub fn log_redacted(&self) {
        tracing::info!(
            amocrm_domain = self.amocrm_domain.as_str(),
            amocrm_token = redact(&self.amocrm_access_token),
            database_url = redact(&self.database_url),
            telegram_token = redact(&self.telegram_bot_token),
            telegram_chats = self.telegram_chat_ids.len(),
            "Configuration loaded"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn parse_chat_ids(raw: &str) -> Vec<i64> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .unwrap_or_else(|_| panic!("TELEGRAM_CHAT_IDS entry {s:?} is not a chat id"))
        })
        .collect()
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        "(unset)"
    } else {
        "***"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_ids_parse_with_whitespace() {
        assert_eq!(parse_chat_ids("123, -456,789"), vec![123, -456, 789]);
        assert_eq!(parse_chat_ids(""), Vec::<i64>::new());
    }
}
