use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // API HTTP
    pub api_host: String,
    pub api_port: u16,

    // Fuentes
    pub youtube_api_key: Option<String>,
    pub ytdlp_path: String,
    pub search_limit: usize,

    // UI
    pub queue_page_size: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_lookup(|key| std::env::var(key).ok())?;

        // Validate configuration before returning
        config.validate()?;

        Ok(config)
    }

    /// Builds a config from any key/value source, applying defaults for missing keys.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            // Discord
            discord_token: lookup("DISCORD_TOKEN").context("DISCORD_TOKEN is not set")?,
            guild_id: optional("GUILD_ID").and_then(|s| s.parse().ok()),

            // API HTTP
            api_host: optional("API_HOST").unwrap_or(defaults.api_host),
            api_port: match optional("API_PORT") {
                Some(val) => val.parse().context("API_PORT must be a port number")?,
                None => defaults.api_port,
            },

            // Fuentes
            youtube_api_key: optional("YOUTUBE_API_KEY"),
            ytdlp_path: optional("YTDLP_PATH").unwrap_or(defaults.ytdlp_path),
            search_limit: match optional("SEARCH_LIMIT") {
                Some(val) => val.parse().context("SEARCH_LIMIT must be a number")?,
                None => defaults.search_limit,
            },

            // UI
            queue_page_size: match optional("QUEUE_PAGE_SIZE") {
                Some(val) => val.parse().context("QUEUE_PAGE_SIZE must be a number")?,
                None => defaults.queue_page_size,
            },
        })
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - The Discord token must not be empty
    /// - The API port must not be 0
    /// - Search limit must be between 1 and 25
    /// - Queue page size must be greater than 0
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN must not be empty");
        }

        if self.api_port == 0 {
            anyhow::bail!("API port must be greater than 0");
        }

        if !(1..=25).contains(&self.search_limit) {
            anyhow::bail!("Search limit must be between 1 and 25, got: {}", self.search_limit);
        }

        if self.queue_page_size == 0 {
            anyhow::bail!("Queue page size must be greater than 0");
        }

        Ok(())
    }

    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Never includes the Discord token or the YouTube API key.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: commands {}\n  \
            API: http://{}\n  \
            Sources: yt-dlp at {}, YouTube API {}, {} search results\n  \
            UI: {} tracks per queue page",
            self.guild_id.map_or("global".to_string(), |id| format!("in guild {id}")),
            self.api_addr(),
            self.ytdlp_path,
            if self.youtube_api_key.is_some() { "enabled" } else { "disabled" },
            self.search_limit,
            self.queue_page_size,
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            guild_id: None,

            api_host: "0.0.0.0".to_string(),
            api_port: 8080,

            youtube_api_key: None,
            ytdlp_path: "yt-dlp".to_string(),
            search_limit: 5,

            queue_page_size: 10,
        }
    }
}
