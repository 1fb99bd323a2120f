use std::fs::File;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Result;
use raidbot::services::issues::GithubIssueTrackerConfig;
use raidbot::session::Timeouts;
use serde_derive::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Configuration {
    pub discord: DiscordConfiguration,

    #[serde(default)]
    pub storage: StorageConfiguration,

    pub github: Option<GithubConfiguration>,

    #[serde(default)]
    pub timeouts: Timeouts,
}

impl Configuration {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Configuration> {
        let file = File::open(path)?;
        Ok(serde_yaml::from_reader(file)?)
    }

    pub fn bot(&self) -> raidbot::bot::Configuration {
        raidbot::bot::Configuration {
            token: self.discord.token.clone(),
            application_id: self.discord.application_id,
            owner_ids: self.discord.owner_ids.clone(),
            developer_ids: self.discord.developer_ids.clone(),
            production: self.discord.production,
            timeouts: self.timeouts,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DiscordConfiguration {
    pub token: String,
    pub application_id: u64,
    #[serde(default)]
    pub owner_ids: Vec<u64>,
    #[serde(default)]
    pub developer_ids: Vec<u64>,
    #[serde(default)]
    pub production: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct StorageConfiguration {
    // 未指定の場合はメモリ上にのみ保持する
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct GithubConfiguration {
    #[serde(default = "default_github_baseurl")]
    pub baseurl: String,
    pub owner: String,
    pub repository: String,
    pub token: String,
}

fn default_github_baseurl() -> String {
    String::from("https://api.github.com")
}

impl From<&GithubConfiguration> for GithubIssueTrackerConfig {
    fn from(config: &GithubConfiguration) -> Self {
        Self {
            baseurl: config.baseurl.clone(),
            owner: config.owner.clone(),
            repository: config.repository.clone(),
            token: config.token.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_configuration_uses_defaults() {
        let config: Configuration = serde_yaml::from_str(
            "discord:\n  token: abc\n  application_id: 1234\n",
        )
        .unwrap();

        assert_eq!(config.discord.application_id, 1234);
        assert!(config.discord.owner_ids.is_empty());
        assert!(!config.discord.production);
        assert!(config.storage.path.is_none());
        assert!(config.github.is_none());
        assert_eq!(config.timeouts, Timeouts::default());
    }

    #[test]
    fn full_configuration() {
        let config: Configuration = serde_yaml::from_str(
            r#"
discord:
  token: abc
  application_id: 1234
  owner_ids: [1]
  developer_ids: [1, 2]
  production: true
storage:
  path: ./data/documents.json
github:
  owner: raid-guild
  repository: bot
  token: ghp_xxx
timeouts:
  prompt: 120
"#,
        )
        .unwrap();

        let github = config.github.as_ref().unwrap();
        assert_eq!(github.baseurl, "https://api.github.com");
        assert_eq!(config.timeouts.prompt, 120);
        assert_eq!(config.timeouts.menu, Timeouts::default().menu);

        let bot = config.bot();
        assert_eq!(bot.developer_ids, vec![1, 2]);
        assert!(bot.production);
    }
}
