use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION};
use reqwest::{Client, ClientBuilder, StatusCode};
use serde_derive::{Deserialize, Serialize};

use crate::models::BugReport;

type IssueTrackerResult<T> = Result<T, IssueTrackerError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueStatus {
    Submitted { number: u64, url: String },
    NotSubmitted,
}

impl IssueStatus {
    pub fn is_submitted(&self) -> bool {
        matches!(self, IssueStatus::Submitted { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IssueTrackerError {
    #[error("reqwest error: {0}")]
    ReqwestError(#[from] reqwest::Error),
    #[error("unexpected error occured: {0}")]
    UnexpectedError(String),
}

#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn submit_bug_report(&self, report: &BugReport) -> IssueTrackerResult<IssueStatus>;
}

pub struct GithubIssueTracker {
    config: GithubIssueTrackerConfig,
    client: Client,
}

#[derive(Debug, Clone)]
pub struct GithubIssueTrackerConfig {
    pub baseurl: String,
    pub owner: String,
    pub repository: String,
    pub token: String,
}

impl GithubIssueTracker {
    pub fn new(config: GithubIssueTrackerConfig) -> anyhow::Result<Self> {
        let header_map = HeaderMap::from_iter([
            (AUTHORIZATION, format!("Bearer {}", config.token).parse()?),
            (ACCEPT, "application/vnd.github+json".parse()?),
        ]);
        let client = ClientBuilder::new()
            .user_agent("Raid Guild Discord Bot")
            .default_headers(header_map)
            .build()?;

        Ok(Self { config, client })
    }
}

#[derive(Debug, Serialize)]
struct GithubCreateIssueRequest<'a> {
    title: &'a str,
    body: String,
    labels: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct GithubCreateIssueResponse {
    number: u64,
    html_url: String,
}

#[async_trait]
impl IssueTracker for GithubIssueTracker {
    #[tracing::instrument(skip_all, fields(title = %report.title))]
    async fn submit_bug_report(&self, report: &BugReport) -> IssueTrackerResult<IssueStatus> {
        tracing::info!("submit bug report");

        let response = self
            .client
            .post(format!(
                "{}/repos/{}/{}/issues",
                self.config.baseurl.trim_end_matches('/'),
                self.config.owner,
                self.config.repository
            ))
            .json(&GithubCreateIssueRequest {
                title: &report.title,
                body: render_issue_body(report),
                labels: ["bug"],
            })
            .send()
            .await?;

        match response.status() {
            StatusCode::CREATED => {
                let issue = response.json::<GithubCreateIssueResponse>().await?;
                tracing::debug!(number = issue.number, "issue created");
                Ok(IssueStatus::Submitted {
                    number: issue.number,
                    url: issue.html_url,
                })
            },
            status => Err(IssueTrackerError::UnexpectedError(format!(
                "unexpected status code {} returned from github",
                status
            ))),
        }
    }
}

/// Used when no issue repository is configured. Reports are only kept locally.
pub struct DisabledIssueTracker;

#[async_trait]
impl IssueTracker for DisabledIssueTracker {
    #[tracing::instrument(skip_all, fields(title = %_report.title))]
    async fn submit_bug_report(&self, _report: &BugReport) -> IssueTrackerResult<IssueStatus> {
        tracing::info!("issue tracker is disabled, skip submission");
        Ok(IssueStatus::NotSubmitted)
    }
}

pub fn render_issue_body(report: &BugReport) -> String {
    let sections = [
        ("Error Messages", &report.error_msg),
        ("Location", &report.location),
        ("Description", &report.description),
        ("Steps to Reproduce", &report.reproduce_steps),
        ("Other Information", &report.other_info),
    ];

    let mut body = format!(
        "**Reporter:** {} ({})\n**Version:** {}\n**Reported At:** {}\n",
        report.author_tag,
        report.author_id,
        report.version,
        chrono::DateTime::from_timestamp_millis(report.time)
            .map(|time| time.to_rfc3339())
            .unwrap_or_else(|| report.time.to_string()),
    );
    for (heading, content) in sections {
        let content = if content.is_empty() { "N/A" } else { content };
        body.push_str(&format!("\n### {}\n{}\n", heading, content));
    }
    body
}
