use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Placeholder sent when the team name is left empty.
pub const DEFAULT_TEAM_NAME: &str = "RIFT_TEAM";
/// Placeholder sent when the leader name is left empty.
pub const DEFAULT_LEADER_NAME: &str = "LEADER";
pub const DEFAULT_RETRY_LIMIT: u32 = 5;
pub const MAX_RETRY_LIMIT: u32 = 10;

/// HTTP settings for the pipeline API client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub user_agent: String,
}

/// Cadence of the status and timeline pollers.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub status_interval: Duration,
    pub timeline_interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            status_interval: Duration::from_secs(3),
            timeline_interval: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Idle,
    Queued,
    Running,
    Success,
    Failed,
    Partial,
}

impl RunStatus {
    /// Terminal statuses end polling for the current run.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Success | RunStatus::Failed | RunStatus::Partial)
    }

    /// Statuses during which a poll handle must be held.
    pub fn is_active(self) -> bool {
        matches!(self, RunStatus::Queued | RunStatus::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Idle => "idle",
            RunStatus::Queued => "queued",
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
            RunStatus::Partial => "partial",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Editable inputs for the next run. Values are kept as typed; normalization
/// happens when the start payload is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormInputs {
    pub repo_url: String,
    pub team_name: String,
    pub leader_name: String,
    pub openai_key: String,
    pub github_token: String,
    pub retry_limit: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    RepoUrl,
    TeamName,
    LeaderName,
    OpenaiKey,
    GithubToken,
    RetryLimit,
}

impl FormInputs {
    pub fn set(&mut self, field: FormField, value: impl Into<String>) {
        let value = value.into();
        match field {
            FormField::RepoUrl => self.repo_url = value,
            FormField::TeamName => self.team_name = value,
            FormField::LeaderName => self.leader_name = value,
            FormField::OpenaiKey => self.openai_key = value,
            FormField::GithubToken => self.github_token = value,
            FormField::RetryLimit => self.retry_limit = value,
        }
    }

    /// Build the normalized request body. Returns `None` when the repository
    /// URL is blank.
    pub fn to_payload(&self) -> Option<StartPayload> {
        let repo_url = self.repo_url.trim();
        if repo_url.is_empty() {
            return None;
        }
        Some(StartPayload {
            repo_url: repo_url.to_string(),
            team_name: or_placeholder(&self.team_name, DEFAULT_TEAM_NAME),
            leader_name: or_placeholder(&self.leader_name, DEFAULT_LEADER_NAME),
            openai_key: self.openai_key.trim().to_string(),
            github_token: self.github_token.trim().to_string(),
            retry_limit: coerce_retry_limit(&self.retry_limit),
        })
    }

    pub fn branch_preview(&self) -> String {
        branch_preview(&self.team_name, &self.leader_name)
    }
}

fn or_placeholder(value: &str, placeholder: &str) -> String {
    let v = value.trim();
    if v.is_empty() {
        placeholder.to_string()
    } else {
        v.to_string()
    }
}

/// Parse the retry limit; anything that is not a positive number falls back to
/// the default. Values above the maximum are capped.
pub fn coerce_retry_limit(raw: &str) -> u32 {
    let raw = raw.trim();
    let parsed = raw
        .parse::<i64>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v.trunc() as i64));
    match parsed {
        Some(n) if n > 0 => (n.min(MAX_RETRY_LIMIT as i64)) as u32,
        _ => DEFAULT_RETRY_LIMIT,
    }
}

/// Branch name the pipeline will push to: `TEAM_LEADER_AI_Fix`.
pub fn branch_preview(team_name: &str, leader_name: &str) -> String {
    let part = |value: &str, placeholder: &str| {
        let joined = value.split_whitespace().collect::<Vec<_>>().join("_");
        if joined.is_empty() {
            placeholder.to_string()
        } else {
            joined.to_uppercase()
        }
    };
    format!(
        "{}_{}_AI_Fix",
        part(team_name, DEFAULT_TEAM_NAME),
        part(leader_name, DEFAULT_LEADER_NAME)
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartPayload {
    pub repo_url: String,
    pub team_name: String,
    pub leader_name: String,
    pub openai_key: String,
    pub github_token: String,
    pub retry_limit: u32,
}

/// Acceptance acknowledgement returned by the start endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartAck {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Generic acknowledgement body (`{message, status}`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: RunStatus,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimelineReport {
    #[serde(default)]
    pub status: Option<RunStatus>,
    #[serde(default)]
    pub timeline: Vec<TimelineEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOutcome {
    Success,
    Failure,
    Pending,
    Running,
    #[serde(untagged)]
    Other(String),
}

impl EventOutcome {
    pub fn as_str(&self) -> &str {
        match self {
            EventOutcome::Success => "success",
            EventOutcome::Failure => "failure",
            EventOutcome::Pending => "pending",
            EventOutcome::Running => "running",
            EventOutcome::Other(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub event: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub status: Option<EventOutcome>,
}

impl TimelineEvent {
    /// One display line: `timestamp  event  [outcome]  detail`.
    pub fn display_line(&self) -> String {
        let mut line = format!("{}  {}", self.timestamp, self.event);
        if let Some(outcome) = &self.status {
            line.push_str(&format!("  [{}]", outcome.as_str()));
        }
        if let Some(detail) = self.detail.as_deref().filter(|d| !d.is_empty()) {
            line.push_str("  ");
            line.push_str(detail);
        }
        line
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BugType {
    Linting,
    Syntax,
    Logic,
    TypeError,
    Import,
    Indentation,
    #[serde(untagged)]
    Other(String),
}

impl BugType {
    pub fn label(&self) -> &str {
        match self {
            BugType::Linting => "LINTING",
            BugType::Syntax => "SYNTAX",
            BugType::Logic => "LOGIC",
            BugType::TypeError => "TYPE_ERROR",
            BugType::Import => "IMPORT",
            BugType::Indentation => "INDENTATION",
            BugType::Other(s) => s,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixStatus {
    Applied,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub bug_type: BugType,
    pub file: String,
    pub line: u32,
    pub fix_description: String,
    pub status: FixStatus,
}

impl Fix {
    /// `<TYPE> error in <file> line <line> → Fix: <description>`
    pub fn formatted(&self) -> String {
        format!(
            "{} error in {} line {} → Fix: {}",
            self.bug_type.label(),
            self.file,
            self.line,
            self.fix_description
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub bug_type: BugType,
    pub file: String,
    pub line: u32,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSummary {
    #[serde(default, alias = "total")]
    pub total_tests: u32,
    #[serde(default, alias = "passed")]
    pub tests_passed: u32,
    #[serde(default, alias = "failed")]
    pub tests_failed: u32,
}

/// Remote-computed score breakdown. Rendered as received, never recomputed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Score {
    pub tests_passed_pct: f64,
    pub fixes_applied: u32,
    pub fix_quality_score: f64,
    pub ci_success_bonus: f64,
    pub speed_bonus: f64,
    pub efficiency_penalty: f64,
    pub base_score: f64,
    pub total_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSnapshot {
    pub run_id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub branch_name: String,
    #[serde(default)]
    pub fixes: Vec<Fix>,
    #[serde(default)]
    pub fixes_formatted_output: Vec<String>,
    #[serde(default)]
    pub cicd_timeline: Vec<TimelineEvent>,
    #[serde(default)]
    pub test_summary: TestSummary,
    /// Flat counts sent by a live server that has not written its results
    /// file yet. Read through [`ResultSnapshot::tests`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tests: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests_passed: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests_failed: Option<u32>,
    #[serde(default)]
    pub score: Score,
    #[serde(default)]
    pub commit_sha: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub pr_url: Option<String>,
    #[serde(default)]
    pub repo_url: Option<String>,
    #[serde(default)]
    pub team_name: Option<String>,
    #[serde(default)]
    pub leader_name: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub finished_at: Option<String>,
    #[serde(default)]
    pub duration_seconds: f64,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub retry_limit: Option<u32>,
    #[serde(default)]
    pub failures: Vec<Failure>,
    #[serde(default)]
    pub cicd_status: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl ResultSnapshot {
    /// Remote formatted fix lines, or lines derived from `fixes` when the
    /// remote did not send any.
    pub fn formatted_fixes(&self) -> Vec<String> {
        if !self.fixes_formatted_output.is_empty() {
            return self.fixes_formatted_output.clone();
        }
        self.fixes.iter().map(Fix::formatted).collect()
    }

    /// Test counts: the nested summary when present, else the flat fields.
    pub fn tests(&self) -> TestSummary {
        let flat = [self.total_tests, self.tests_passed, self.tests_failed];
        if self.test_summary != TestSummary::default() || flat.iter().all(Option::is_none) {
            return self.test_summary;
        }
        TestSummary {
            total_tests: self.total_tests.unwrap_or(0),
            tests_passed: self.tests_passed.unwrap_or(0),
            tests_failed: self.tests_failed.unwrap_or(0),
        }
    }

    pub fn applied_fix_count(&self) -> usize {
        crate::metrics::fix_counts(&self.fixes).applied
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v = Option::<String>::deserialize(deserializer)?;
    Ok(v.filter(|s| !s.trim().is_empty()))
}
