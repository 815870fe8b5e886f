//! Common types used across wildcam

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::{ModelError, Result};

/// Maximum length of a pull source name.
pub const MAX_SOURCE_NAME_LEN: usize = 255;

// ============================================================================
// Pull Sources
// ============================================================================

/// Credentials applied to every request against a pull source.
///
/// Persisted as JSON tagged by `type`:
/// `{"type":"basic","username":"u","password":"p"}`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthConfig {
    /// No credentials
    #[default]
    None,
    /// HTTP basic authentication
    Basic { username: String, password: String },
    /// Pre-built `Authorization` header value, sent verbatim
    Header { value: String },
}

impl AuthConfig {
    /// Short name of the variant, as stored in the `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            AuthConfig::None => "none",
            AuthConfig::Basic { .. } => "basic",
            AuthConfig::Header { .. } => "header",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            AuthConfig::None => Ok(()),
            AuthConfig::Basic { username, .. } if username.trim().is_empty() => Err(
                ModelError::InvalidAuth("basic auth requires a username".to_string()),
            ),
            AuthConfig::Basic { .. } => Ok(()),
            AuthConfig::Header { value } if value.trim().is_empty() => Err(
                ModelError::InvalidAuth("header auth requires a header value".to_string()),
            ),
            AuthConfig::Header { .. } => Ok(()),
        }
    }
}

// Secrets never reach logs.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthConfig::None => write!(f, "None"),
            AuthConfig::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            AuthConfig::Header { .. } => f
                .debug_struct("Header")
                .field("value", &"<redacted>")
                .finish(),
        }
    }
}

/// A configured third-party camera feed and its sync cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullSource {
    pub id: Uuid,

    /// Globally unique human label
    pub name: String,

    /// Identity of the owning user, supplied by the auth layer
    pub owner_user_id: String,

    /// Location that ingested images are attributed to
    pub target_location_id: Uuid,

    pub base_url: String,

    pub auth_config: AuthConfig,

    /// Last filename successfully processed, in the gateway's sort order
    pub cursor: Option<String>,

    pub last_sync_at: Option<DateTime<Utc>>,

    pub is_active: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Input for creating a pull source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPullSource {
    pub name: String,
    pub owner_user_id: String,
    pub target_location_id: Uuid,
    pub base_url: String,
    #[serde(default)]
    pub auth_config: AuthConfig,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl NewPullSource {
    /// Check name, owner, base URL and credentials before anything is persisted
    pub fn validate(&self) -> Result<()> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ModelError::InvalidName("name cannot be empty".to_string()));
        }
        if name.chars().count() > MAX_SOURCE_NAME_LEN {
            return Err(ModelError::InvalidName(format!(
                "name cannot exceed {} characters",
                MAX_SOURCE_NAME_LEN
            )));
        }

        if self.owner_user_id.trim().is_empty() {
            return Err(ModelError::MissingOwner);
        }

        validate_base_url(&self.base_url)?;
        self.auth_config.validate()
    }

    /// Materialize the persisted record with a fresh id and an empty cursor
    pub fn into_source(self, now: DateTime<Utc>) -> PullSource {
        PullSource {
            id: Uuid::new_v4(),
            name: self.name.trim().to_string(),
            owner_user_id: self.owner_user_id,
            target_location_id: self.target_location_id,
            base_url: self.base_url,
            auth_config: self.auth_config,
            cursor: None,
            last_sync_at: None,
            is_active: self.is_active,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Base URLs must be absolute http(s) URLs without query or fragment.
pub fn validate_base_url(raw: &str) -> Result<()> {
    let invalid = |reason: &str| ModelError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(raw.trim()).map_err(|e| invalid(&e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {},
        other => return Err(invalid(&format!("unsupported scheme '{}'", other))),
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("query strings and fragments are not allowed"));
    }
    Ok(())
}

// ============================================================================
// Sync Reports
// ============================================================================

/// A file that could not be ingested during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    pub filename: String,
    pub reason: String,
}

/// Outcome of one sync run against one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    pub source_id: Uuid,
    pub files_attempted: usize,
    pub files_succeeded: usize,
    pub failures: Vec<FileFailure>,
    /// Cursor after the run; equal to the prior cursor when nothing succeeded
    pub resulting_cursor: Option<String>,
    /// The stored cursor was absent from the remote listing
    pub cursor_missing: bool,
    /// The source was disabled, so no remote calls were made
    pub skipped_inactive: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SyncResult {
    /// Zero-effect result for a disabled source
    pub fn inactive(source: &PullSource, now: DateTime<Utc>) -> Self {
        Self {
            source_id: source.id,
            files_attempted: 0,
            files_succeeded: 0,
            failures: Vec::new(),
            resulting_cursor: source.cursor.clone(),
            cursor_missing: false,
            skipped_inactive: true,
            started_at: now,
            finished_at: now,
        }
    }

    pub fn files_failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// What happened to one source during a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceOutcome {
    Synced { result: SyncResult },
    /// Another run already held the source
    Skipped { source_id: Uuid, reason: String },
    Failed { source_id: Uuid, error: String },
}

impl SourceOutcome {
    pub fn source_id(&self) -> Uuid {
        match self {
            SourceOutcome::Synced { result } => result.source_id,
            SourceOutcome::Skipped { source_id, .. } | SourceOutcome::Failed { source_id, .. } => {
                *source_id
            },
        }
    }
}

/// Aggregate of a sweep over every active source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepSummary {
    pub sources_total: usize,
    pub sources_synced: usize,
    pub sources_skipped: usize,
    pub sources_failed: usize,
    pub files_attempted: usize,
    pub files_succeeded: usize,
    pub files_failed: usize,
    pub outcomes: Vec<SourceOutcome>,
}

impl SweepSummary {
    pub fn record(&mut self, outcome: SourceOutcome) {
        self.sources_total += 1;
        match &outcome {
            SourceOutcome::Synced { result } => {
                self.sources_synced += 1;
                self.files_attempted += result.files_attempted;
                self.files_succeeded += result.files_succeeded;
                self.files_failed += result.files_failed();
            },
            SourceOutcome::Skipped { .. } => self.sources_skipped += 1,
            SourceOutcome::Failed { .. } => self.sources_failed += 1,
        }
        self.outcomes.push(outcome);
    }

    pub fn is_empty(&self) -> bool {
        self.sources_total == 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn new_source() -> NewPullSource {
        NewPullSource {
            name: "north-ridge".to_string(),
            owner_user_id: "auth0|owner".to_string(),
            target_location_id: Uuid::new_v4(),
            base_url: "https://feeds.example.org/cam1/".to_string(),
            auth_config: AuthConfig::None,
            is_active: true,
        }
    }

    #[test]
    fn test_auth_config_json_shape() {
        let auth = AuthConfig::Basic {
            username: "ranger".to_string(),
            password: "s3cret".to_string(),
        };
        let json = serde_json::to_value(&auth).unwrap();
        assert_eq!(json["type"], "basic");
        assert_eq!(json["username"], "ranger");

        let parsed: AuthConfig =
            serde_json::from_str(r#"{"type":"header","value":"Bearer abc"}"#).unwrap();
        assert_eq!(parsed, AuthConfig::Header { value: "Bearer abc".to_string() });

        let none: AuthConfig = serde_json::from_str(r#"{"type":"none"}"#).unwrap();
        assert_eq!(none, AuthConfig::None);
    }

    #[test]
    fn test_auth_config_debug_redacts_secrets() {
        let basic = AuthConfig::Basic {
            username: "ranger".to_string(),
            password: "s3cret".to_string(),
        };
        let header = AuthConfig::Header { value: "Bearer abc".to_string() };

        assert!(!format!("{:?}", basic).contains("s3cret"));
        assert!(format!("{:?}", basic).contains("ranger"));
        assert!(!format!("{:?}", header).contains("Bearer abc"));
    }

    #[test]
    fn test_validate_accepts_well_formed_source() {
        assert!(new_source().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_inputs() {
        let mut source = new_source();
        source.name = "   ".to_string();
        assert!(matches!(source.validate(), Err(ModelError::InvalidName(_))));

        let mut source = new_source();
        source.owner_user_id = String::new();
        assert_eq!(source.validate(), Err(ModelError::MissingOwner));

        let mut source = new_source();
        source.base_url = "ftp://feeds.example.org/".to_string();
        assert!(matches!(source.validate(), Err(ModelError::InvalidBaseUrl { .. })));

        let mut source = new_source();
        source.base_url = "https://feeds.example.org/?page=2".to_string();
        assert!(matches!(source.validate(), Err(ModelError::InvalidBaseUrl { .. })));

        let mut source = new_source();
        source.auth_config = AuthConfig::Header { value: " ".to_string() };
        assert!(matches!(source.validate(), Err(ModelError::InvalidAuth(_))));
    }

    #[test]
    fn test_into_source_starts_without_cursor() {
        let now = Utc::now();
        let source = new_source().into_source(now);
        assert!(source.cursor.is_none());
        assert!(source.last_sync_at.is_none());
        assert_eq!(source.created_at, now);
    }

    #[test]
    fn test_sweep_summary_totals() {
        let now = Utc::now();
        let mut summary = SweepSummary::default();
        assert!(summary.is_empty());

        let id = Uuid::new_v4();
        summary.record(SourceOutcome::Synced {
            result: SyncResult {
                source_id: id,
                files_attempted: 3,
                files_succeeded: 2,
                failures: vec![FileFailure {
                    filename: "a.jpg".to_string(),
                    reason: "timeout".to_string(),
                }],
                resulting_cursor: Some("c.jpg".to_string()),
                cursor_missing: false,
                skipped_inactive: false,
                started_at: now,
                finished_at: now,
            },
        });
        summary.record(SourceOutcome::Failed {
            source_id: Uuid::new_v4(),
            error: "listing failed".to_string(),
        });
        summary.record(SourceOutcome::Skipped {
            source_id: Uuid::new_v4(),
            reason: "already syncing".to_string(),
        });

        assert_eq!(summary.sources_total, 3);
        assert_eq!(summary.sources_synced, 1);
        assert_eq!(summary.sources_failed, 1);
        assert_eq!(summary.sources_skipped, 1);
        assert_eq!(summary.files_attempted, 3);
        assert_eq!(summary.files_succeeded, 2);
        assert_eq!(summary.files_failed, 1);
        assert_eq!(summary.outcomes[0].source_id(), id);
    }
}
