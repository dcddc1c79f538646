use std::{
    fmt::{self, Display},
    path::PathBuf,
};

use app_helpers::id::ulid_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::platform::Platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// The text is a search query unless it contains a link.
    Search,
    /// The text must contain a link.
    Download,
}

/// A request as handed over by the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    raw_text: String,
    kind: RequestKind,
    requested_at: DateTime<Utc>,
    requester: String,
}

impl Request {
    pub fn new<T, R>(raw_text: T, kind: RequestKind, requester: R) -> Self
    where
        T: Into<String>,
        R: Into<String>,
    {
        Self::at(raw_text, kind, requester, Utc::now())
    }

    pub fn at<T, R>(raw_text: T, kind: RequestKind, requester: R, at: DateTime<Utc>) -> Self
    where
        T: Into<String>,
        R: Into<String>,
    {
        Self {
            raw_text: raw_text.into(),
            kind,
            requested_at: at,
            requester: requester.into(),
        }
    }

    pub fn search<T, R>(raw_text: T, requester: R) -> Self
    where
        T: Into<String>,
        R: Into<String>,
    {
        Self::new(raw_text, RequestKind::Search, requester)
    }

    pub fn download<T, R>(raw_text: T, requester: R) -> Self
    where
        T: Into<String>,
        R: Into<String>,
    {
        Self::new(raw_text, RequestKind::Download, requester)
    }

    #[must_use]
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    #[must_use]
    pub const fn kind(&self) -> RequestKind {
        self.kind
    }

    #[must_use]
    pub const fn requested_at(&self) -> DateTime<Utc> {
        self.requested_at
    }

    #[must_use]
    pub fn requester(&self) -> &str {
        &self.requester
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    #[must_use]
    pub fn generate() -> Self {
        Self(ulid_id())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Bookkeeping for a single dispatched request.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadJob {
    pub id: JobId,
    pub platform: Platform,
    pub source: String,
    pub work_dir: PathBuf,
    pub started_at: DateTime<Utc>,
    pub status: JobStatus,
}

impl DownloadJob {
    #[must_use]
    pub fn new(id: JobId, platform: Platform, source: String, work_dir: PathBuf) -> Self {
        Self {
            id,
            platform,
            source,
            work_dir,
            started_at: Utc::now(),
            status: JobStatus::Pending,
        }
    }
}
