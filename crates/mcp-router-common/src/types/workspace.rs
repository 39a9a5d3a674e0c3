use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceType {
    Local,
    Remote,
}

impl WorkspaceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

impl fmt::Display for WorkspaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkspaceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            other => Err(format!("unknown workspace type: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalWorkspaceConfig {
    pub database_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteWorkspaceConfig {
    pub api_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub workspace_type: WorkspaceType,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_config: Option<LocalWorkspaceConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_config: Option<RemoteWorkspaceConfig>,
}

impl Workspace {
    pub fn local(name: impl Into<String>, database_path: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: crate::id::new_id(),
            name: name.into(),
            workspace_type: WorkspaceType::Local,
            is_active: false,
            created_at: now,
            last_used_at: now,
            local_config: Some(LocalWorkspaceConfig {
                database_path: database_path.into(),
            }),
            remote_config: None,
        }
    }

    pub fn remote(name: impl Into<String>, api_url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: crate::id::new_id(),
            name: name.into(),
            workspace_type: WorkspaceType::Remote,
            is_active: false,
            created_at: now,
            last_used_at: now,
            local_config: None,
            remote_config: Some(RemoteWorkspaceConfig {
                api_url: api_url.into(),
            }),
        }
    }
}
