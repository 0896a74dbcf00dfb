use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::AuditAction;

/// append-only record of one successful mutating call or auth event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: Uuid,
    pub actor: String,
    pub action: AuditAction,
    pub entity_kind: String,
    pub entity_id: String,
    /// full input/output payload, JSON-serialized
    pub payload: serde_json::Value,
    pub at: DateTime<Utc>,
    pub remote_ip: String,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub correlation_id: Option<String>,
}

impl AuditEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        actor: impl Into<String>,
        action: AuditAction,
        entity_kind: impl Into<String>,
        entity_id: impl Into<String>,
        payload: serde_json::Value,
        remote_ip: impl Into<String>,
        user_agent: Option<String>,
        correlation_id: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        AuditEntry {
            id: Uuid::new_v4(),
            actor: actor.into(),
            action,
            entity_kind: entity_kind.into(),
            entity_id: entity_id.into(),
            payload,
            at,
            remote_ip: remote_ip.into(),
            user_agent,
            correlation_id,
        }
    }
}

/// audit-log browse filter; every field is optional and conjunctive
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditQuery {
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub action: Option<AuditAction>,
    #[serde(default)]
    pub entity_kind: Option<String>,
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

impl AuditQuery {
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(actor) = &self.actor {
            if &entry.actor != actor {
                return false;
            }
        }
        if let Some(action) = self.action {
            if entry.action != action {
                return false;
            }
        }
        if let Some(kind) = &self.entity_kind {
            if &entry.entity_kind != kind {
                return false;
            }
        }
        if let Some(from) = self.from {
            if entry.at < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if entry.at > to {
                return false;
            }
        }
        true
    }
}
