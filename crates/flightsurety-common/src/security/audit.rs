//! Audit logging
//!
//! Records security-relevant events of the marketplace:
//! - Authorization decisions of the access guard
//! - Operating status and caller-authorization changes
//! - Invariant violations that freeze an account

use std::collections::{HashMap, VecDeque};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// Audit event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AuditSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for AuditSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditSeverity::Info => write!(f, "INFO"),
            AuditSeverity::Warning => write!(f, "WARN"),
            AuditSeverity::Error => write!(f, "ERROR"),
            AuditSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Audit event category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditCategory {
    /// Guard decisions
    Authorization,
    /// Operating status and authorized callers
    Configuration,
    /// Ledger invariants
    Integrity,
}

impl std::fmt::Display for AuditCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditCategory::Authorization => write!(f, "AUTHZ"),
            AuditCategory::Configuration => write!(f, "CONFIG"),
            AuditCategory::Integrity => write!(f, "INTEGRITY"),
        }
    }
}

/// Audit outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOutcome {
    Success,
    Failure,
}

/// Audit event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    /// Timestamp (Unix millis)
    pub timestamp: i64,
    pub severity: AuditSeverity,
    pub category: AuditCategory,
    /// Operation name, e.g. "register_airline"
    pub action: String,
    pub outcome: AuditOutcome,
    /// Calling address
    pub actor: Option<String>,
    pub details: HashMap<String, String>,
}

impl AuditEvent {
    pub fn new(category: AuditCategory, action: &str, outcome: AuditOutcome) -> Self {
        Self {
            event_id: uuid::Uuid::now_v7().to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            severity: match outcome {
                AuditOutcome::Success => AuditSeverity::Info,
                AuditOutcome::Failure => AuditSeverity::Warning,
            },
            category,
            action: action.to_string(),
            outcome,
            actor: None,
            details: HashMap::new(),
        }
    }

    pub fn with_severity(mut self, severity: AuditSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_actor(mut self, actor: impl ToString) -> Self {
        self.actor = Some(actor.to_string());
        self
    }

    pub fn with_detail(mut self, key: &str, value: impl ToString) -> Self {
        self.details.insert(key.to_string(), value.to_string());
        self
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Audit log sink
pub trait AuditSink: Send + Sync {
    fn write(&self, event: &AuditEvent);
}

/// Emits audit events through `tracing`
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn write(&self, event: &AuditEvent) {
        let actor = event.actor.as_deref().unwrap_or("-");
        match event.severity {
            AuditSeverity::Info => {
                info!(category = %event.category, action = %event.action, actor, outcome = ?event.outcome, "audit")
            }
            AuditSeverity::Warning => {
                warn!(category = %event.category, action = %event.action, actor, outcome = ?event.outcome, "audit")
            }
            AuditSeverity::Error | AuditSeverity::Critical => {
                error!(category = %event.category, action = %event.action, actor, severity = %event.severity, "audit")
            }
        }
    }
}

/// Keeps the most recent events in memory
pub struct MemoryAuditSink {
    events: RwLock<VecDeque<AuditEvent>>,
    capacity: usize,
}

impl MemoryAuditSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
        }
    }

    /// Most recent events, oldest first
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.read().iter().cloned().collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn write(&self, event: &AuditEvent) {
        let mut events = self.events.write();
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event.clone());
    }
}

/// Audit logger
pub struct AuditLogger {
    sinks: Vec<Box<dyn AuditSink>>,
    recent: MemoryAuditSink,
    min_severity: AuditSeverity,
}

impl AuditLogger {
    /// Logger writing to `tracing` and keeping `capacity` recent events
    pub fn new(capacity: usize) -> Self {
        Self {
            sinks: vec![Box::new(TracingAuditSink)],
            recent: MemoryAuditSink::new(capacity),
            min_severity: AuditSeverity::Info,
        }
    }

    pub fn set_min_severity(&mut self, severity: AuditSeverity) {
        self.min_severity = severity;
    }

    pub fn log(&self, event: AuditEvent) {
        if event.severity < self.min_severity {
            return;
        }
        self.recent.write(&event);
        for sink in &self.sinks {
            sink.write(&event);
        }
    }

    /// Recent events, oldest first
    pub fn recent(&self) -> Vec<AuditEvent> {
        self.recent.events()
    }

    pub fn log_authorization(&self, actor: impl ToString, action: &str, allowed: bool, reason: &str) {
        let outcome = if allowed {
            AuditOutcome::Success
        } else {
            AuditOutcome::Failure
        };
        let event = AuditEvent::new(AuditCategory::Authorization, action, outcome)
            .with_actor(actor)
            .with_detail("reason", reason);
        self.log(event);
    }

    pub fn log_config_change(&self, actor: impl ToString, setting: &str, old_value: &str, new_value: &str) {
        let event = AuditEvent::new(AuditCategory::Configuration, "change", AuditOutcome::Success)
            .with_actor(actor)
            .with_detail("setting", setting)
            .with_detail("old_value", old_value)
            .with_detail("new_value", new_value);
        self.log(event);
    }

    pub fn log_invariant_violation(&self, subject: impl ToString, description: &str) {
        let event = AuditEvent::new(AuditCategory::Integrity, "invariant_violation", AuditOutcome::Failure)
            .with_severity(AuditSeverity::Critical)
            .with_actor(subject)
            .with_detail("description", description);
        self.log(event);
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_event_creation() {
        let event = AuditEvent::new(AuditCategory::Authorization, "buy", AuditOutcome::Failure)
            .with_actor("0xabc")
            .with_detail("reason", "not operational");

        assert_eq!(event.severity, AuditSeverity::Warning);
        assert_eq!(event.actor, Some("0xabc".to_string()));
        assert_eq!(event.details.get("reason"), Some(&"not operational".to_string()));
        assert!(event.to_json().contains("buy"));
    }

    #[test]
    fn test_memory_sink_is_bounded() {
        let sink = MemoryAuditSink::new(2);
        for action in ["a", "b", "c"] {
            sink.write(&AuditEvent::new(AuditCategory::Configuration, action, AuditOutcome::Success));
        }
        let actions: Vec<_> = sink.events().into_iter().map(|e| e.action).collect();
        assert_eq!(actions, vec!["b", "c"]);
    }

    #[test]
    fn test_min_severity_filters() {
        let mut logger = AuditLogger::new(8);
        logger.set_min_severity(AuditSeverity::Warning);
        logger.log_authorization("0x1", "buy", true, "ok");
        logger.log_authorization("0x1", "buy", false, "denied");
        logger.log_invariant_violation("0x2", "negative balance");

        let recent = logger.recent();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[1].severity, AuditSeverity::Critical);
    }
}
