//! Alert Rule Engine
//!
//! Rules are predicates over the runtime counters, each with its own cooldown.
//! A fired rule creates an `Alert` that lands in a bounded history and in the
//! active set until resolved, and is fanned out to every configured channel.
//! An unresolved alert that ages out of the history leaves the active set too.
//! One channel failing never keeps the others from receiving the alert.
//!
//! Rule and alert state is in memory for the process lifetime.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::adapters::NotificationChannel;
use crate::config::AlertsConfig;
use crate::services::{MetricsSnapshot, RuntimeMetrics};

/// Alert severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    pub fn emoji(&self) -> &'static str {
        match self {
            AlertSeverity::Low => "\u{2139}\u{fe0f}",    // info icon
            AlertSeverity::Medium => "\u{26a0}\u{fe0f}", // warning icon
            AlertSeverity::High => "\u{274c}",           // red X
            AlertSeverity::Critical => "\u{1f6a8}",      // police light
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Low => "low",
            AlertSeverity::Medium => "medium",
            AlertSeverity::High => "high",
            AlertSeverity::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Subsystem an alert is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    System,
    Ml,
    Api,
    Database,
    Telegram,
    Security,
    Performance,
    Business,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::System => "system",
            AlertType::Ml => "ml",
            AlertType::Api => "api",
            AlertType::Database => "database",
            AlertType::Telegram => "telegram",
            AlertType::Security => "security",
            AlertType::Performance => "performance",
            AlertType::Business => "business",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub id: String,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_notes: Option<String>,
}

impl Alert {
    pub fn new(alert_type: AlertType, severity: AlertSeverity, title: &str, message: &str) -> Self {
        Self::new_at(alert_type, severity, title, message, Utc::now())
    }

    /// Id is `<type>_<unix seconds>`; the engine suffixes it on collision
    pub fn new_at(
        alert_type: AlertType,
        severity: AlertSeverity,
        title: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: format!("{}_{}", alert_type.as_str(), now.timestamp()),
            alert_type,
            severity,
            title: title.to_string(),
            message: message.to_string(),
            metadata: None,
            created_at: now,
            resolved: false,
            resolved_at: None,
            resolution_notes: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Notification text
    pub fn format_text(&self) -> String {
        format!(
            "{} [{}] {}\n{} | {}\n\n{}",
            self.severity.emoji(),
            self.severity.as_str().to_uppercase(),
            self.title,
            self.alert_type,
            self.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.message
        )
    }

    fn format_resolution(&self) -> String {
        let mut text = format!("\u{2705} Resolved: {} ({})", self.title, self.id);
        if let Some(notes) = &self.resolution_notes {
            text.push('\n');
            text.push_str(notes);
        }
        text
    }
}

pub type RulePredicate = Arc<dyn Fn(&MetricsSnapshot) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct AlertRule {
    pub name: String,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub cooldown_secs: u64,
    pub enabled: bool,
    pub last_triggered_at: Option<DateTime<Utc>>,
    predicate: RulePredicate,
}

impl AlertRule {
    pub fn new<F>(
        name: &str,
        alert_type: AlertType,
        severity: AlertSeverity,
        cooldown_secs: u64,
        predicate: F,
    ) -> Self
    where
        F: Fn(&MetricsSnapshot) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            alert_type,
            severity,
            title: name.replace('_', " "),
            message: format!("Rule {} triggered", name),
            cooldown_secs,
            enabled: true,
            last_triggered_at: None,
            predicate: Arc::new(predicate),
        }
    }

    pub fn with_text(mut self, title: &str, message: &str) -> Self {
        self.title = title.to_string();
        self.message = message.to_string();
        self
    }

    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        self.last_triggered_at
            .map(|last| now.signed_duration_since(last).num_seconds() < self.cooldown_secs as i64)
            .unwrap_or(false)
    }

    pub fn matches(&self, input: &MetricsSnapshot) -> bool {
        (self.predicate)(input)
    }

    fn status(&self) -> RuleStatus {
        RuleStatus {
            name: self.name.clone(),
            alert_type: self.alert_type,
            severity: self.severity,
            cooldown_secs: self.cooldown_secs,
            enabled: self.enabled,
            last_triggered_at: self.last_triggered_at,
        }
    }
}

impl fmt::Debug for AlertRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertRule")
            .field("name", &self.name)
            .field("alert_type", &self.alert_type)
            .field("severity", &self.severity)
            .field("cooldown_secs", &self.cooldown_secs)
            .field("enabled", &self.enabled)
            .field("last_triggered_at", &self.last_triggered_at)
            .finish_non_exhaustive()
    }
}

/// Serializable view of a rule
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleStatus {
    pub name: String,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub cooldown_secs: u64,
    pub enabled: bool,
    pub last_triggered_at: Option<DateTime<Utc>>,
}

/// Built-in rules over the runtime counters
pub fn default_rules(config: &AlertsConfig) -> Vec<AlertRule> {
    let max_error_rate = config.max_error_rate;
    let min_accuracy = config.min_accuracy;
    let max_channel_failure_rate = config.max_channel_failure_rate;
    let max_active_matches = config.max_active_matches as u64;

    vec![
        AlertRule::new(
            "workers_unhealthy",
            AlertType::System,
            AlertSeverity::Critical,
            600,
            |m| m.unhealthy_workers > 0,
        )
        .with_text("Workers unhealthy", "One or more workers failed the health check"),
        AlertRule::new(
            "high_error_rate",
            AlertType::Api,
            AlertSeverity::High,
            config.default_cooldown_secs,
            move |m| m.error_rate() > max_error_rate,
        )
        .with_text(
            "High error rate",
            &format!("Worker cycle error rate above {:.0}%", max_error_rate * 100.0),
        ),
        AlertRule::new(
            "low_model_accuracy",
            AlertType::Ml,
            AlertSeverity::Medium,
            1800,
            move |m| m.model_accuracy.is_some_and(|a| a < min_accuracy),
        )
        .with_text(
            "Low model accuracy",
            &format!("Settled signal accuracy below {:.0}%", min_accuracy * 100.0),
        ),
        AlertRule::new(
            "channel_send_failures",
            AlertType::Telegram,
            AlertSeverity::High,
            config.default_cooldown_secs,
            move |m| m.channel_failure_rate() > max_channel_failure_rate,
        )
        .with_text(
            "Notification failures",
            &format!(
                "Notification failure rate above {:.0}%",
                max_channel_failure_rate * 100.0
            ),
        ),
        AlertRule::new(
            "too_many_active_matches",
            AlertType::Performance,
            AlertSeverity::Medium,
            600,
            move |m| m.active_matches > max_active_matches,
        )
        .with_text(
            "Too many active matches",
            &format!("More than {} live matches tracked", max_active_matches),
        ),
    ]
}

pub struct AlertEngine {
    capacity: usize,
    history: RwLock<VecDeque<Alert>>,
    active: DashMap<String, Alert>,
    rules: RwLock<Vec<AlertRule>>,
    channels: Vec<Arc<dyn NotificationChannel>>,
    metrics: Option<Arc<RuntimeMetrics>>,
}

impl AlertEngine {
    /// Empty engine with no rules and no channels
    pub fn new(history_capacity: usize) -> Self {
        Self {
            capacity: history_capacity,
            history: RwLock::new(VecDeque::with_capacity(history_capacity.min(1024))),
            active: DashMap::new(),
            rules: RwLock::new(Vec::new()),
            channels: Vec::new(),
            metrics: None,
        }
    }

    /// Engine with the built-in rules installed
    pub fn from_config(config: &AlertsConfig) -> Self {
        let engine = Self::new(config.history_capacity);
        Self {
            rules: RwLock::new(default_rules(config)),
            ..engine
        }
    }

    pub fn with_channel(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        self.channels.push(channel);
        self
    }

    /// Count every channel send in `metrics`
    pub fn with_metrics(mut self, metrics: Arc<RuntimeMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.name().to_string()).collect()
    }

    pub async fn create(
        &self,
        alert_type: AlertType,
        severity: AlertSeverity,
        title: &str,
        message: &str,
    ) -> Alert {
        self.raise(Alert::new(alert_type, severity, title, message))
            .await
    }

    /// Record a prepared alert and notify every channel
    pub async fn raise(&self, mut alert: Alert) -> Alert {
        {
            let mut history = self.history.write().await;
            alert.id = self.unique_id(&alert.id, &history);
            if self.capacity > 0 {
                while history.len() >= self.capacity {
                    let Some(expired) = history.pop_front() else {
                        break;
                    };
                    if self.active.remove(&expired.id).is_some() {
                        debug!(alert_id = %expired.id, "Unresolved alert aged out of history");
                    }
                }
                history.push_back(alert.clone());
            }
            self.active.insert(alert.id.clone(), alert.clone());
        }

        match alert.severity {
            AlertSeverity::Low => info!(alert_id = %alert.id, "[{}] {}: {}", alert.alert_type, alert.title, alert.message),
            AlertSeverity::Medium => {
                warn!(alert_id = %alert.id, "[{}] {}: {}", alert.alert_type, alert.title, alert.message)
            }
            AlertSeverity::High => {
                error!(alert_id = %alert.id, "[{}] {}: {}", alert.alert_type, alert.title, alert.message)
            }
            AlertSeverity::Critical => error!(
                alert_id = %alert.id,
                "CRITICAL [{}] {}: {}",
                alert.alert_type,
                alert.title,
                alert.message
            ),
        }

        self.dispatch(&alert.format_text()).await;
        alert
    }

    fn unique_id(&self, base: &str, history: &VecDeque<Alert>) -> String {
        let taken = |id: &str| self.active.contains_key(id) || history.iter().any(|a| a.id == id);
        if !taken(base) {
            return base.to_string();
        }
        let mut n = 1;
        loop {
            let candidate = format!("{}_{}", base, n);
            if !taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Send to all channels concurrently; returns how many accepted the message
    async fn dispatch(&self, text: &str) -> usize {
        if self.channels.is_empty() {
            return 0;
        }

        let sends = self.channels.iter().map(|channel| async move {
            (channel.name().to_string(), channel.send(text).await)
        });

        let mut delivered = 0;
        for (name, result) in join_all(sends).await {
            if let Some(metrics) = &self.metrics {
                metrics.record_send(result.is_ok());
            }
            match result {
                Ok(_) => delivered += 1,
                Err(e) => warn!(channel = %name, error = %e, "Alert dispatch failed"),
            }
        }
        delivered
    }

    /// Close an active alert. Unknown or already-resolved ids are ignored.
    pub async fn resolve(&self, id: &str, notes: &str) -> Option<Alert> {
        let Some((_, mut alert)) = self.active.remove(id) else {
            debug!(alert_id = id, "Resolve ignored, alert not active");
            return None;
        };

        alert.resolved = true;
        alert.resolved_at = Some(Utc::now());
        alert.resolution_notes = (!notes.is_empty()).then(|| notes.to_string());

        {
            let mut history = self.history.write().await;
            if let Some(entry) = history.iter_mut().rev().find(|a| a.id == id) {
                *entry = alert.clone();
            }
        }

        info!(alert_id = id, "Alert resolved");
        self.dispatch(&alert.format_resolution()).await;
        Some(alert)
    }

    /// Unresolved alerts, newest first
    pub fn active(&self) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self.active.iter().map(|e| e.value().clone()).collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        alerts
    }

    /// Up to `limit` most recent alerts, newest first
    pub async fn history(&self, limit: usize) -> Vec<Alert> {
        self.history
            .read()
            .await
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn evaluate_rules(&self, input: &MetricsSnapshot) -> Vec<Alert> {
        self.evaluate_rules_at(input, Utc::now()).await
    }

    /// One rule tick at `now`. Rules still in cooldown are not evaluated.
    pub async fn evaluate_rules_at(
        &self,
        input: &MetricsSnapshot,
        now: DateTime<Utc>,
    ) -> Vec<Alert> {
        let fired: Vec<Alert> = {
            let mut rules = self.rules.write().await;
            rules
                .iter_mut()
                .filter(|rule| rule.enabled)
                .filter_map(|rule| {
                    if rule.in_cooldown(now) {
                        debug!(rule = %rule.name, "Rule in cooldown");
                        return None;
                    }
                    if !rule.matches(input) {
                        return None;
                    }
                    rule.last_triggered_at = Some(now);
                    Some(
                        Alert::new_at(rule.alert_type, rule.severity, &rule.title, &rule.message, now)
                            .with_metadata(serde_json::json!({
                                "rule": rule.name,
                                "metrics": input,
                            })),
                    )
                })
                .collect()
        };

        let mut raised = Vec::with_capacity(fired.len());
        for alert in fired {
            raised.push(self.raise(alert).await);
        }
        raised
    }

    /// Insert or replace (by name)
    pub async fn add_rule(&self, rule: AlertRule) {
        let mut rules = self.rules.write().await;
        match rules.iter_mut().find(|r| r.name == rule.name) {
            Some(existing) => *existing = rule,
            None => rules.push(rule),
        }
    }

    pub async fn remove_rule(&self, name: &str) -> bool {
        let mut rules = self.rules.write().await;
        let before = rules.len();
        rules.retain(|r| r.name != name);
        rules.len() != before
    }

    pub async fn set_rule_enabled(&self, name: &str, enabled: bool) -> bool {
        let mut rules = self.rules.write().await;
        match rules.iter_mut().find(|r| r.name == name) {
            Some(rule) => {
                rule.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub async fn rules(&self) -> Vec<RuleStatus> {
        self.rules.read().await.iter().map(AlertRule::status).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MessageReceipt, MockNotificationChannel};
    use crate::error::ChannelDispatchError;

    fn mock_channel(name: &str, sends: usize, fail: bool) -> Arc<dyn NotificationChannel> {
        let mut mock = MockNotificationChannel::new();
        mock.expect_name().return_const(name.to_string());
        let channel = name.to_string();
        mock.expect_send().times(sends).returning(move |_| {
            if fail {
                Err(ChannelDispatchError::Transport {
                    channel: channel.clone(),
                    reason: "connection reset".into(),
                })
            } else {
                Ok(MessageReceipt::with_id("1"))
            }
        });
        Arc::new(mock)
    }

    #[test]
    fn test_severity_ordering() {
        assert!(AlertSeverity::Low < AlertSeverity::Medium);
        assert!(AlertSeverity::Medium < AlertSeverity::High);
        assert!(AlertSeverity::High < AlertSeverity::Critical);
    }

    #[test]
    fn alert_id_from_type_and_timestamp() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let alert = Alert::new_at(AlertType::Ml, AlertSeverity::Medium, "t", "m", now);
        assert_eq!(alert.id, "ml_1700000000");
        assert!(alert.format_text().contains("[MEDIUM] t"));
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let engine = AlertEngine::new(3);
        for i in 0..5 {
            engine
                .create(AlertType::System, AlertSeverity::Low, &format!("a{}", i), "x")
                .await;
        }
        let history = engine.history(10).await;
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].title, "a4");
        assert_eq!(history[2].title, "a2");

        let active: Vec<String> = engine.active().into_iter().map(|a| a.title).collect();
        assert_eq!(active, vec!["a4", "a3", "a2"]);
    }

    #[tokio::test]
    async fn test_active_set_follows_history_bound() {
        let engine = AlertEngine::new(10);
        for i in 0..50 {
            engine
                .create(AlertType::System, AlertSeverity::High, &format!("w{}", i), "down")
                .await;
        }
        assert_eq!(engine.history(100).await.len(), 10);
        assert_eq!(engine.active().len(), 10);

        let oldest = engine.history(10).await[9].id.clone();
        engine.resolve(&oldest, "ok").await.unwrap();
        assert_eq!(engine.active().len(), 9);
        engine
            .create(AlertType::System, AlertSeverity::High, "w50", "down")
            .await;
        let active = engine.active();
        assert_eq!(active.len(), 10);
        assert!(active.iter().all(|a| a.id != oldest));
    }

    #[tokio::test]
    async fn test_same_second_ids_are_unique() {
        let engine = AlertEngine::new(10);
        let now = Utc::now();
        let a = engine
            .raise(Alert::new_at(AlertType::Api, AlertSeverity::High, "a", "", now))
            .await;
        let b = engine
            .raise(Alert::new_at(AlertType::Api, AlertSeverity::High, "b", "", now))
            .await;
        assert_ne!(a.id, b.id);
        assert_eq!(b.id, format!("{}_1", a.id));
    }

    #[tokio::test]
    async fn test_resolve_unknown_is_noop() {
        let engine = AlertEngine::new(10).with_channel(mock_channel("silent", 0, false));
        assert!(engine.resolve("system_0", "nothing").await.is_none());
        assert!(engine.active().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_stamps_and_notifies() {
        let engine = AlertEngine::new(10).with_channel(mock_channel("primary", 2, false));
        let alert = engine
            .create(AlertType::Database, AlertSeverity::High, "store down", "timeout")
            .await;

        let resolved = engine.resolve(&alert.id, "recovered").await.unwrap();
        assert!(resolved.resolved);
        assert!(resolved.resolved_at.is_some());
        assert_eq!(resolved.resolution_notes.as_deref(), Some("recovered"));
        assert!(engine.active().is_empty());
        assert!(engine.history(1).await[0].resolved);

        // second resolve does nothing and sends nothing
        assert!(engine.resolve(&alert.id, "again").await.is_none());
    }

    #[tokio::test]
    async fn test_failing_channel_does_not_block_others() {
        let metrics = Arc::new(RuntimeMetrics::new());
        let engine = AlertEngine::new(10)
            .with_channel(mock_channel("broken", 1, true))
            .with_channel(mock_channel("healthy", 1, false))
            .with_metrics(metrics.clone());

        let alert = engine
            .create(AlertType::Telegram, AlertSeverity::High, "x", "y")
            .await;
        assert_eq!(engine.active()[0].id, alert.id);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.channel_sends, 2);
        assert_eq!(snapshot.channel_failures, 1);
    }

    #[tokio::test]
    async fn test_disabled_rule_is_skipped() {
        let engine = AlertEngine::new(10);
        engine
            .add_rule(AlertRule::new("always", AlertType::Business, AlertSeverity::Low, 0, |_| true))
            .await;
        assert!(engine.set_rule_enabled("always", false).await);

        let input = MetricsSnapshot::default();
        assert!(engine.evaluate_rules(&input).await.is_empty());

        assert!(engine.set_rule_enabled("always", true).await);
        assert_eq!(engine.evaluate_rules(&input).await.len(), 1);

        assert!(engine.remove_rule("always").await);
        assert!(!engine.remove_rule("always").await);
        assert!(engine.rules().await.is_empty());
    }

    #[tokio::test]
    async fn test_default_rules_follow_thresholds() {
        let engine = AlertEngine::from_config(&AlertsConfig::default());
        assert_eq!(engine.rules().await.len(), 5);

        let quiet = MetricsSnapshot {
            worker_cycles: 100,
            worker_failures: 5,
            channel_sends: 10,
            model_accuracy: Some(0.7),
            active_matches: 40,
            ..Default::default()
        };
        assert!(engine.evaluate_rules(&quiet).await.is_empty());

        let noisy = MetricsSnapshot {
            worker_cycles: 10,
            worker_failures: 5,
            unhealthy_workers: 1,
            model_accuracy: Some(0.4),
            ..Default::default()
        };
        let fired = engine.evaluate_rules(&noisy).await;
        let types: Vec<AlertType> = fired.iter().map(|a| a.alert_type).collect();
        assert_eq!(types, vec![AlertType::System, AlertType::Api, AlertType::Ml]);
        assert_eq!(fired[0].severity, AlertSeverity::Critical);
    }
}
