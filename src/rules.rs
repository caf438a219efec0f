//! Threshold rules evaluated against every metric on the metric topic.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::Metric;

/// Comparison applied between a metric value and a rule threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
}

impl Operator {
    pub fn apply(self, value: f64, threshold: f64) -> bool {
        match self {
            Operator::Gt => value > threshold,
            Operator::Lt => value < threshold,
            Operator::Eq => value == threshold,
            Operator::Ge => value >= threshold,
            Operator::Le => value <= threshold,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Eq => "=",
            Operator::Ge => ">=",
            Operator::Le => "<=",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            ">" => Ok(Operator::Gt),
            "<" => Ok(Operator::Lt),
            "=" | "==" => Ok(Operator::Eq),
            ">=" => Ok(Operator::Ge),
            "<=" => Ok(Operator::Le),
            other => Err(format!("unknown operator '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: String,

    /// Restricts the rule to one device; `None` applies it to all devices
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,

    pub metric_name: String,

    pub operator: Operator,

    pub threshold: f64,

    pub severity: Severity,

    pub description: String,
}

impl AlertRule {
    pub fn applies_to(&self, device_id: &str) -> bool {
        match &self.device_id {
            Some(scope) => scope.is_empty() || scope == device_id,
            None => true,
        }
    }

    /// Returns the offending value when the rule triggers for `metric`
    pub fn check(&self, metric: &Metric) -> Option<f64> {
        if !self.applies_to(&metric.device_id) {
            return None;
        }

        let value = metric.value(&self.metric_name)?.as_f64();
        self.operator
            .apply(value, self.threshold)
            .then_some(value)
    }
}

/// A rule that triggered for a particular metric
#[derive(Debug, Clone, PartialEq)]
pub struct Violation<'a> {
    pub rule: &'a AlertRule,
    pub value: f64,
}

impl Violation<'_> {
    pub fn subject(&self) -> String {
        format!("NMS Alert: {}", self.rule.description)
    }

    pub fn message(&self, metric: &Metric) -> String {
        format!(
            "ALERT [{}]: Device {} ({}) - {} (Value: {:.2})",
            self.rule.severity,
            metric.display_name(),
            metric.ip_address,
            self.rule.description,
            self.value
        )
    }
}

/// Immutable rule set handed to the alert engine at start-up
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    rules: Vec<AlertRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<AlertRule>) -> Self {
        Self { rules }
    }

    /// Latency and reachability rules used when no rules are configured
    pub fn defaults() -> Self {
        Self::new(vec![
            AlertRule {
                id: "rule-1".to_string(),
                device_id: None,
                metric_name: "rtt_ms".to_string(),
                operator: Operator::Gt,
                threshold: 100.0,
                severity: Severity::Warning,
                description: "High Latency (>100ms)".to_string(),
            },
            AlertRule {
                id: "rule-2".to_string(),
                device_id: None,
                metric_name: "success".to_string(),
                operator: Operator::Eq,
                threshold: 0.0,
                severity: Severity::Critical,
                description: "Device Down".to_string(),
            },
        ])
    }

    pub fn rules(&self) -> &[AlertRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// All rules triggered by `metric`, in rule order
    pub fn evaluate(&self, metric: &Metric) -> Vec<Violation<'_>> {
        self.rules
            .iter()
            .filter_map(|rule| rule.check(metric).map(|value| Violation { rule, value }))
            .collect()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MetricValue;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn metric(device_id: &str, values: &[(&str, MetricValue)]) -> Metric {
        Metric {
            device_id: device_id.to_string(),
            device_name: Some("core-router".to_string()),
            ip_address: "10.0.0.1".parse().unwrap(),
            timestamp: Utc::now(),
            values: values
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<BTreeMap<_, _>>(),
            tags: BTreeMap::new(),
        }
    }

    #[test]
    fn test_high_latency_fires_once() {
        let rules = RuleSet::defaults();
        let m = metric(
            "d1",
            &[
                ("rtt_ms", MetricValue::Number(150.0)),
                ("success", MetricValue::Bool(true)),
            ],
        );

        let violations = rules.evaluate(&m);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule.id, "rule-1");
        assert_eq!(
            violations[0].message(&m),
            "ALERT [warning]: Device core-router (10.0.0.1) - High Latency (>100ms) (Value: 150.00)"
        );
        assert_eq!(violations[0].subject(), "NMS Alert: High Latency (>100ms)");
    }

    #[test]
    fn test_failed_poll_fires_device_down() {
        let rules = RuleSet::defaults();
        let m = metric(
            "d1",
            &[
                ("rtt_ms", MetricValue::Number(0.0)),
                ("success", MetricValue::Bool(false)),
            ],
        );

        let violations = rules.evaluate(&m);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule.severity, Severity::Critical);
        assert_eq!(violations[0].value, 0.0);
    }

    #[test]
    fn test_absent_metric_is_skipped() {
        let rules = RuleSet::defaults();
        let m = metric("d1", &[("cpu_load", MetricValue::Number(99.0))]);
        assert!(rules.evaluate(&m).is_empty());
    }

    #[test]
    fn test_device_scope() {
        let rule = AlertRule {
            id: "cpu".to_string(),
            device_id: Some("edge-1".to_string()),
            metric_name: "cpu_load".to_string(),
            operator: Operator::Ge,
            threshold: 90.0,
            severity: Severity::Info,
            description: "CPU busy".to_string(),
        };
        let rules = RuleSet::new(vec![rule]);

        let other = metric("edge-2", &[("cpu_load", MetricValue::Number(95.0))]);
        assert!(rules.evaluate(&other).is_empty());

        let scoped = metric("edge-1", &[("cpu_load", MetricValue::Number(90.0))]);
        assert_eq!(rules.evaluate(&scoped).len(), 1);
    }

    #[test]
    fn test_operator_parsing() {
        assert_eq!(">=".parse::<Operator>(), Ok(Operator::Ge));
        assert_eq!("=".parse::<Operator>(), Ok(Operator::Eq));
        assert!("!=".parse::<Operator>().is_err());

        let op: Operator = serde_json::from_str("\"<=\"").unwrap();
        assert_eq!(op, Operator::Le);
    }

    #[test]
    fn test_rule_deserialization() {
        let rule: AlertRule = serde_json::from_value(serde_json::json!({
            "id": "rx",
            "metric_name": "rx_power_dbm",
            "operator": "<",
            "threshold": -27.0,
            "severity": "warning",
            "description": "Weak optical signal"
        }))
        .unwrap();

        assert_eq!(rule.operator, Operator::Lt);
        assert!(rule.device_id.is_none());
        assert!(rule.applies_to("anything"));
    }
}
