//! JSONL audit trail.
//!
//! Each run appends events to an audit.jsonl file, one JSON object per
//! line, so every plan and order submission is reconstructible after the
//! fact.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::execution::{ExecutionReport, OrderRecord, OrderStatus};
use crate::planner::PlanItem;

/// An audit event written to the JSONL trail.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub event: &'static str,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub data: serde_json::Value,
}

/// Append-only audit logger.
pub struct AuditLog {
    writer: BufWriter<std::fs::File>,
}

impl AuditLog {
    /// Open (or create) the audit log file for appending.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Log an event with arbitrary JSON data.
    pub fn log(&mut self, event: &'static str, data: serde_json::Value) -> Result<()> {
        let entry = AuditEvent {
            event,
            ts: Utc::now(),
            data,
        };
        let json = serde_json::to_string(&entry)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writeln!(self.writer, "{json}")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Log a simple event with no additional data.
    pub fn log_simple(&mut self, event: &'static str) -> Result<()> {
        self.log(event, serde_json::json!({}))
    }
}

/// Convenience: log a run start event.
pub fn log_run_started(audit: &mut AuditLog, portfolio_file: &str, account: &str) -> Result<()> {
    audit.log(
        "run_started",
        serde_json::json!({
            "portfolio_file": portfolio_file,
            "account": account,
        }),
    )
}

/// Convenience: log the fetched balance.
pub fn log_balance(
    audit: &mut AuditLog,
    total_asset: i64,
    holdings: &[kis_broker::Holding],
) -> Result<()> {
    let rows: Vec<_> = holdings
        .iter()
        .map(|h| {
            serde_json::json!({
                "code": h.code,
                "qty": h.quantity,
                "market_value": h.market_value,
            })
        })
        .collect();

    audit.log(
        "balance_fetched",
        serde_json::json!({
            "total_asset": total_asset,
            "holdings": rows,
        }),
    )
}

/// Convenience: log the computed plan.
pub fn log_plan(audit: &mut AuditLog, items: &[PlanItem]) -> Result<()> {
    let rows: Vec<_> = items
        .iter()
        .map(|i| {
            serde_json::json!({
                "code": i.code,
                "action": format!("{}", i.action),
                "target_amount": i.target_amount,
                "current_amount": i.current_amount,
                "qty": i.quantity,
                "reference_price": i.reference_price,
            })
        })
        .collect();

    audit.log("plan_computed", serde_json::json!({ "items": rows }))
}

/// Convenience: log every order outcome from one execution pass.
pub fn log_execution(audit: &mut AuditLog, report: &ExecutionReport) -> Result<()> {
    for record in &report.orders {
        log_order(audit, record)?;
    }
    audit.log(
        "run_completed",
        serde_json::json!({
            "submitted": report.submitted(),
            "accepted": report.accepted,
            "rejected": report.rejected,
            "failed": report.failed,
            "skipped": report.skipped,
        }),
    )
}

fn log_order(audit: &mut AuditLog, record: &OrderRecord) -> Result<()> {
    let (event, detail) = match &record.status {
        OrderStatus::Accepted { order_no } => (
            "order_submitted",
            serde_json::json!({ "order_no": order_no }),
        ),
        OrderStatus::Rejected { code, message } => (
            "order_rejected",
            serde_json::json!({ "code": code, "message": message }),
        ),
        OrderStatus::Failed { error } => ("order_failed", serde_json::json!({ "error": error })),
    };

    audit.log(
        event,
        serde_json::json!({
            "code": record.code,
            "side": format!("{}", record.side),
            "qty": record.quantity,
            "price": record.price,
            "tier": record.tier,
            "detail": detail,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_log_writes_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_audit.jsonl");

        {
            let mut log = AuditLog::open(&path).unwrap();
            log.log_simple("test_event").unwrap();
            log.log("test_data", serde_json::json!({"key": "value"}))
                .unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        for line in &lines {
            let _: serde_json::Value = serde_json::from_str(line).unwrap();
        }

        assert!(lines[0].contains("\"event\":\"test_event\""));
    }

    #[test]
    fn audit_log_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subdir").join("deep").join("audit.jsonl");

        let mut log = AuditLog::open(&path).unwrap();
        log.log_simple("test").unwrap();

        assert!(path.exists());
    }
}
