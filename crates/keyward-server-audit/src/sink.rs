// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit sinks.

use std::sync::{Arc, Mutex};

use tracing::Level;

use crate::event::{AuditEvent, AuditEventType, AuditSeverity};

/// Tracing target used for audit records.
pub const AUDIT_TARGET: &str = "keyward_audit";

/// Destination for audit events.
///
/// Publishing is infallible from the caller's point of view: a sink that
/// cannot deliver an event logs the failure itself.
pub trait AuditSink: Send + Sync {
	fn name(&self) -> &str;
	fn publish(&self, event: &AuditEvent);
}

/// Emits audit events as structured tracing records on [`AUDIT_TARGET`].
#[derive(Debug, Default, Clone)]
pub struct TracingAuditSink;

impl TracingAuditSink {
	pub fn new() -> Self {
		Self
	}
}

pub fn severity_to_level(severity: AuditSeverity) -> Level {
	match severity {
		AuditSeverity::Debug => Level::DEBUG,
		AuditSeverity::Info | AuditSeverity::Notice => Level::INFO,
		AuditSeverity::Warning => Level::WARN,
		AuditSeverity::Error | AuditSeverity::Critical => Level::ERROR,
	}
}

macro_rules! emit_audit {
	($macro:ident, $event:expr) => {{
		let event = $event;
		let event_type = event.event_type.to_string();
		let severity = event.severity.to_string();
		let id = event.id.to_string();
		let timestamp = event.timestamp.to_rfc3339();
		let action = event.action.as_str();
		let tenant_id = event.tenant_id.as_deref();
		let actor_user_id = event.actor_user_id.as_deref();
		let resource_type = event.resource_type.as_deref();
		let resource_id = event.resource_id.as_deref();
		let details = if event.details.is_null() {
			None
		} else {
			Some(event.details.to_string())
		};
		tracing::$macro!(
			target: AUDIT_TARGET,
			event_type,
			severity,
			id,
			timestamp,
			action,
			tenant_id,
			actor_user_id,
			resource_type,
			resource_id,
			details,
			"audit event"
		);
	}};
}

impl AuditSink for TracingAuditSink {
	fn name(&self) -> &str {
		"tracing"
	}

	fn publish(&self, event: &AuditEvent) {
		let level = severity_to_level(event.severity);
		if level == Level::DEBUG {
			emit_audit!(debug, event);
		} else if level == Level::INFO {
			emit_audit!(info, event);
		} else if level == Level::WARN {
			emit_audit!(warn, event);
		} else {
			emit_audit!(error, event);
		}
	}
}

/// Keeps published events in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryAuditSink {
	events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl MemoryAuditSink {
	pub fn new() -> Self {
		Self::default()
	}

	/// Snapshot of all events published so far.
	pub fn events(&self) -> Vec<AuditEvent> {
		match self.events.lock() {
			Ok(events) => events.clone(),
			Err(poisoned) => poisoned.into_inner().clone(),
		}
	}

	pub fn events_of(&self, event_type: AuditEventType) -> Vec<AuditEvent> {
		self
			.events()
			.into_iter()
			.filter(|e| e.event_type == event_type)
			.collect()
	}

	pub fn clear(&self) {
		match self.events.lock() {
			Ok(mut events) => events.clear(),
			Err(poisoned) => poisoned.into_inner().clear(),
		}
	}
}

impl AuditSink for MemoryAuditSink {
	fn name(&self) -> &str {
		"memory"
	}

	fn publish(&self, event: &AuditEvent) {
		match self.events.lock() {
			Ok(mut events) => events.push(event.clone()),
			Err(poisoned) => poisoned.into_inner().push(event.clone()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn severity_maps_to_tracing_level() {
		assert_eq!(severity_to_level(AuditSeverity::Debug), Level::DEBUG);
		assert_eq!(severity_to_level(AuditSeverity::Notice), Level::INFO);
		assert_eq!(severity_to_level(AuditSeverity::Warning), Level::WARN);
		assert_eq!(severity_to_level(AuditSeverity::Critical), Level::ERROR);
	}

	#[test]
	fn tracing_sink_publishes_without_subscriber() {
		let sink = TracingAuditSink::new();
		let event = AuditEvent::builder(AuditEventType::SecretDecryptionFailed)
			.tenant("tenant-a")
			.resource("secret", "sec-1")
			.build();
		sink.publish(&event);
		assert_eq!(sink.name(), "tracing");
	}

	#[test]
	fn memory_sink_records_in_order() {
		let sink = MemoryAuditSink::new();
		let shared = sink.clone();

		sink.publish(&AuditEvent::builder(AuditEventType::SecretCreated).build());
		sink.publish(&AuditEvent::builder(AuditEventType::SecretRotated).build());
		sink.publish(&AuditEvent::builder(AuditEventType::SecretRotated).build());

		let events = shared.events();
		assert_eq!(events.len(), 3);
		assert_eq!(events[0].event_type, AuditEventType::SecretCreated);
		assert_eq!(shared.events_of(AuditEventType::SecretRotated).len(), 2);

		shared.clear();
		assert!(sink.events().is_empty());
	}
}
