// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit trail for Keyward.
//!
//! Every state-changing vault and API key operation produces an
//! [`AuditEvent`]. Events name the actor (tenant or user) and the affected
//! resource but never carry plaintext, ciphertext, key material or tokens.
//!
//! Events are handed to an [`AuditSink`]. The default sink is
//! [`TracingAuditSink`], which emits structured records on the
//! `keyward_audit` tracing target so they can be routed separately from
//! application logs.

pub mod event;
pub mod sink;

pub use event::{AuditEvent, AuditEventBuilder, AuditEventType, AuditSeverity};
pub use sink::{AuditSink, MemoryAuditSink, TracingAuditSink, AUDIT_TARGET};
