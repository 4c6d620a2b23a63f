// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-worker bridge daemon: one poll loop mediating between the
//! shared filesystem state and one provider CLI.
//!
//! Loop order per cycle: signals, quarantine, heartbeat, inbox, task
//! claim, prompt build, CLI spawn, permission audit, report/retry,
//! rotation. A broad catch keeps the loop alive through transient faults;
//! only a shutdown or drain signal ends it.

use crate::error::BridgeError;
use crate::permissions::{
    find_permission_violations, format_permission_instructions, EffectivePermissions,
};
use crate::prompt::build_task_prompt;
use omc_adapters::{changed_files, CliError, CliRequest, CliRunner, SessionHost};
use omc_core::{
    session_name, BridgeConfig, Clock, Heartbeat, InboxMessage, MemberRecord, OutboxMessage,
    PermissionEnforcement, SignalPayload, Task, TaskStatus, WorkerStatus,
};
use omc_store::{
    AuditEvent, AuditKind, AuditLog, HeartbeatStore, Mailbox, Registry, RestartStore, Signals,
    TaskStore, TeamPaths, UsageLog, UsageRecord, AUDIT_MAX_SIZE, FILE_MODE, INBOX_MAX_BYTES,
};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How often the in-flight execution watcher re-reads the shutdown file.
const SHUTDOWN_WATCH_INTERVAL: Duration = Duration::from_millis(250);

/// What a cycle decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CycleOutcome {
    /// Did work; poll again after the interval.
    Worked,
    /// Nothing to do; poll again after the interval.
    Idle,
    /// Shutdown or drain consumed; stop the loop.
    Shutdown,
}

/// What happened to a claimed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExecOutcome {
    Finished,
    /// A shutdown arrived between claim and spawn; the claim was reverted.
    RevertedForShutdown,
    /// A shutdown arrived mid-execution; the CLI was killed and the task
    /// left in_progress for the next claimer.
    CancelledForShutdown,
}

/// The per-worker bridge daemon.
pub struct Bridge<S: SessionHost, R: CliRunner, C: Clock> {
    config: BridgeConfig,
    paths: TeamPaths,
    tasks: TaskStore<C>,
    mailbox: Mailbox,
    signals: Signals,
    heartbeats: HeartbeatStore,
    registry: Registry,
    audit: AuditLog,
    usage: UsageLog,
    restarts: RestartStore,
    sessions: S,
    runner: R,
    clock: C,
    perms: EffectivePermissions,
    consecutive_errors: u32,
    idle_announced: bool,
    quarantine_announced: bool,
    pending_inbox: Vec<InboxMessage>,
}

impl<S: SessionHost, R: CliRunner, C: Clock> Bridge<S, R, C> {
    pub fn new(config: BridgeConfig, paths: TeamPaths, sessions: S, runner: R, clock: C) -> Self {
        let perms = EffectivePermissions::from_config(config.permissions.as_ref());
        Self {
            tasks: TaskStore::with_clock(paths.clone(), clock.clone()),
            mailbox: Mailbox::new(paths.clone()),
            signals: Signals::new(paths.clone()),
            heartbeats: HeartbeatStore::new(paths.clone()),
            registry: Registry::new(paths.clone()),
            audit: AuditLog::new(paths.clone()),
            usage: UsageLog::new(paths.clone()),
            restarts: RestartStore::new(paths.clone()),
            paths,
            sessions,
            runner,
            clock,
            perms,
            config,
            consecutive_errors: 0,
            idle_announced: false,
            quarantine_announced: false,
            pending_inbox: Vec::new(),
        }
    }

    fn team(&self) -> &str {
        &self.config.team_name
    }

    fn worker(&self) -> &str {
        &self.config.worker_name
    }

    fn audit_event(&self, kind: AuditKind) -> AuditEvent {
        AuditEvent::new(kind, self.team(), self.worker(), self.clock.iso_now())
    }

    /// Register, then poll until a shutdown or drain is consumed.
    pub async fn run(&mut self) -> Result<(), BridgeError> {
        self.register()?;
        self.audit.append(&self.audit_event(AuditKind::BridgeStart));
        tracing::info!(team = self.team(), worker = self.worker(), "bridge started");

        loop {
            match self.run_cycle().await {
                Ok(CycleOutcome::Shutdown) => return Ok(()),
                Ok(_) => {}
                Err(e) => {
                    // The loop survives transient faults; they are only
                    // counted against the quarantine threshold.
                    self.consecutive_errors += 1;
                    tracing::error!(
                        error = %e,
                        consecutive_errors = self.consecutive_errors,
                        "bridge cycle failed"
                    );
                }
            }
            tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)).await;
        }
    }

    fn register(&self) -> Result<(), BridgeError> {
        let record = MemberRecord::new(
            self.team(),
            self.worker(),
            self.config.provider,
            self.config.model.clone(),
            session_name(self.team(), self.worker()),
            self.config.working_directory.clone(),
            self.clock.epoch_ms(),
        );
        self.registry.register_mcp_worker(self.team(), &record)?;
        Ok(())
    }

    /// One pass of the poll loop.
    pub(crate) async fn run_cycle(&mut self) -> Result<CycleOutcome, BridgeError> {
        if let Some(payload) = self.signals.check_shutdown(self.team(), self.worker())? {
            self.shutdown(payload, false).await?;
            return Ok(CycleOutcome::Shutdown);
        }
        // Drain is only honoured here, at the top of the loop, where no
        // CLI is in flight: finishing the current task came first.
        if let Some(payload) = self.signals.check_drain(self.team(), self.worker())? {
            self.shutdown(payload, true).await?;
            return Ok(CycleOutcome::Shutdown);
        }

        if self.consecutive_errors >= self.config.max_consecutive_errors {
            self.enter_quarantine()?;
            return Ok(CycleOutcome::Idle);
        }

        self.write_heartbeat(WorkerStatus::Polling, None)?;

        let new_messages = self.mailbox.read_new_inbox(self.team(), self.worker())?;
        self.pending_inbox.extend(new_messages);

        let Some(task) = self.tasks.find_next_task(self.team(), self.worker())? else {
            if !self.idle_announced {
                self.mailbox.append_outbox(
                    self.team(),
                    self.worker(),
                    &OutboxMessage::idle(self.clock.iso_now()),
                )?;
                self.audit.append(&self.audit_event(AuditKind::WorkerIdle));
                self.idle_announced = true;
            }
            return Ok(CycleOutcome::Idle);
        };
        self.idle_announced = false;

        match self.execute_task(task).await? {
            ExecOutcome::Finished => {
                self.rotate_channels()?;
            }
            // The shutdown file is still present; the next cycle's top
            // check consumes it and runs the full shutdown sequence.
            ExecOutcome::RevertedForShutdown | ExecOutcome::CancelledForShutdown => {}
        }
        Ok(CycleOutcome::Worked)
    }

    /// Execute one claimed task through the provider CLI.
    pub(crate) async fn execute_task(&mut self, task: Task) -> Result<ExecOutcome, BridgeError> {
        let task_id = task.id.clone();
        self.audit
            .append(&self.audit_event(AuditKind::TaskClaimed).with_task(&task_id));
        self.audit
            .append(&self.audit_event(AuditKind::TaskStarted).with_task(&task_id));
        self.write_heartbeat(WorkerStatus::Executing, Some(task_id.clone()))?;

        // A shutdown that arrived after the claim but before the spawn
        // must not strand the task in_progress.
        if self
            .signals
            .check_shutdown(self.team(), self.worker())?
            .is_some()
        {
            self.tasks.update_task(
                self.team(),
                &task_id,
                |t| t.status = TaskStatus::Pending,
                true,
            )?;
            tracing::info!(task = %task_id, "shutdown observed before spawn, task reverted");
            return Ok(ExecOutcome::RevertedForShutdown);
        }

        let instructions = format_permission_instructions(&self.perms);
        let prompt = build_task_prompt(
            self.team(),
            self.worker(),
            &task,
            &self.pending_inbox,
            &instructions,
        );
        self.pending_inbox.clear();

        let millis = self.clock.epoch_ms();
        let prompt_path = self.paths.prompts_dir().join(format!(
            "team-{}-task-{}-{}.md",
            self.team(),
            task_id,
            millis
        ));
        omc_store::write_file_with_mode(
            &prompt_path,
            self.paths.project_root(),
            prompt.as_bytes(),
            FILE_MODE,
        )?;
        let output_path = self.paths.outputs_dir().join(format!(
            "team-{}-task-{}-{}.txt",
            self.team(),
            task_id,
            millis
        ));

        let before = self.snapshot_changes().await?;

        self.audit
            .append(&self.audit_event(AuditKind::CliSpawned).with_task(&task_id));
        let started_at = self.clock.iso_now();
        let start_ms = self.clock.epoch_ms();

        let cancel = CancellationToken::new();
        let request = CliRequest {
            provider: self.config.provider,
            model: self.config.model.clone(),
            prompt,
            cwd: self.config.working_directory.clone(),
            timeout: Duration::from_millis(self.config.task_timeout_ms),
            cancel: cancel.clone(),
        };

        // Watch the shutdown file while the CLI runs; the runner SIGTERMs
        // the child (SIGKILL after the grace period) when the token trips.
        let watcher = {
            let signals = self.signals.clone();
            let team = self.team().to_string();
            let worker = self.worker().to_string();
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(SHUTDOWN_WATCH_INTERVAL).await;
                    if matches!(signals.check_shutdown(&team, &worker), Ok(Some(_))) {
                        cancel.cancel();
                        return;
                    }
                }
            })
        };
        let run_result = self.runner.run(&request).await;
        watcher.abort();

        match run_result {
            Ok(response) => {
                omc_store::write_file_with_mode(
                    &output_path,
                    self.paths.project_root(),
                    response.text.as_bytes(),
                    FILE_MODE,
                )?;
                self.record_usage(&task_id, &prompt_path, &output_path, &started_at, start_ms)?;
                self.finish_task(&task_id, &output_path, before).await?;
            }
            Err(CliError::Cancelled) => {
                // Shutdown observed mid-execution: the child is already
                // dead. The task stays in_progress with no outbox
                // completion; the next worker to pick it up re-processes
                // it after retry accounting.
                tracing::info!(task = %task_id, "shutdown observed mid-execution, cli killed");
                return Ok(ExecOutcome::CancelledForShutdown);
            }
            Err(error) => {
                self.fail_task(&task_id, &error)?;
            }
        }
        Ok(ExecOutcome::Finished)
    }

    /// Success path, including the post-execution permission audit.
    async fn finish_task(
        &mut self,
        task_id: &str,
        output_path: &Path,
        before: Option<BTreeSet<String>>,
    ) -> Result<(), BridgeError> {
        let violations = match before {
            Some(before) => {
                let after = self.snapshot_changes().await?.unwrap_or_default();
                let new_paths: Vec<String> = after.difference(&before).cloned().collect();
                find_permission_violations(
                    &new_paths,
                    &self.perms,
                    &self.config.working_directory,
                )
            }
            None => Vec::new(),
        };

        if !violations.is_empty()
            && self.config.permission_enforcement == PermissionEnforcement::Enforce
        {
            // A policy failure, not a runtime fault: permanent, and not
            // counted toward consecutive_errors.
            let detail = serde_json::to_value(&violations).unwrap_or_default();
            self.tasks.update_task(
                self.team(),
                task_id,
                |t| {
                    t.status = TaskStatus::Completed;
                    let meta = t.metadata_mut();
                    meta.insert("permanentlyFailed".to_string(), serde_json::json!(true));
                    meta.insert(
                        "error".to_string(),
                        serde_json::json!("permission violation"),
                    );
                    meta.insert("permissionViolations".to_string(), detail.clone());
                },
                true,
            )?;
            self.audit.append(
                &self
                    .audit_event(AuditKind::PermissionViolation)
                    .with_task(task_id)
                    .with_detail("violations", detail),
            );
            self.mailbox.append_outbox(
                self.team(),
                self.worker(),
                &OutboxMessage::error(
                    format!(
                        "task {} permanently failed: {} permission violation(s)",
                        task_id,
                        violations.len()
                    ),
                    Some(task_id.to_string()),
                    self.clock.iso_now(),
                ),
            )?;
            return Ok(());
        }

        let mut summary = read_summary(output_path);
        if !violations.is_empty() {
            // Audit mode: the task still succeeds, with a visible note.
            self.audit.append(
                &self
                    .audit_event(AuditKind::PermissionAudit)
                    .with_task(task_id)
                    .with_detail(
                        "violations",
                        serde_json::to_value(&violations).unwrap_or_default(),
                    ),
            );
            summary.push_str(&format!(
                "[permission audit: {} path(s) outside policy]\n",
                violations.len()
            ));
        }

        self.tasks.update_task(
            self.team(),
            task_id,
            |t| t.status = TaskStatus::Completed,
            true,
        )?;
        self.audit
            .append(&self.audit_event(AuditKind::TaskCompleted).with_task(task_id));
        self.consecutive_errors = 0;
        if let Err(e) = self.restarts.clear(self.team(), self.worker()) {
            tracing::warn!(error = %e, "failed to clear restart state");
        }
        self.mailbox.append_outbox(
            self.team(),
            self.worker(),
            &OutboxMessage::task_complete(task_id, summary, self.clock.iso_now()),
        )?;
        Ok(())
    }

    /// Failure path: retry bookkeeping, permanent fail once exhausted.
    fn fail_task(&mut self, task_id: &str, error: &CliError) -> Result<(), BridgeError> {
        let kind = match error {
            CliError::Timeout(_) => AuditKind::CliTimeout,
            _ => AuditKind::CliError,
        };
        self.audit.append(
            &self
                .audit_event(kind)
                .with_task(task_id)
                .with_detail("error", serde_json::json!(error.to_string())),
        );

        self.consecutive_errors += 1;
        // Exhaustion is judged on the attempts already burned: with
        // maxRetries=N, failure N+1 is the one that goes permanent.
        let exhausted = self
            .tasks
            .is_task_retry_exhausted(self.team(), task_id, self.config.max_retries)?;
        let failure = self
            .tasks
            .write_task_failure(self.team(), task_id, &error.to_string())?;

        if exhausted {
            let attempts = failure.retry_count;
            let message = error.to_string();
            self.tasks.update_task(
                self.team(),
                task_id,
                |t| {
                    t.status = TaskStatus::Completed;
                    let meta = t.metadata_mut();
                    meta.insert("permanentlyFailed".to_string(), serde_json::json!(true));
                    meta.insert("error".to_string(), serde_json::json!(message));
                    meta.insert("failedAttempts".to_string(), serde_json::json!(attempts));
                },
                true,
            )?;
            self.audit.append(
                &self
                    .audit_event(AuditKind::TaskPermanentlyFailed)
                    .with_task(task_id),
            );
            self.mailbox.append_outbox(
                self.team(),
                self.worker(),
                &OutboxMessage::error(
                    format!(
                        "task {} permanently failed after {} attempts: {}",
                        task_id, attempts, error
                    ),
                    Some(task_id.to_string()),
                    self.clock.iso_now(),
                ),
            )?;
        } else {
            self.tasks.update_task(
                self.team(),
                task_id,
                |t| t.status = TaskStatus::Pending,
                true,
            )?;
            self.audit
                .append(&self.audit_event(AuditKind::TaskFailed).with_task(task_id));
            self.mailbox.append_outbox(
                self.team(),
                self.worker(),
                &OutboxMessage::task_failed(task_id, error.to_string(), self.clock.iso_now()),
            )?;
        }
        Ok(())
    }

    /// Announce quarantine once, then keep heartbeating as quarantined.
    fn enter_quarantine(&mut self) -> Result<(), BridgeError> {
        if !self.quarantine_announced {
            let message = format!(
                "worker quarantined after {} consecutive errors",
                self.consecutive_errors
            );
            tracing::error!(team = self.team(), worker = self.worker(), "{}", message);
            self.mailbox.append_outbox(
                self.team(),
                self.worker(),
                &OutboxMessage::error(message, None, self.clock.iso_now()),
            )?;
            self.audit
                .append(&self.audit_event(AuditKind::WorkerQuarantined));
            self.quarantine_announced = true;
        }
        self.write_heartbeat(WorkerStatus::Quarantined, None)?;
        Ok(())
    }

    /// Shutdown (or drain) sequence; the session kill comes last since it
    /// takes this process with it.
    async fn shutdown(&mut self, payload: SignalPayload, drain: bool) -> Result<(), BridgeError> {
        self.audit
            .append(&self.audit_event(AuditKind::ShutdownReceived));

        let request_id = if payload.request_id.is_empty() {
            None
        } else {
            Some(payload.request_id.clone())
        };
        self.mailbox.append_outbox(
            self.team(),
            self.worker(),
            &OutboxMessage::shutdown_ack(request_id, self.clock.iso_now()),
        )?;
        self.audit.append(&self.audit_event(AuditKind::ShutdownAck));

        if let Err(e) = self.registry.unregister_mcp_worker(self.team(), self.worker()) {
            tracing::warn!(error = %e, "unregister failed during shutdown");
        }
        self.heartbeats.delete(self.team(), self.worker())?;

        if drain {
            self.signals.clear_drain(self.team(), self.worker())?;
        } else {
            self.signals.clear_shutdown(self.team(), self.worker())?;
        }

        self.audit
            .append(&self.audit_event(AuditKind::BridgeShutdown));
        tracing::info!(team = self.team(), worker = self.worker(), drain, "bridge shut down");

        let session = session_name(self.team(), self.worker());
        if let Err(e) = self.sessions.kill(&session).await {
            tracing::warn!(error = %e, session, "session kill failed during shutdown");
        }
        Ok(())
    }

    fn write_heartbeat(
        &self,
        status: WorkerStatus,
        current_task_id: Option<String>,
    ) -> Result<(), BridgeError> {
        self.heartbeats.write(&Heartbeat {
            worker_name: self.worker().to_string(),
            team_name: self.team().to_string(),
            provider: self.config.provider,
            pid: std::process::id(),
            last_poll_at: self.clock.iso_now(),
            current_task_id,
            consecutive_errors: self.consecutive_errors,
            status,
        })?;
        Ok(())
    }

    /// Changed-or-untracked snapshot, only when enforcement is on.
    async fn snapshot_changes(&self) -> Result<Option<BTreeSet<String>>, BridgeError> {
        if self.config.permission_enforcement == PermissionEnforcement::Off {
            return Ok(None);
        }
        Ok(Some(changed_files(&self.config.working_directory).await?))
    }

    fn record_usage(
        &self,
        task_id: &str,
        prompt_path: &Path,
        output_path: &Path,
        started_at: &str,
        start_ms: u64,
    ) -> Result<(), BridgeError> {
        let (prompt_chars, response_chars) =
            omc_store::measure_char_counts(prompt_path, output_path);
        self.usage.record(
            self.team(),
            &UsageRecord {
                task_id: task_id.to_string(),
                worker_name: self.worker().to_string(),
                provider: self.config.provider,
                model: self.config.model.clone(),
                started_at: started_at.to_string(),
                completed_at: self.clock.iso_now(),
                wall_clock_ms: self.clock.epoch_ms().saturating_sub(start_ms),
                prompt_chars,
                response_chars,
            },
        )?;
        Ok(())
    }

    fn rotate_channels(&self) -> Result<(), BridgeError> {
        if self
            .mailbox
            .rotate_outbox_if_needed(self.team(), self.worker(), self.config.outbox_max_lines)?
        {
            self.audit.append(&self.audit_event(AuditKind::OutboxRotated));
        }
        if self
            .mailbox
            .rotate_inbox_if_needed(self.team(), self.worker(), INBOX_MAX_BYTES)?
        {
            self.audit.append(&self.audit_event(AuditKind::InboxRotated));
        }
        if self.audit.rotate_if_needed(self.team(), AUDIT_MAX_SIZE)? {
            tracing::debug!(team = self.team(), "audit log rotated");
        }
        Ok(())
    }
}

/// First 500 bytes of the output file, newline-terminated.
fn read_summary(output_path: &Path) -> String {
    let text = std::fs::read_to_string(output_path).unwrap_or_default();
    let mut end = text.len().min(500);
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    let mut summary = text[..end].to_string();
    if !summary.ends_with('\n') {
        summary.push('\n');
    }
    summary
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;
