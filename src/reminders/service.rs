//! Reminder service: serialized reconciliation passes, due-medication
//! resolution and the event handlers hosts call.
//!
//! Every pass is total. It re-derives the desired alarm set from the store
//! and re-issues the full set of arm/disarm calls, so any pass fixes drift
//! left by an earlier failure, a reboot, or a missed event.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDateTime;
use serde::Serialize;
use uuid::Uuid;

use super::error::ReconciliationError;
use super::notification::compose_notification;
use super::planner::plan_pass;
use super::types::{
    AlarmOp, DeliveryOutcome, PlanIssue, PortFailure, ReconcileReport, ReminderSlot,
};
use crate::alarm::{AlarmId, AlarmPort, DeliveredAlarm};
use crate::clock::Clock;
use crate::models::{ArmedAlarm, Medication};
use crate::store::{ArmedAlarmLedger, MedicationStore, PreferenceStore, SqliteStore};

/// Snapshot of the pass currently holding the lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivePass {
    pub pass_id: Uuid,
    pub as_of: NaiveDateTime,
    pub started_at: NaiveDateTime,
}

pub struct ReminderService {
    medications: Arc<dyn MedicationStore>,
    ledger: Arc<dyn ArmedAlarmLedger>,
    preferences: Arc<dyn PreferenceStore>,
    port: Arc<dyn AlarmPort>,
    clock: Arc<dyn Clock>,
    /// One pass at a time.
    pass_lock: Mutex<()>,
    current_pass: Mutex<Option<ActivePass>>,
}

impl ReminderService {
    pub fn new(
        medications: Arc<dyn MedicationStore>,
        ledger: Arc<dyn ArmedAlarmLedger>,
        preferences: Arc<dyn PreferenceStore>,
        port: Arc<dyn AlarmPort>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            medications,
            ledger,
            preferences,
            port,
            clock,
            pass_lock: Mutex::new(()),
            current_pass: Mutex::new(None),
        }
    }

    /// Service backed by a single SQLite store for all three ports.
    pub fn with_sqlite(
        store: Arc<SqliteStore>,
        port: Arc<dyn AlarmPort>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::new(store.clone(), store.clone(), store, port, clock)
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Pass currently running, if any.
    pub fn current_pass(&self) -> Option<ActivePass> {
        self.current_pass.lock().ok()?.clone()
    }

    pub fn is_reconciling(&self) -> bool {
        self.pass_lock.try_lock().is_err()
    }

    // ── Reconciliation ──────────────────────────────────────

    /// Bring the OS alarm set in line with the store as of `as_of`.
    ///
    /// Blocks while another pass runs. Store read failures abort before any
    /// port call; port and ledger failures are logged and counted.
    pub fn reconcile_all(
        &self,
        as_of: NaiveDateTime,
    ) -> Result<ReconcileReport, ReconciliationError> {
        let pass_id = Uuid::new_v4();
        let _pass = self.begin_pass(pass_id, as_of);

        let reminders_enabled = self.preferences.reminders_enabled()?;
        let medications = self.medications.list_all()?;
        let ledger = self.ledger.armed()?;

        let plan = plan_pass(&medications, &ledger, as_of, reminders_enabled);
        for issue in &plan.issues {
            log_issue(pass_id, issue);
        }

        let recorded: HashMap<AlarmId, ArmedAlarm> =
            ledger.into_iter().map(|a| (a.alarm_id, a)).collect();

        let mut report = ReconcileReport {
            pass_id,
            as_of,
            reminders_enabled,
            armed: Vec::new(),
            disarmed: 0,
            failures: Vec::new(),
            issues: plan.issues,
            ledger_errors: 0,
        };

        for op in plan.ops {
            match op {
                AlarmOp::Arm(slot) => {
                    let previous = recorded.get(&slot.alarm_id);
                    self.apply_arm(pass_id, slot, previous, &mut report);
                }
                AlarmOp::Disarm { alarm_id } => match self.port.disarm(alarm_id) {
                    Ok(()) => {
                        report.disarmed += 1;
                        if recorded.contains_key(&alarm_id) {
                            if let Err(e) = self.ledger.remove(alarm_id) {
                                tracing::warn!(%pass_id, %alarm_id, error = %e, "Failed to clear ledger row");
                                report.ledger_errors += 1;
                            }
                        }
                    }
                    Err(error) => {
                        // Ledger row kept so the next pass retries the disarm.
                        tracing::warn!(%pass_id, %alarm_id, error = %error, "Disarm failed");
                        report.failures.push(PortFailure {
                            op: AlarmOp::Disarm { alarm_id },
                            error,
                        });
                    }
                },
            }
        }

        tracing::info!(
            %pass_id,
            as_of = %as_of,
            reminders_enabled,
            medications = medications.len(),
            armed = report.armed.len(),
            disarmed = report.disarmed,
            failed = report.failures.len(),
            skipped = report.issues.len(),
            "Reconciliation pass complete"
        );

        Ok(report)
    }

    /// Record the slot, then arm it. The ledger row goes first: an OS alarm
    /// the ledger cannot name would outlive its medication.
    fn apply_arm(
        &self,
        pass_id: Uuid,
        slot: ReminderSlot,
        previous: Option<&ArmedAlarm>,
        report: &mut ReconcileReport,
    ) {
        let row = slot.to_armed();
        let changed = previous != Some(&row);

        if changed {
            if let Err(e) = self.ledger.record(&row) {
                tracing::warn!(
                    %pass_id,
                    alarm_id = %slot.alarm_id,
                    error = %e,
                    "Failed to record alarm; leaving slot disarmed"
                );
                report.ledger_errors += 1;
                if let Err(error) = self.port.disarm(slot.alarm_id) {
                    tracing::warn!(%pass_id, alarm_id = %slot.alarm_id, error = %error, "Disarm failed");
                    report.failures.push(PortFailure {
                        op: AlarmOp::Disarm {
                            alarm_id: slot.alarm_id,
                        },
                        error,
                    });
                }
                return;
            }
        }

        match self
            .port
            .arm(slot.alarm_id, &slot.title, &slot.body, slot.trigger_at)
        {
            Ok(()) => {
                tracing::debug!(
                    %pass_id,
                    alarm_id = %slot.alarm_id,
                    medication_id = slot.medication_id,
                    trigger_at = %slot.trigger_at,
                    "Armed"
                );
                report.armed.push(slot);
            }
            Err(error) => {
                tracing::warn!(
                    %pass_id,
                    alarm_id = %slot.alarm_id,
                    medication_id = slot.medication_id,
                    error = %error,
                    "Arm failed"
                );
                // The OS may still hold the old instant. A slot with no old
                // row keeps the new one so its id stays known to the sweep.
                if let (true, Some(previous)) = (changed, previous) {
                    if let Err(e) = self.ledger.record(previous) {
                        tracing::warn!(%pass_id, alarm_id = %slot.alarm_id, error = %e, "Failed to restore ledger row");
                        report.ledger_errors += 1;
                    }
                }
                report.failures.push(PortFailure {
                    op: AlarmOp::Arm(slot),
                    error,
                });
            }
        }
    }

    /// `reconcile_all` at the injected clock's current instant.
    pub fn reconcile_now(&self) -> Result<ReconcileReport, ReconciliationError> {
        self.reconcile_all(self.clock.now())
    }

    // ── Resolution ──────────────────────────────────────────

    /// Active medications with an armed slot at `trigger`, compared at
    /// minute precision. No match is an empty list.
    pub fn due_medications(
        &self,
        trigger: NaiveDateTime,
    ) -> Result<Vec<Medication>, ReconciliationError> {
        let mut ids: Vec<i64> = self
            .ledger
            .armed_at(trigger)?
            .into_iter()
            .map(|a| a.medication_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        Ok(self
            .medications
            .by_ids(&ids)?
            .into_iter()
            .filter(|m| m.is_active)
            .collect())
    }

    // ── Event handlers ──────────────────────────────────────

    /// Boot, app launch, or timezone change.
    pub fn on_cold_start(&self) -> Result<ReconcileReport, ReconciliationError> {
        tracing::info!("Cold start reconciliation");
        self.reconcile_now()
    }

    /// A medication was created, edited, toggled or deleted. The pass is
    /// total, so the id is only used for logging.
    pub fn on_medication_changed(
        &self,
        medication_id: i64,
    ) -> Result<ReconcileReport, ReconciliationError> {
        tracing::debug!(medication_id, "Medication changed");
        self.reconcile_now()
    }

    /// Resolve what is due at the fired instant, compose its notification,
    /// then run a pass so the next occurrences get armed. The pass runs even
    /// when resolution fails.
    pub fn on_alarm_delivered(&self, delivered: DeliveredAlarm) -> DeliveryOutcome {
        let notification = self.due_medications(delivered.fired_at).map(|due| {
            if due.is_empty() {
                tracing::info!(
                    alarm_id = %delivered.alarm_id,
                    fired_at = %delivered.fired_at,
                    "Delivered alarm matches nothing active"
                );
            }
            compose_notification(&due, delivered.fired_at)
        });
        if let Err(e) = &notification {
            tracing::warn!(alarm_id = %delivered.alarm_id, error = %e, "Could not resolve due medications");
        }
        DeliveryOutcome {
            notification,
            reconciled: self.reconcile_now(),
        }
    }

    /// Persist the global reminders switch and reconcile.
    pub fn set_reminders_enabled(
        &self,
        enabled: bool,
    ) -> Result<ReconcileReport, ReconciliationError> {
        self.preferences.set_reminders_enabled(enabled)?;
        tracing::info!(enabled, "Reminders toggled");
        self.reconcile_now()
    }

    pub fn reminders_enabled(&self) -> Result<bool, ReconciliationError> {
        Ok(self.preferences.reminders_enabled()?)
    }

    // ── Internal ────────────────────────────────────────────

    fn begin_pass(&self, pass_id: Uuid, as_of: NaiveDateTime) -> PassGuard<'_> {
        let guard = self.pass_lock.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Previous reconciliation pass panicked; continuing");
            poisoned.into_inner()
        });
        if let Ok(mut current) = self.current_pass.lock() {
            *current = Some(ActivePass {
                pass_id,
                as_of,
                started_at: self.clock.now(),
            });
        }
        PassGuard {
            _guard: guard,
            service: self,
        }
    }

    fn clear_current_pass(&self) {
        if let Ok(mut current) = self.current_pass.lock() {
            *current = None;
        }
    }
}

/// RAII token for the pass lock. Dropping it clears `current_pass`.
struct PassGuard<'a> {
    _guard: MutexGuard<'a, ()>,
    service: &'a ReminderService,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.service.clear_current_pass();
    }
}

fn log_issue(pass_id: Uuid, issue: &PlanIssue) {
    match issue {
        PlanIssue::InvalidTime {
            medication_id,
            error,
        } => tracing::warn!(%pass_id, medication_id, error = %error, "Skipping slot"),
        PlanIssue::Unaddressable {
            medication_id,
            slot_index,
            error,
        } => tracing::warn!(%pass_id, medication_id, slot_index, error = %error, "Slot has no alarm id"),
    }
}
