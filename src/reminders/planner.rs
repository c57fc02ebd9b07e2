//! Pure pass planning: store snapshot + ledger → ordered port calls.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use super::notification::slot_text;
use super::types::{AlarmOp, PlanIssue, ReconcilePlan, ReminderSlot};
use crate::alarm::AlarmId;
use crate::config::MAX_TIMES_PER_MEDICATION;
use crate::models::{ArmedAlarm, Medication};
use crate::schedule::{next_per_slot, Schedule};

/// Compute the full set of port calls for a pass at `as_of`.
///
/// `medications` is every stored medication, active or not. Each active,
/// scheduled one contributes its next occurrence per slot. Every other id in
/// the known universe (the fixed slot range of each stored medication plus
/// whatever the ledger holds) is disarmed. With `enabled` false nothing is
/// armed.
pub fn plan_pass(
    medications: &[Medication],
    ledger: &[ArmedAlarm],
    as_of: NaiveDateTime,
    enabled: bool,
) -> ReconcilePlan {
    let mut issues = Vec::new();
    let mut desired: BTreeMap<AlarmId, Option<ReminderSlot>> = BTreeMap::new();

    for med in medications {
        for slot_index in 0..MAX_TIMES_PER_MEDICATION {
            if let Ok(id) = AlarmId::for_slot(med.id, slot_index) {
                desired.entry(id).or_insert(None);
            }
        }
    }
    for alarm in ledger {
        desired.entry(alarm.alarm_id).or_insert(None);
    }

    if enabled {
        for med in medications.iter().filter(|m| m.is_active) {
            let expansion = next_per_slot(&Schedule::of(med), as_of);
            issues.extend(expansion.errors.into_iter().map(|error| PlanIssue::InvalidTime {
                medication_id: med.id,
                error,
            }));

            for occurrence in expansion.occurrences {
                match AlarmId::for_slot(med.id, occurrence.slot_index) {
                    Ok(alarm_id) => {
                        let (title, body) = slot_text(med, occurrence.at);
                        desired.insert(
                            alarm_id,
                            Some(ReminderSlot {
                                medication_id: med.id,
                                slot_index: occurrence.slot_index,
                                alarm_id,
                                trigger_at: occurrence.at,
                                title,
                                body,
                            }),
                        );
                    }
                    Err(error) => issues.push(PlanIssue::Unaddressable {
                        medication_id: med.id,
                        slot_index: occurrence.slot_index,
                        error,
                    }),
                }
            }
        }
    }

    let ops = desired
        .into_iter()
        .map(|(alarm_id, slot)| match slot {
            Some(slot) => AlarmOp::Arm(slot),
            None => AlarmOp::Disarm { alarm_id },
        })
        .collect();

    ReconcilePlan { ops, issues }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Frequency;
    use crate::schedule::ScheduleError;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        day(d).and_hms_opt(h, m, 0).unwrap()
    }

    fn med(id: i64, frequency: Frequency, times: &[&str]) -> Medication {
        Medication {
            id,
            name: format!("Med {id}"),
            dosage: "10 mg".into(),
            med_type: "tablet".into(),
            notes: None,
            frequency,
            times: times.iter().map(|t| t.to_string()).collect(),
            start_date: day(1),
            end_date: None,
            is_active: true,
        }
    }

    fn id(med: i64, slot: usize) -> AlarmId {
        AlarmId::for_slot(med, slot).unwrap()
    }

    fn armed_ids(plan: &ReconcilePlan) -> Vec<AlarmId> {
        plan.arms().map(|s| s.alarm_id).collect()
    }

    #[test]
    fn arms_next_occurrence_per_slot_and_sweeps_the_rest() {
        let plan = plan_pass(
            &[med(3, Frequency::TwiceDaily, &["08:00", "20:00"])],
            &[],
            at(10, 9, 0),
            true,
        );

        assert_eq!(plan.ops.len(), MAX_TIMES_PER_MEDICATION);
        assert_eq!(armed_ids(&plan), vec![id(3, 0), id(3, 1)]);
        let slots: Vec<_> = plan.arms().map(|s| s.trigger_at).collect();
        assert_eq!(slots, vec![at(11, 8, 0), at(10, 20, 0)]);
        assert!(plan.ops[2..]
            .iter()
            .all(|op| matches!(op, AlarmOp::Disarm { .. })));
        assert!(plan.issues.is_empty());
    }

    #[test]
    fn ops_are_in_ascending_alarm_id_order() {
        let plan = plan_pass(
            &[
                med(7, Frequency::OnceDaily, &["08:00"]),
                med(2, Frequency::ThriceDaily, &["08:00", "14:00", "20:00"]),
            ],
            &[],
            at(10, 9, 0),
            true,
        );
        let ids: Vec<_> = plan.ops.iter().map(AlarmOp::alarm_id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        assert_eq!(ids.len(), 2 * MAX_TIMES_PER_MEDICATION);
    }

    #[test]
    fn inactive_medication_is_fully_disarmed() {
        let mut inactive = med(5, Frequency::TwiceDaily, &["08:00", "20:00"]);
        inactive.is_active = false;
        let plan = plan_pass(&[inactive], &[], at(10, 9, 0), true);

        assert!(armed_ids(&plan).is_empty());
        assert_eq!(plan.ops.len(), MAX_TIMES_PER_MEDICATION);
        assert_eq!(plan.ops[0], AlarmOp::Disarm { alarm_id: id(5, 0) });
    }

    #[test]
    fn as_needed_arms_nothing() {
        let plan = plan_pass(
            &[med(4, Frequency::AsNeeded, &["08:00"])],
            &[],
            at(10, 9, 0),
            true,
        );
        assert!(armed_ids(&plan).is_empty());
    }

    #[test]
    fn ledger_entries_for_unknown_medications_are_disarmed() {
        let orphan = ArmedAlarm {
            alarm_id: id(99, 0),
            medication_id: 99,
            slot_index: 0,
            trigger_at: at(10, 8, 0),
            title: "t".into(),
            body: "b".into(),
        };
        let plan = plan_pass(&[], &[orphan], at(10, 9, 0), true);
        assert_eq!(plan.ops, vec![AlarmOp::Disarm { alarm_id: id(99, 0) }]);
    }

    #[test]
    fn disabled_reminders_arm_nothing() {
        let plan = plan_pass(
            &[med(1, Frequency::OnceDaily, &["08:00"])],
            &[],
            at(10, 9, 0),
            false,
        );
        assert!(armed_ids(&plan).is_empty());
        assert_eq!(plan.ops.len(), MAX_TIMES_PER_MEDICATION);
    }

    #[test]
    fn invalid_time_skips_only_that_slot() {
        let plan = plan_pass(
            &[med(6, Frequency::TwiceDaily, &["25:00", "20:00"])],
            &[],
            at(10, 9, 0),
            true,
        );
        assert_eq!(armed_ids(&plan), vec![id(6, 1)]);
        assert_eq!(
            plan.issues,
            vec![PlanIssue::InvalidTime {
                medication_id: 6,
                error: ScheduleError::InvalidTime {
                    slot_index: 0,
                    value: "25:00".into()
                },
            }]
        );
    }

    #[test]
    fn armed_slot_carries_display_text() {
        let plan = plan_pass(
            &[med(1, Frequency::OnceDaily, &["08:00"])],
            &[],
            at(10, 9, 0),
            true,
        );
        let slot = plan.arms().next().unwrap();
        assert_eq!(slot.title, "Time to take Med 1");
        assert_eq!(slot.body, "10 mg tablet at 08:00");
    }

    #[test]
    fn same_inputs_give_same_plan() {
        let meds = [
            med(1, Frequency::EveryFourHours, &["06:00"]),
            med(2, Frequency::Weekly, &["09:00"]),
        ];
        let a = plan_pass(&meds, &[], at(10, 7, 30), true);
        let b = plan_pass(&meds, &[], at(10, 7, 30), true);
        assert_eq!(a, b);
    }
}
