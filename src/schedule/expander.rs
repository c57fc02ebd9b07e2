use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};

use super::time_of_day::parse_time_of_day;
use super::{Expansion, Occurrence, Schedule, ScheduleError};
use crate::models::ScheduleKind;

/// Per-slot recurrence, already anchored to the start date.
#[derive(Debug, Clone, Copy)]
enum SlotRule {
    Daily { time: NaiveTime },
    Interval { anchor: NaiveDateTime, step: Duration },
    Weekly { anchor: NaiveDateTime },
    Monthly { start: NaiveDate, time: NaiveTime },
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    index: usize,
    rule: SlotRule,
}

/// Up to `count` instants strictly after `from`, strictly ascending, merged
/// across all slots. Slots landing on the same instant collapse into the
/// lowest slot index.
pub fn next_occurrences(schedule: &Schedule<'_>, from: NaiveDateTime, count: usize) -> Expansion {
    let (slots, errors) = build_slots(schedule);
    let mut heads: Vec<(Slot, Option<NaiveDateTime>)> = slots
        .into_iter()
        .map(|slot| (slot, first_after(schedule, slot.rule, from)))
        .collect();

    let mut occurrences: Vec<Occurrence> = Vec::with_capacity(count);
    while occurrences.len() < count {
        let Some(pos) = heads
            .iter()
            .enumerate()
            .filter_map(|(i, (slot, at))| at.map(|at| (i, slot.index, at)))
            .min_by_key(|(_, index, at)| (*at, *index))
            .map(|(i, _, _)| i)
        else {
            break;
        };

        let (slot, at) = heads[pos];
        let Some(at) = at else { break };
        if occurrences.last().map(|o| o.at) != Some(at) {
            occurrences.push(Occurrence {
                slot_index: slot.index,
                at,
            });
        }
        heads[pos].1 = first_after(schedule, slot.rule, at);
    }

    Expansion {
        occurrences,
        errors,
    }
}

/// The next instant after `from` for every slot, ordered by slot index.
/// Slots with nothing left before `end_date` are omitted.
pub fn next_per_slot(schedule: &Schedule<'_>, from: NaiveDateTime) -> Expansion {
    let (slots, errors) = build_slots(schedule);
    let occurrences = slots
        .into_iter()
        .filter_map(|slot| {
            first_after(schedule, slot.rule, from).map(|at| Occurrence {
                slot_index: slot.index,
                at,
            })
        })
        .collect();

    Expansion {
        occurrences,
        errors,
    }
}

fn build_slots(schedule: &Schedule<'_>) -> (Vec<Slot>, Vec<ScheduleError>) {
    let kind = schedule.frequency.kind();
    if kind == ScheduleKind::Unscheduled {
        return (Vec::new(), Vec::new());
    }

    let mut errors = Vec::new();
    let mut valid: Vec<(usize, NaiveTime)> = Vec::with_capacity(schedule.times.len());
    for (slot_index, raw) in schedule.times.iter().enumerate() {
        match parse_time_of_day(raw) {
            Some(time) => valid.push((slot_index, time)),
            None => errors.push(ScheduleError::InvalidTime {
                slot_index,
                value: raw.clone(),
            }),
        }
    }

    let slots = match kind {
        ScheduleKind::Daily => valid
            .into_iter()
            .map(|(index, time)| Slot {
                index,
                rule: SlotRule::Daily { time },
            })
            .collect(),
        ScheduleKind::Interval(step) => {
            let Some(step) = Duration::from_std(step).ok().filter(|s| *s > Duration::zero())
            else {
                return (Vec::new(), errors);
            };
            // Anchored to the earliest configured time.
            valid
                .iter()
                .map(|(_, time)| *time)
                .min()
                .map(|time| Slot {
                    index: 0,
                    rule: SlotRule::Interval {
                        anchor: schedule.start_date.and_time(time),
                        step,
                    },
                })
                .into_iter()
                .collect()
        }
        ScheduleKind::Weekly => valid
            .first()
            .map(|(_, time)| Slot {
                index: 0,
                rule: SlotRule::Weekly {
                    anchor: schedule.start_date.and_time(*time),
                },
            })
            .into_iter()
            .collect(),
        ScheduleKind::Monthly => valid
            .first()
            .map(|(_, time)| Slot {
                index: 0,
                rule: SlotRule::Monthly {
                    start: schedule.start_date,
                    time: *time,
                },
            })
            .into_iter()
            .collect(),
        ScheduleKind::Unscheduled => Vec::new(),
    };

    (slots, errors)
}

/// First instant of `rule` strictly after `from`, or `None` past `end_date`.
fn first_after(schedule: &Schedule<'_>, rule: SlotRule, from: NaiveDateTime) -> Option<NaiveDateTime> {
    let candidate = match rule {
        SlotRule::Daily { time } => {
            let day = from.date().max(schedule.start_date);
            let at = day.and_time(time);
            if at > from {
                Some(at)
            } else {
                at.checked_add_signed(Duration::days(1))
            }
        }
        SlotRule::Interval { anchor, step } => step_past(anchor, step, from),
        SlotRule::Weekly { anchor } => step_past(anchor, Duration::weeks(1), from),
        SlotRule::Monthly { start, time } => {
            let elapsed = month_index(from.date()) - month_index(start);
            let mut k = elapsed.max(0);
            loop {
                let at = nth_month(start, k)?.and_time(time);
                if at > from {
                    break Some(at);
                }
                k += 1;
            }
        }
    }?;

    match schedule.end_date {
        Some(end) if candidate.date() > end => None,
        _ => Some(candidate),
    }
}

/// Smallest `anchor + n * step` (n >= 0) strictly after `from`.
fn step_past(anchor: NaiveDateTime, step: Duration, from: NaiveDateTime) -> Option<NaiveDateTime> {
    if anchor > from {
        return Some(anchor);
    }
    let step_secs = step.num_seconds();
    let steps = (from - anchor).num_seconds() / step_secs + 1;
    let offset = Duration::try_seconds(steps.checked_mul(step_secs)?)?;
    let mut at = anchor.checked_add_signed(offset)?;
    // Sub-second remainders in `from` can leave us one step short.
    while at <= from {
        at = at.checked_add_signed(step)?;
    }
    Some(at)
}

fn month_index(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 12 + i64::from(date.month0())
}

/// Same day-of-month as `start`, `k` months later, clamped to month end.
fn nth_month(start: NaiveDate, k: i64) -> Option<NaiveDate> {
    let total = month_index(start) + k;
    let year = i32::try_from(total.div_euclid(12)).ok()?;
    let month = u32::try_from(total.rem_euclid(12)).ok()? + 1;
    let day = start.day().min(days_in_month(year, month)?);
    NaiveDate::from_ymd_opt(year, month, day)
}

fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?
        .pred_opt()
        .map(|d| d.day())
}
