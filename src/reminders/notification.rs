//! Display text for reminder notifications.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::models::Medication;

/// What the host shows when an alarm fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    /// Medications covered, for in-app navigation on tap.
    pub medication_ids: Vec<i64>,
    pub fired_at: NaiveDateTime,
}

/// Title and body armed with a single slot's alarm.
pub fn slot_text(med: &Medication, at: NaiveDateTime) -> (String, String) {
    let title = format!("Time to take {}", med.name);
    let mut body = dose_line(med);
    body.push_str(&format!(" at {}", at.format("%H:%M")));
    if let Some(notes) = med.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        body.push_str(". ");
        body.push_str(notes);
    }
    (title, body)
}

/// Notification for everything due at `fired_at`. `None` when nothing is due.
pub fn compose_notification(due: &[Medication], fired_at: NaiveDateTime) -> Option<Notification> {
    let notification = match due {
        [] => return None,
        [med] => {
            let (title, body) = slot_text(med, fired_at);
            Notification {
                title,
                body,
                medication_ids: vec![med.id],
                fired_at,
            }
        }
        many => Notification {
            title: format!("Time to take {} medications", many.len()),
            body: many
                .iter()
                .map(|m| {
                    if m.dosage.trim().is_empty() {
                        m.name.clone()
                    } else {
                        format!("{} ({})", m.name, m.dosage.trim())
                    }
                })
                .collect::<Vec<_>>()
                .join(", "),
            medication_ids: many.iter().map(|m| m.id).collect(),
            fired_at,
        },
    };
    Some(notification)
}

fn dose_line(med: &Medication) -> String {
    [med.dosage.trim(), med.med_type.trim()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Frequency;
    use chrono::NaiveDate;

    fn med(id: i64, name: &str, dosage: &str, notes: Option<&str>) -> Medication {
        Medication {
            id,
            name: name.into(),
            dosage: dosage.into(),
            med_type: "tablet".into(),
            notes: notes.map(Into::into),
            frequency: Frequency::OnceDaily,
            times: vec!["08:00".into()],
            start_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            end_date: None,
            is_active: true,
        }
    }

    fn at_eight() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 10)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[test]
    fn slot_text_includes_dose_time_and_notes() {
        let (title, body) = slot_text(&med(1, "Metformin", "500 mg", Some("with food")), at_eight());
        assert_eq!(title, "Time to take Metformin");
        assert_eq!(body, "500 mg tablet at 08:00. with food");
    }

    #[test]
    fn blank_notes_are_omitted() {
        let (_, body) = slot_text(&med(1, "Metformin", "500 mg", Some("  ")), at_eight());
        assert_eq!(body, "500 mg tablet at 08:00");
    }

    #[test]
    fn nothing_due_is_none() {
        assert!(compose_notification(&[], at_eight()).is_none());
    }

    #[test]
    fn single_due_uses_slot_text() {
        let n = compose_notification(&[med(4, "Aspirin", "81 mg", None)], at_eight()).unwrap();
        assert_eq!(n.title, "Time to take Aspirin");
        assert_eq!(n.body, "81 mg tablet at 08:00");
        assert_eq!(n.medication_ids, vec![4]);
    }

    #[test]
    fn several_due_are_listed() {
        let due = [med(1, "Aspirin", "81 mg", None), med(2, "Vitamin D", "", None)];
        let n = compose_notification(&due, at_eight()).unwrap();
        assert_eq!(n.title, "Time to take 2 medications");
        assert_eq!(n.body, "Aspirin (81 mg), Vitamin D");
        assert_eq!(n.medication_ids, vec![1, 2]);
        assert_eq!(n.fired_at, at_eight());
    }
}
