use crate::domain::model::{EventContext, ParticipantRecord, RosterEntry};

/// Derives `<eventCode>-<year>-<serial>` codes. The serial is the row index
/// padded to three digits; larger indices are printed in full.
#[derive(Debug, Clone)]
pub struct CodeAssigner {
    event_code: String,
    year: String,
}

impl CodeAssigner {
    pub fn new(event: &EventContext) -> Self {
        Self {
            event_code: event.event_code.clone(),
            year: event.year.clone(),
        }
    }

    pub fn code_for(&self, row_index: u32) -> String {
        format!("{}-{}-{:03}", self.event_code, self.year, row_index)
    }

    pub fn assign(&self, entries: Vec<RosterEntry>) -> Vec<ParticipantRecord> {
        entries
            .into_iter()
            .map(|entry| {
                let code = self.code_for(entry.row_index);
                ParticipantRecord::new(entry, code)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn assigner() -> CodeAssigner {
        CodeAssigner::new(&EventContext::new("quiz", "25", "/tmp/out"))
    }

    #[test]
    fn test_serial_padding() {
        let a = assigner();
        assert_eq!(a.code_for(1), "quiz-25-001");
        assert_eq!(a.code_for(10), "quiz-25-010");
        assert_eq!(a.code_for(999), "quiz-25-999");
        assert_eq!(a.code_for(1000), "quiz-25-1000");
        assert_eq!(a.code_for(12345), "quiz-25-12345");
    }

    #[test]
    fn test_codes_are_deterministic_and_unique() {
        let a = assigner();
        let b = assigner();
        let codes: HashSet<String> = (1..=2000).map(|i| a.code_for(i)).collect();
        assert_eq!(codes.len(), 2000);
        assert!((1..=2000).all(|i| a.code_for(i) == b.code_for(i)));
    }

    #[test]
    fn test_garbage_metadata_passes_through() {
        let a = CodeAssigner::new(&EventContext::new("Ev nt!", "2025", "/tmp/out"));
        assert_eq!(a.code_for(7), "Ev nt!-2025-007");
    }

    #[test]
    fn test_assign_uses_row_index_not_position() {
        let entries = vec![
            RosterEntry {
                row_index: 1,
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                email_missing: false,
            },
            RosterEntry {
                row_index: 3,
                name: "Grace".to_string(),
                email: String::new(),
                email_missing: true,
            },
        ];
        let records = assigner().assign(entries);
        assert_eq!(records[0].code, "quiz-25-001");
        assert_eq!(records[1].code, "quiz-25-003");
        assert!(records[1].email_missing);
    }
}
