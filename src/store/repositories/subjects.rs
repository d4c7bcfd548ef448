use anyhow::{anyhow, bail, Result};
use uuid::Uuid;

use crate::{
    log_info,
    models::{now_ms, Subject, SubjectUpdate},
    store::{Collection, FocusStore},
};

const ENABLE_LOGS: bool = true;

fn validate_color(color: &str) -> Result<()> {
    let Some(hex_part) = color.strip_prefix('#') else {
        bail!("Invalid color format. Must be hex (#RRGGBB)");
    };

    if hex_part.len() != 6 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("Invalid color format. Must be hex (#RRGGBB)");
    }

    Ok(())
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        bail!("Subject name cannot be empty");
    }
    Ok(name.to_string())
}

impl FocusStore {
    /// Creates a subject. Without an explicit color the palette is cycled by position.
    pub fn add_subject(&mut self, name: &str, color: Option<String>) -> Result<Subject> {
        let name = validate_name(name)?;
        let color = match color {
            Some(color) => {
                validate_color(&color)?;
                color
            }
            None => Subject::palette_color(self.data.subjects.len()).to_string(),
        };

        let subject = Subject {
            id: Uuid::new_v4().to_string(),
            name,
            color,
            icon: crate::models::default_icon(),
            created_at: now_ms(),
            total_sessions: 0,
            total_focus_time: 0,
        };

        self.data.subjects.push(subject.clone());
        self.persist(Collection::Subjects);
        Ok(subject)
    }

    pub fn update_subject(&mut self, subject_id: &str, update: SubjectUpdate) -> Result<Subject> {
        let name = update.name.as_deref().map(validate_name).transpose()?;
        if let Some(color) = update.color.as_deref() {
            validate_color(color)?;
        }

        let subject = self
            .data
            .subjects
            .iter_mut()
            .find(|s| s.id == subject_id)
            .ok_or_else(|| anyhow!("Subject {subject_id} not found"))?;

        if let Some(name) = name {
            subject.name = name;
        }
        if let Some(color) = update.color {
            subject.color = color;
        }
        let updated = subject.clone();

        self.persist(Collection::Subjects);
        Ok(updated)
    }

    /// Removes a subject. Its historical sessions keep their denormalized name; the
    /// active pointer is cleared only if it pointed here.
    pub fn delete_subject(&mut self, subject_id: &str) -> Result<()> {
        let before = self.data.subjects.len();
        self.data.subjects.retain(|s| s.id != subject_id);
        if self.data.subjects.len() == before {
            bail!("Subject {subject_id} not found");
        }
        self.persist(Collection::Subjects);

        if self.data.active_subject_id.as_deref() == Some(subject_id) {
            self.data.active_subject_id = None;
            self.persist(Collection::ActiveSubjectId);
        }

        log_info!("Deleted subject {subject_id}");
        Ok(())
    }

    pub fn set_active_subject(&mut self, subject_id: Option<&str>) -> Result<()> {
        if let Some(id) = subject_id {
            if !self.data.subjects.iter().any(|s| s.id == id) {
                bail!("Subject {id} not found");
            }
        }
        self.data.active_subject_id = subject_id.map(str::to_string);
        self.persist(Collection::ActiveSubjectId);
        Ok(())
    }

    pub fn active_subject(&self) -> Option<&Subject> {
        let id = self.data.active_subject_id.as_deref()?;
        self.data.subjects.iter().find(|s| s.id == id)
    }

    pub fn find_subject_by_name(&self, name: &str) -> Option<&Subject> {
        let wanted = name.trim().to_lowercase();
        self.data
            .subjects
            .iter()
            .find(|s| s.name.to_lowercase() == wanted)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        models::{SubjectUpdate, SUBJECT_COLORS},
        store::{test_support::anonymous_store, CompletionRecord},
        timer::TimerMode,
    };

    #[test]
    fn palette_cycles_by_insertion_index() {
        let (mut store, _) = anonymous_store();
        let colors: Vec<String> = (0..9)
            .map(|i| store.add_subject(&format!("s{i}"), None).unwrap().color)
            .collect();

        assert_eq!(colors[0], SUBJECT_COLORS[0]);
        assert_eq!(colors[7], SUBJECT_COLORS[7]);
        assert_eq!(colors[8], SUBJECT_COLORS[0]);

        let chosen = store.add_subject("picked", Some("#ABCDEF".into())).unwrap();
        assert_eq!(chosen.color, "#ABCDEF");
        assert!(store.add_subject("bad", Some("red".into())).is_err());
        assert!(store.add_subject("  ", None).is_err());
    }

    #[test]
    fn update_changes_name_and_color() {
        let (mut store, _) = anonymous_store();
        let subject = store.add_subject("Bio", None).unwrap();

        let updated = store
            .update_subject(
                &subject.id,
                SubjectUpdate {
                    name: Some(" Biology ".into()),
                    color: Some("#14532d".into()),
                },
            )
            .unwrap();
        assert_eq!(updated.name, "Biology");
        assert_eq!(updated.color, "#14532d");
        assert!(store
            .update_subject("missing", SubjectUpdate::default())
            .is_err());
    }

    #[test]
    fn deleting_active_subject_clears_pointer() {
        let (mut store, _) = anonymous_store();
        let active = store.add_subject("Math", None).unwrap();
        let other = store.add_subject("Art", None).unwrap();
        store.set_active_subject(Some(active.id.as_str())).unwrap();

        store.delete_subject(&other.id).unwrap();
        assert_eq!(store.active_subject().map(|s| s.id.clone()), Some(active.id.clone()));

        store.delete_subject(&active.id).unwrap();
        assert!(store.active_subject().is_none());
        assert!(store.data().active_subject_id.is_none());
    }

    #[test]
    fn deleted_subject_history_keeps_its_name() {
        let (mut store, _) = anonymous_store();
        let subject = store.add_subject("Chemistry", None).unwrap();
        store.set_active_subject(Some(subject.id.as_str())).unwrap();
        store.record_completion(CompletionRecord::for_active_subject(
            &store,
            TimerMode::Work,
            1500,
            100.0,
            None,
        ));

        store.delete_subject(&subject.id).unwrap();
        let history = store.sessions_by_subject(&subject.id);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].subject_name, "Chemistry");
    }

    #[test]
    fn active_subject_must_exist() {
        let (mut store, _) = anonymous_store();
        assert!(store.set_active_subject(Some("nope")).is_err());
        store.set_active_subject(None).unwrap();
        assert!(store.active_subject().is_none());
    }

    #[test]
    fn finds_subject_by_name_case_insensitively() {
        let (mut store, _) = anonymous_store();
        let subject = store.add_subject("History", None).unwrap();
        assert_eq!(store.find_subject_by_name("history").map(|s| &s.id), Some(&subject.id));
        assert!(store.find_subject_by_name("geo").is_none());
    }
}
