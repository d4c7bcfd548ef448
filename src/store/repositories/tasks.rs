use anyhow::{anyhow, bail, Result};
use uuid::Uuid;

use crate::{
    models::{now_ms, Task},
    store::{Collection, FocusStore},
};

impl FocusStore {
    /// Adds a task. Without an explicit subject the active subject is used.
    pub fn add_task(&mut self, text: &str, subject_id: Option<String>) -> Result<Task> {
        let text = text.trim();
        if text.is_empty() {
            bail!("Task text cannot be empty");
        }

        let task = Task {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            completed: false,
            created_at: now_ms(),
            subject_id: subject_id.or_else(|| self.data.active_subject_id.clone()),
        };

        self.data.tasks.push(task.clone());
        self.persist(Collection::Tasks);
        Ok(task)
    }

    /// Flips the completed flag and recomputes the completed-task counter.
    pub fn toggle_task(&mut self, task_id: &str) -> Result<bool> {
        let task = self
            .data
            .tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| anyhow!("Task {task_id} not found"))?;
        task.completed = !task.completed;
        let completed = task.completed;
        self.persist(Collection::Tasks);

        self.data.stats.tasks_completed =
            self.data.tasks.iter().filter(|t| t.completed).count() as u64;
        self.persist(Collection::Stats);

        Ok(completed)
    }

    pub fn delete_task(&mut self, task_id: &str) -> Result<()> {
        let before = self.data.tasks.len();
        self.data.tasks.retain(|t| t.id != task_id);
        if self.data.tasks.len() == before {
            bail!("Task {task_id} not found");
        }
        self.persist(Collection::Tasks);
        Ok(())
    }

    pub fn tasks_by_subject(&self, subject_id: &str) -> Vec<&Task> {
        self.data
            .tasks
            .iter()
            .filter(|t| t.subject_id.as_deref() == Some(subject_id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::store::test_support::anonymous_store;

    #[test]
    fn add_trims_text_and_defaults_to_active_subject() {
        let (mut store, _) = anonymous_store();
        let subject = store.add_subject("Math", None).unwrap();
        store.set_active_subject(Some(subject.id.as_str())).unwrap();

        let task = store.add_task("  proofs  ", None).unwrap();
        assert_eq!(task.text, "proofs");
        assert_eq!(task.subject_id.as_deref(), Some(subject.id.as_str()));

        let explicit = store.add_task("other", Some("elsewhere".into())).unwrap();
        assert_eq!(explicit.subject_id.as_deref(), Some("elsewhere"));
        assert_eq!(store.tasks_by_subject(&subject.id).len(), 1);
    }

    #[test]
    fn empty_text_is_rejected() {
        let (mut store, _) = anonymous_store();
        assert!(store.add_task("   ", None).is_err());
        assert!(store.tasks().is_empty());
    }

    #[test]
    fn toggle_recomputes_completed_count() {
        let (mut store, _) = anonymous_store();
        let a = store.add_task("a", None).unwrap();
        let b = store.add_task("b", None).unwrap();

        assert!(store.toggle_task(&a.id).unwrap());
        assert!(store.toggle_task(&b.id).unwrap());
        assert_eq!(store.stats().tasks_completed, 2);

        assert!(!store.toggle_task(&a.id).unwrap());
        assert_eq!(store.stats().tasks_completed, 1);
        assert!(store.toggle_task("missing").is_err());
    }

    #[test]
    fn delete_removes_task() {
        let (mut store, _) = anonymous_store();
        let task = store.add_task("gone soon", None).unwrap();

        store.delete_task(&task.id).unwrap();
        assert!(store.tasks().is_empty());
        assert!(store.delete_task(&task.id).is_err());
    }
}
