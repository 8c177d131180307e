use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::PrepError;

/// One named step of a [`Process`].
pub trait Task {
    fn name(&self) -> &str;
    fn execute(&mut self) -> Result<(), PrepError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskOutcome {
    pub id: u32,
    pub name: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessReport {
    pub outcomes: Vec<TaskOutcome>,
}

impl ProcessReport {
    pub fn failed(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.error.is_some())
    }
}

/// Ordered list of tasks run one after another.
///
/// Ids come from a counter that never goes backwards, so removing a task
/// does not change the position of the others.
pub struct Process {
    tasks: BTreeMap<u32, Box<dyn Task>>,
    last_id: u32,
    continue_with_errors: bool,
}

impl Default for Process {
    fn default() -> Self {
        Self::new()
    }
}

impl Process {
    pub fn new() -> Self {
        Self {
            tasks: BTreeMap::new(),
            last_id: 0,
            continue_with_errors: true,
        }
    }

    pub fn continue_with_errors(mut self, value: bool) -> Self {
        self.continue_with_errors = value;
        self
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn add_task(&mut self, task: Box<dyn Task>) -> u32 {
        self.last_id += 1;
        self.tasks.insert(self.last_id, task);
        self.last_id
    }

    pub fn pop_task(&mut self, id: u32) -> Option<Box<dyn Task>> {
        let task = self.tasks.remove(&id);
        if task.is_none() {
            warn!(id, "task not found in process");
        }
        task
    }

    /// Runs every task in id order.
    ///
    /// With `continue_with_errors` unset, the first failure stops the run and
    /// is returned as [`PrepError::TaskFailed`].
    pub fn execute(&mut self) -> Result<ProcessReport, PrepError> {
        let mut report = ProcessReport::default();
        for (id, task) in self.tasks.iter_mut() {
            let name = task.name().to_string();
            info!(id, name = %name, "executing task");
            let result = task.execute();
            info!(id, name = %name, "task finished");
            match result {
                Ok(()) => report.outcomes.push(TaskOutcome {
                    id: *id,
                    name,
                    error: None,
                }),
                Err(err) => {
                    error!(id, name = %name, error = %err, "task failed");
                    if !self.continue_with_errors {
                        return Err(PrepError::TaskFailed {
                            id: *id,
                            name,
                            message: err.to_string(),
                        });
                    }
                    report.outcomes.push(TaskOutcome {
                        id: *id,
                        name,
                        error: Some(err.to_string()),
                    });
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use assert_matches::assert_matches;

    use super::*;

    struct Step {
        name: String,
        fail: bool,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Task for Step {
        fn name(&self) -> &str {
            &self.name
        }

        fn execute(&mut self) -> Result<(), PrepError> {
            self.log.lock().unwrap().push(self.name.clone());
            if self.fail {
                return Err(PrepError::Filesystem("boom".to_string()));
            }
            Ok(())
        }
    }

    fn step(name: &str, fail: bool, log: &Arc<Mutex<Vec<String>>>) -> Box<dyn Task> {
        Box::new(Step {
            name: name.to_string(),
            fail,
            log: Arc::clone(log),
        })
    }

    #[test]
    fn runs_in_order_and_continues_past_errors() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut process = Process::new();
        process.add_task(step("pre-processing", false, &log));
        process.add_task(step("training", true, &log));
        process.add_task(step("post-processing", false, &log));

        let report = process.execute().unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["pre-processing", "training", "post-processing"]
        );
        let failed = report.failed().map(|outcome| outcome.id).collect::<Vec<_>>();
        assert_eq!(failed, vec![2]);
    }

    #[test]
    fn stops_on_first_error_when_asked() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut process = Process::new().continue_with_errors(false);
        process.add_task(step("a", true, &log));
        process.add_task(step("b", false, &log));

        let err = process.execute().unwrap_err();
        assert_matches!(err, PrepError::TaskFailed { id: 1, .. });
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
    }

    #[test]
    fn popped_ids_are_not_reused() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut process = Process::new();
        let first = process.add_task(step("a", false, &log));
        assert!(process.pop_task(first).is_some());
        assert!(process.pop_task(first).is_none());
        let second = process.add_task(step("b", false, &log));
        assert_eq!(second, 2);
        assert_eq!(process.len(), 1);
    }
}
