// Call recording and fault injection shared by the fake clients

use azfile_azure::RetryError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// One recorded call: method name and its string arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub method: String,
    pub args: Vec<String>,
}

/// Ordered log of calls made against a fake.
#[derive(Debug, Clone, Default)]
pub struct CallRecorder {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a method call with arguments
    pub fn record(&self, method: &str, args: &[&str]) {
        self.calls.lock().push(Call {
            method: method.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        });
    }

    /// Number of calls to `method`
    pub fn count(&self, method: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.method == method).count()
    }

    /// Total number of calls
    pub fn total(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn was_called(&self, method: &str) -> bool {
        self.count(method) > 0
    }

    /// All calls in the order they were made
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

/// Errors to return from specific methods until cleared.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    errors: Arc<Mutex<HashMap<String, RetryError>>>,
}

impl Faults {
    /// Make every call to `method` fail with `error`.
    pub fn fail(&self, method: &str, error: RetryError) {
        self.errors.lock().insert(method.to_string(), error);
    }

    pub fn clear(&self, method: &str) {
        self.errors.lock().remove(method);
    }

    pub fn clear_all(&self) {
        self.errors.lock().clear();
    }

    /// The injected error for `method`, if any.
    pub fn check(&self, method: &str) -> Result<(), RetryError> {
        match self.errors.lock().get(method) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}
