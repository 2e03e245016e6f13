use std::sync::{Arc, Mutex};
use std::time::Duration;

use revwatch::exec::{ActionFuture, ActionRequest, ActionRunner, ExecutionResult};

#[derive(Debug, Clone)]
enum Behaviour {
    Succeed,
    Fail(String),
    /// Never finishes on its own.
    Hang,
}

/// A fake action runner that:
/// - records every request it receives
/// - returns a scripted result.
#[derive(Debug, Clone)]
pub struct RecordingRunner {
    behaviour: Behaviour,
    requests: Arc<Mutex<Vec<ActionRequest>>>,
}

impl RecordingRunner {
    pub fn succeeding() -> Self {
        Self::with(Behaviour::Succeed)
    }

    pub fn failing(message: &str) -> Self {
        Self::with(Behaviour::Fail(message.to_string()))
    }

    pub fn hanging() -> Self {
        Self::with(Behaviour::Hang)
    }

    fn with(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn requests(&self) -> Vec<ActionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl ActionRunner for RecordingRunner {
    fn run(&mut self, request: ActionRequest) -> ActionFuture<'_> {
        let requests = Arc::clone(&self.requests);
        let behaviour = self.behaviour.clone();

        Box::pin(async move {
            let repository = request.repository.clone();
            requests.lock().unwrap().push(request);

            match behaviour {
                Behaviour::Succeed => ExecutionResult::success(repository, Duration::ZERO),
                Behaviour::Fail(msg) => ExecutionResult::failure(repository, msg, Duration::ZERO),
                Behaviour::Hang => std::future::pending::<ExecutionResult>().await,
            }
        })
    }
}
