//! Confirmation queue
//!
//! The controller asks; a front end polls the queue and answers through
//! [`Browser::answer`](crate::Browser::answer).

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use tern_navigation::{ConfirmationId, ConfirmationPrompt, Prompter};

#[derive(Debug, Clone, Default)]
pub struct QueuedPrompter {
    queue: Arc<Mutex<VecDeque<(ConfirmationId, ConfirmationPrompt)>>>,
}

impl QueuedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every question asked since the last call, oldest first.
    pub fn take_all(&self) -> Vec<(ConfirmationId, ConfirmationPrompt)> {
        self.queue.lock().drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

impl Prompter for QueuedPrompter {
    fn ask(&mut self, id: ConfirmationId, prompt: &ConfirmationPrompt) {
        self.queue.lock().push_back((id, prompt.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_navigation::{ConfirmReason, Uri};

    #[test]
    fn test_clones_share_the_queue() {
        let prompter = QueuedPrompter::new();
        let mut asker = prompter.clone();
        let prompt = ConfirmationPrompt {
            reason: ConfirmReason::Post,
            uri: Uri::parse("http://a.example/").unwrap(),
        };

        asker.ask(1, &prompt);
        asker.ask(2, &prompt);
        let asked: Vec<ConfirmationId> = prompter.take_all().into_iter().map(|(id, _)| id).collect();
        assert_eq!(asked, vec![1, 2]);
        assert!(prompter.is_empty());
    }
}
