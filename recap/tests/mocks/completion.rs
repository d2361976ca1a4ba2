use std::sync::{Arc, Mutex};

use recap::{CompletionClient, Error, Result};

#[derive(Clone)]
pub struct MockCompletion {
    pub response: String,
    pub fail_with: Option<String>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockCompletion {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            fail_with: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(msg: &str) -> Self {
        Self {
            fail_with: Some(msg.to_string()),
            ..Self::new("")
        }
    }
}

impl CompletionClient for MockCompletion {
    async fn complete(&self, _system: &str, user: &str, _max_tokens: u32) -> Result<String> {
        self.calls.lock().unwrap().push(user.to_string());
        match self.fail_with {
            Some(ref msg) => Err(Error::Completion {
                status: 500,
                message: msg.clone(),
            }),
            None => Ok(self.response.clone()),
        }
    }
}
