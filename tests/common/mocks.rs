use agri_serve::{
    Error, Result,
    llm::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Choice, LlmClient},
    models::{DiseaseModel, ImageClassifier},
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

pub const TEST_LABELS: [&str; 3] = [
    "Tomato___Early_blight",
    "Tomato___Late_blight",
    "Tomato___healthy",
];

/// Mock LLM client for testing
#[derive(Debug)]
pub struct MockLlmClient {
    pub responses: Arc<Mutex<Vec<ChatCompletionResponse>>>,
    pub requests: Arc<Mutex<Vec<ChatCompletionRequest>>>,
    pub error: Option<String>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            error: None,
        }
    }

    pub fn with_responses(self, responses: Vec<ChatCompletionResponse>) -> Self {
        *self.responses.lock().unwrap() = responses;
        self
    }

    pub fn with_error(mut self, error: String) -> Self {
        self.error = Some(error);
        self
    }

    pub fn get_requests(&self) -> Vec<ChatCompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn create_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse> {
        self.requests.lock().unwrap().push(request);

        if let Some(ref error) = self.error {
            return Err(Error::llm(error.clone()));
        }

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(Error::llm("No more mock responses available"));
        }

        Ok(responses.remove(0))
    }
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

pub fn text_response(content: &str) -> ChatCompletionResponse {
    ChatCompletionResponse {
        id: "chatcmpl-mock".to_string(),
        model: "gemini-1.5-flash".to_string(),
        choices: vec![Choice {
            index: 0,
            message: ChatMessage {
                role: "assistant".to_string(),
                content: content.to_string(),
            },
            finish_reason: Some("Stop".to_string()),
        }],
        usage: None,
    }
}

/// Classifier that ignores the image and returns the same scores every time.
pub struct FixedClassifier {
    pub logits: Vec<f32>,
    pub calls: Mutex<usize>,
}

impl ImageClassifier for FixedClassifier {
    fn num_classes(&self) -> usize {
        self.logits.len()
    }

    fn logits(&self, input: &[f32]) -> Result<Vec<f32>> {
        assert_eq!(input.len(), 3 * 224 * 224);
        *self.calls.lock().unwrap() += 1;
        Ok(self.logits.clone())
    }
}

impl FixedClassifier {
    pub fn new(logits: [f32; 3]) -> Arc<Self> {
        Arc::new(Self {
            logits: logits.to_vec(),
            calls: Mutex::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

pub fn disease_model_with(classifier: Arc<FixedClassifier>) -> Arc<DiseaseModel> {
    let labels = TEST_LABELS.iter().map(|l| l.to_string()).collect();
    Arc::new(DiseaseModel::new(classifier, labels).unwrap())
}

pub fn disease_model(logits: [f32; 3]) -> Arc<DiseaseModel> {
    disease_model_with(FixedClassifier::new(logits))
}
