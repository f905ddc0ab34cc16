//! The classification workflow: encode, ask the model, render the verdict.

use crate::error::{Error, Result};
use crate::ingest::IngestedImage;
use crate::preset::{Preset, Wording};
use crate::vision::{ClassificationRequest, ClassificationResult, VisionModel};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// A classification result rendered for the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub helmet: bool,
    pub confidence: u8,
    /// Whether the user passes the helmet gate
    pub eligible: bool,
    pub message: String,
}

impl Verdict {
    pub fn render(result: ClassificationResult, wording: &Wording) -> Self {
        let message = match result.helmet {
            true => wording.success_message(result.confidence),
            false => wording.failure_message(result.confidence),
        };
        Verdict {
            helmet: result.helmet,
            confidence: result.confidence,
            eligible: result.helmet,
            message,
        }
    }
}

/// Runs classifications against one model with one preset's wording. Built
/// once at startup and shared read-only.
#[derive(Clone)]
pub struct Classifier {
    model: Arc<dyn VisionModel>,
    preset: Preset,
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Classifier {{ preset: {:?} }}", self.preset)
    }
}

impl Classifier {
    pub fn new(model: Arc<dyn VisionModel>, preset: Preset) -> Self {
        Classifier { model, preset }
    }

    pub fn preset(&self) -> Preset {
        self.preset
    }

    pub fn wording(&self) -> &'static Wording {
        self.preset.wording()
    }

    /// Classify `image`. Every call encodes a fresh payload and issues a new
    /// request to the model.
    #[tracing::instrument(skip(self))]
    pub async fn classify(&self, image: &IngestedImage) -> Result<Verdict> {
        let payload = image.encode()?;
        info!("encoded {} byte png payload", payload.png.len());

        let request = ClassificationRequest::new(&payload, self.wording().instruction);
        match self.model.classify(&request).await {
            Ok(result) => Ok(Verdict::render(result, self.wording())),
            Err(e) => {
                warn!("classification failed: {e}");
                Err(e)
            }
        }
    }

    /// The message shown to the user when a classification fails. Service
    /// failures only report the status; reply bodies are never shown.
    pub fn error_message(&self, err: &Error) -> String {
        match err {
            Error::ResponseParse(_) => self.wording().parse_error_message(&err.to_string()),
            Error::Service { status, .. } => self.wording().service_error_message(*status),
            Error::Network(_) => self.wording().network_error_message.to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! A scripted stand-in for the hosted model

    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Answers every request with the same reply text and counts calls
    pub struct FakeModel {
        reply: String,
        calls: AtomicUsize,
        last_request: Mutex<Option<(String, String)>>,
    }

    impl FakeModel {
        pub fn replying(reply: &str) -> Arc<Self> {
            Arc::new(FakeModel {
                reply: reply.to_string(),
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            })
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// (data url, instruction) of the most recent request
        pub fn last_request(&self) -> Option<(String, String)> {
            self.last_request.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl VisionModel for FakeModel {
        async fn classify(&self, request: &ClassificationRequest) -> Result<ClassificationResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() =
                Some((request.data_url.clone(), request.instruction.clone()));
            crate::vision::parse_classification(&self.reply)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeModel;
    use super::*;
    use crate::ingest::fixtures;

    fn image() -> IngestedImage {
        fixtures::rgba_image().into()
    }

    #[tokio::test]
    async fn test_helmet_worn() {
        let model = FakeModel::replying(r#"{"helmet": true, "confidence": 87}"#);
        let classifier = Classifier::new(model.clone(), Preset::Generic);

        let verdict = classifier.classify(&image()).await.unwrap();
        assert!(verdict.helmet);
        assert!(verdict.eligible);
        assert_eq!(verdict.confidence, 87);
        assert!(verdict.message.contains("87"));
        assert_eq!(verdict.message, Preset::Generic.wording().success_message(87));
    }

    #[tokio::test]
    async fn test_helmet_not_worn_is_ineligible() {
        let model = FakeModel::replying(r#"{"helmet": false, "confidence": 42}"#);
        let classifier = Classifier::new(model, Preset::ScooterRental);

        let verdict = classifier.classify(&image()).await.unwrap();
        assert!(!verdict.helmet);
        assert!(!verdict.eligible);
        assert_eq!(verdict.confidence, 42);
        assert_eq!(
            verdict.message,
            Preset::ScooterRental.wording().failure_message(42)
        );
    }

    #[tokio::test]
    async fn test_unparseable_reply_has_no_verdict() {
        let model = FakeModel::replying("not json");
        let classifier = Classifier::new(model, Preset::Generic);

        let err = classifier.classify(&image()).await.unwrap_err();
        assert!(matches!(err, Error::ResponseParse(_)));

        let message = classifier.error_message(&err);
        assert!(message.starts_with("GPT 응답 파싱 오류: "));
        assert!(!message.contains("✅"));
        assert!(!message.contains("❌"));
    }

    #[tokio::test]
    async fn test_missing_confidence_is_a_parse_error() {
        let model = FakeModel::replying(r#"{"helmet": true}"#);
        let classifier = Classifier::new(model, Preset::Generic);

        let err = classifier.classify(&image()).await.unwrap_err();
        assert!(matches!(err, Error::ResponseParse(_)));
    }

    #[tokio::test]
    async fn test_every_call_reaches_the_model() {
        let model = FakeModel::replying(r#"{"helmet": true, "confidence": 70}"#);
        let classifier = Classifier::new(model.clone(), Preset::Generic);
        let image = image();

        classifier.classify(&image).await.unwrap();
        classifier.classify(&image).await.unwrap();
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn test_request_carries_png_and_instruction() {
        let model = FakeModel::replying(r#"{"helmet": true, "confidence": 70}"#);
        let classifier = Classifier::new(model.clone(), Preset::ScooterRental);
        classifier.classify(&image()).await.unwrap();

        let (data_url, instruction) = model.last_request().unwrap();
        assert!(data_url.starts_with("data:image/png;base64,iVBORw0KGgo"));
        assert_eq!(instruction, Preset::ScooterRental.wording().instruction);
    }

    #[test]
    fn test_service_error_message() {
        let body = r#"{"error":{"message":"Incorrect API key provided: sk-abc***wxyz"}}"#;
        for preset in [Preset::Generic, Preset::ScooterRental] {
            let classifier = Classifier::new(FakeModel::replying(""), preset);
            let err = Error::Service {
                status: 401,
                body: body.into(),
            };
            let message = classifier.error_message(&err);
            assert!(message.contains("401"));
            assert!(message.contains("다시 시도"));
            assert!(!message.contains("sk-abc"));
            assert!(!message.contains("Incorrect API key"));
            assert!(!err.to_string().contains("sk-abc"));
        }
    }
}
