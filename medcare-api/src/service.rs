use axum::{
    Router,
    extract::State,
    http::{HeaderName, HeaderValue},
    middleware,
    response::Json,
    routing::get,
};
use medcare_inference::DiseasePredictor;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

#[cfg(feature = "chat")]
use crate::chat::ChatRelay;
use crate::config::Settings;
use crate::routes;
use crate::telemetry::{CORRELATION_ID_HEADER, correlation_id_middleware};
#[cfg(feature = "cancer")]
use medcare_inference::{ArtifactLoader, CancerScanner};

const SERVICE_NAME: &str = "MedCare API";

/// Everything a handler needs, built once at startup and shared.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub disease: Arc<DiseasePredictor>,
    #[cfg(feature = "cancer")]
    pub cancer: Arc<CancerScanner>,
    #[cfg(feature = "chat")]
    pub chat: Arc<ChatRelay>,
}

pub async fn create_app(settings: &Settings) -> Router {
    let app_state = create_app_state(settings).await;
    build_router(app_state)
}

async fn create_app_state(settings: &Settings) -> AppState {
    let disease_dir = settings.disease_model_dir.clone();
    let disease = tokio::task::spawn_blocking(move || DiseasePredictor::load(&disease_dir))
        .await
        .unwrap_or_else(|e| DiseasePredictor::unavailable(format!("load task failed: {}", e)));

    #[cfg(feature = "cancer")]
    let cancer = {
        let scanner = CancerScanner::new(Arc::new(ArtifactLoader::new(
            settings.cancer_model_dir.clone(),
        )));
        scanner.try_load().await;
        Arc::new(scanner)
    };

    #[cfg(feature = "chat")]
    let chat = {
        let relay = ChatRelay::from_settings(&settings.chat);
        info!(
            provider = relay.provider_name(),
            auth_mode = relay.auth_mode().as_str(),
            server_credential = relay.has_server_credential(),
            "Chat relay configured"
        );
        Arc::new(relay)
    };

    AppState {
        settings: Arc::new(settings.clone()),
        disease: Arc::new(disease),
        #[cfg(feature = "cancer")]
        cancer,
        #[cfg(feature = "chat")]
        chat,
    }
}

pub fn build_router(app_state: AppState) -> Router {
    let cors = cors_layer(&app_state.settings.cors_origins);

    let router = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .nest("/disease", routes::disease::router());

    #[cfg(feature = "cancer")]
    let router = router.nest(
        "/cancer",
        routes::cancer::router(app_state.settings.max_upload_bytes),
    );

    #[cfg(feature = "chat")]
    let router = router.nest("/chat", routes::chat::router());

    router
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(correlation_id_middleware))
        .layer(cors)
        .with_state(app_state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    // Credentials rule out wildcards, so methods and headers mirror the preflight.
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
        .expose_headers([HeaderName::from_static(CORRELATION_ID_HEADER)])
}

async fn root() -> Json<Value> {
    let mut endpoints = Map::new();
    endpoints.insert("disease".into(), json!("/disease/predict"));
    #[cfg(feature = "cancer")]
    endpoints.insert("cancer".into(), json!("/cancer/scan"));
    #[cfg(feature = "chat")]
    endpoints.insert("chat".into(), json!("/chat/message"));

    Json(json!({
        "message": "MedCare API is running.",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Disease prediction, lung-scan classification and a medical chat assistant",
        "endpoints": endpoints,
    }))
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let mut modules = Map::new();
    modules.insert(
        "disease".into(),
        json!(if state.disease.is_available() { "available" } else { "unavailable" }),
    );

    #[cfg(feature = "cancer")]
    modules.insert("cancer".into(), cancer_health(&state.cancer).await);

    #[cfg(feature = "chat")]
    modules.insert(
        "chat".into(),
        json!({
            "provider": state.chat.provider_name(),
            "auth_mode": state.chat.auth_mode().as_str(),
            "server_credential": state.chat.has_server_credential(),
        }),
    );

    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "modules": modules,
    }))
}

#[cfg(feature = "cancer")]
async fn cancer_health(scanner: &CancerScanner) -> Value {
    let model_state = scanner.state().await;
    json!({
        "status": model_state.status(),
        "detail": model_state.reason(),
        "load_attempts": scanner.load_attempts(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use std::path::{Path, PathBuf};
    use tower::ServiceExt;

    fn disease_fixtures() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../medcare-inference/tests/fixtures/disease")
    }

    fn test_settings() -> Settings {
        Settings {
            disease_model_dir: disease_fixtures(),
            ..Settings::default()
        }
    }

    async fn state_with(settings: Settings) -> AppState {
        create_app_state(&settings).await
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn patient(sex: &str) -> Value {
        json!({
            "Age": 34, "Sex": sex, "Blood_Type": "O+",
            "Body_Temperature": 38.9, "Heart_Rate": 95,
            "Systolic_BP": 118, "Diastolic_BP": 76, "BMI": 24.1,
            "Symptom_Cough": 1, "Symptom_Fatigue": 1, "Symptom_Sore_Throat": 0,
            "Symptom_Shortness_of_Breath": 0, "Symptom_Headache": 1
        })
    }

    #[tokio::test]
    async fn test_root_lists_registered_modules() {
        let app = build_router(state_with(test_settings()).await);
        let (status, body) = send(app, Request::get("/").body(Body::empty()).unwrap()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "MedCare API is running.");
        assert_eq!(body["endpoints"]["disease"], "/disease/predict");
        #[cfg(feature = "cancer")]
        assert_eq!(body["endpoints"]["cancer"], "/cancer/scan");
        #[cfg(feature = "chat")]
        assert_eq!(body["endpoints"]["chat"], "/chat/message");
    }

    #[tokio::test]
    async fn test_health_reports_modules() {
        let app = build_router(state_with(test_settings()).await);
        let (status, body) = send(app, Request::get("/health").body(Body::empty()).unwrap()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert!(body["timestamp"].is_string());
        assert_eq!(body["modules"]["disease"], "available");
        #[cfg(feature = "cancer")]
        {
            let cancer = &body["modules"]["cancer"];
            assert_eq!(cancer["status"], "not_loaded");
            assert_eq!(cancer["load_attempts"], 1);
            assert!(cancer["detail"].as_str().unwrap().contains("not yet installed"));
        }
    }

    #[tokio::test]
    async fn test_correlation_id_is_echoed() {
        let app = build_router(state_with(test_settings()).await);

        let response = app
            .clone()
            .oneshot(
                Request::get("/health")
                    .header(CORRELATION_ID_HEADER, "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[CORRELATION_ID_HEADER], "req-42");

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.headers().contains_key(CORRELATION_ID_HEADER));
    }

    #[tokio::test]
    async fn test_predict_disease() {
        let app = build_router(state_with(test_settings()).await);
        let (status, body) = send(app, post_json("/disease/predict", patient("Female"))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["prediction"], "Influenza");
        assert_eq!(body["confidence"], 0.625);
        assert_eq!(body["module"], "Machine Learning (Random Forest)");
    }

    #[tokio::test]
    async fn test_predict_rejects_unknown_category() {
        let app = build_router(state_with(test_settings()).await);
        let (status, body) = send(app, post_json("/disease/predict", patient("X"))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_input");
        assert_eq!(body["detail"], "Invalid Sex 'X'. Valid options: [Female, Male]");
    }

    #[tokio::test]
    async fn test_predict_accepts_whole_number_floats() {
        let app = build_router(state_with(test_settings()).await);
        let mut record = patient("Female");
        record["Age"] = json!(34.0);
        let (status, body) = send(app, post_json("/disease/predict", record)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["prediction"], "Influenza");
    }

    #[tokio::test]
    async fn test_predict_rejects_malformed_body() {
        let app = build_router(state_with(test_settings()).await);
        let (status, body) = send(app, post_json("/disease/predict", json!({"Age": 30}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_input");
    }

    #[tokio::test]
    async fn test_predict_without_model_is_server_error() {
        let missing = tempfile::tempdir().unwrap();
        let settings = Settings {
            disease_model_dir: missing.path().to_path_buf(),
            ..Settings::default()
        };
        let app = build_router(state_with(settings).await);
        let (status, body) = send(app, post_json("/disease/predict", patient("Male"))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "model_unavailable");
        assert!(body["detail"].as_str().unwrap().starts_with("Disease model not initialized"));
    }

    #[cfg(feature = "cancer")]
    mod cancer {
        use super::*;
        use medcare_inference::{
            ImageClassifier, LabelMap, LoadedModel, ModelLoader, Result as InferenceResult,
        };
        use std::collections::HashMap;
        use std::sync::atomic::{AtomicBool, Ordering};

        const BOUNDARY: &str = "medcare-test-boundary";

        struct FixedClassifier(Vec<f32>);

        impl ImageClassifier for FixedClassifier {
            fn classify(&self, _input: &[f32]) -> InferenceResult<Vec<f32>> {
                Ok(self.0.clone())
            }
        }

        /// Reports the model missing until `installed` is flipped.
        struct SwitchLoader {
            installed: AtomicBool,
        }

        impl ModelLoader for SwitchLoader {
            fn describe(&self) -> String {
                "switch".to_string()
            }

            fn load(&self) -> InferenceResult<LoadedModel> {
                if !self.installed.load(Ordering::SeqCst) {
                    return Err(medcare_inference::InferenceError::ModelUnavailable(
                        "Lung cancer model not installed".to_string(),
                    ));
                }
                let indices = HashMap::from([
                    ("Bengin cases".to_string(), 0),
                    ("Malignant cases".to_string(), 1),
                    ("Normal cases".to_string(), 2),
                ]);
                Ok(LoadedModel {
                    classifier: Arc::new(FixedClassifier(vec![0.05, 0.9, 0.05])),
                    labels: LabelMap::from_class_indices(indices)?,
                })
            }
        }

        fn png() -> Vec<u8> {
            let img = image::RgbImage::from_pixel(32, 32, image::Rgb([120, 130, 140]));
            let mut out = std::io::Cursor::new(Vec::new());
            img.write_to(&mut out, image::ImageFormat::Png).unwrap();
            out.into_inner()
        }

        fn multipart(field: &str, bytes: &[u8]) -> Request<Body> {
            let mut body = Vec::new();
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{field}\"; filename=\"scan.png\"\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
            body.extend_from_slice(bytes);
            body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

            Request::builder()
                .method("POST")
                .uri("/cancer/scan")
                .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
                .body(Body::from(body))
                .unwrap()
        }

        async fn app_with_loader(loader: Arc<SwitchLoader>) -> Router {
            let mut state = state_with(test_settings()).await;
            state.cancer = Arc::new(CancerScanner::new(loader));
            build_router(state)
        }

        #[tokio::test]
        async fn test_scan_before_and_after_install() {
            let loader = Arc::new(SwitchLoader {
                installed: AtomicBool::new(false),
            });
            let app = app_with_loader(loader.clone()).await;

            let (status, body) = send(app.clone(), multipart("file", &png())).await;
            assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
            assert_eq!(body["error"], "model_unavailable");

            loader.installed.store(true, Ordering::SeqCst);

            let (status, body) = send(app, multipart("file", &png())).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["prediction"], "Malignant cases");
            assert_eq!(body["confidence"], "90.00%");
            assert_eq!(body["raw_scores"].as_object().unwrap().len(), 3);
        }

        #[tokio::test]
        async fn test_scan_input_errors() {
            let loader = Arc::new(SwitchLoader {
                installed: AtomicBool::new(true),
            });
            let app = app_with_loader(loader).await;

            let (status, body) = send(app.clone(), multipart("file", b"not an image")).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], "invalid_input");

            let (status, body) = send(app.clone(), multipart("upload", &png())).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["detail"], "Missing multipart field 'file'");

            let (status, _) = send(app, post_json("/cancer/scan", json!({}))).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }

        #[tokio::test]
        async fn test_scan_without_artifacts_is_unavailable() {
            let missing = tempfile::tempdir().unwrap();
            let settings = Settings {
                cancer_model_dir: missing.path().to_path_buf(),
                ..test_settings()
            };
            let app = build_router(state_with(settings).await);

            let (status, _) = send(app, multipart("file", &png())).await;
            assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        }

        #[tokio::test]
        async fn test_oversized_upload_is_payload_too_large() {
            let settings = Settings {
                max_upload_bytes: 1024,
                ..test_settings()
            };
            let mut state = state_with(settings).await;
            state.cancer = Arc::new(CancerScanner::new(Arc::new(SwitchLoader {
                installed: AtomicBool::new(true),
            })));
            let app = build_router(state);

            let (status, body) = send(app.clone(), multipart("file", &[0u8; 64 * 1024])).await;
            assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
            assert_eq!(body["error"], "payload_too_large");

            let (status, _) = send(app, multipart("file", b"tiny but not an image")).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
    }

    #[cfg(feature = "chat")]
    mod chat {
        use super::*;
        use crate::chat::{ChatError, ChatProvider, CompletionRequest};
        use crate::config::ChatAuthMode;
        use async_trait::async_trait;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::time::Duration;

        #[derive(Default)]
        struct CountingProvider {
            calls: AtomicUsize,
        }

        #[async_trait]
        impl ChatProvider for CountingProvider {
            fn name(&self) -> &str {
                "Google Gemini"
            }

            async fn complete(
                &self,
                _api_key: &str,
                _request: CompletionRequest,
            ) -> Result<String, ChatError> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Ok("Rest and drink fluids. Please consult a doctor.".to_string())
            }
        }

        async fn app_with(
            provider: Arc<CountingProvider>,
            mode: ChatAuthMode,
            key: Option<&str>,
        ) -> Router {
            let mut state = state_with(test_settings()).await;
            state.chat = Arc::new(ChatRelay::new(
                provider,
                mode,
                key.map(str::to_string),
                Duration::from_secs(5),
            ));
            build_router(state)
        }

        #[tokio::test]
        async fn test_chat_message() {
            let provider = Arc::new(CountingProvider::default());
            let app = app_with(provider.clone(), ChatAuthMode::Server, Some("key")).await;

            let (status, body) = send(
                app,
                post_json(
                    "/chat/message",
                    json!({
                        "message": "I feel feverish",
                        "context": "Patient Diagnosis: Influenza"
                    }),
                ),
            )
            .await;

            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["status"], "success");
            assert_eq!(body["provider"], "Google Gemini");
            assert_eq!(body["reply"], "Rest and drink fluids. Please consult a doctor.");
            assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        }

        #[tokio::test]
        async fn test_chat_without_credential_is_unauthorized() {
            let provider = Arc::new(CountingProvider::default());
            let app = app_with(provider.clone(), ChatAuthMode::Server, None).await;

            let request = post_json("/chat/message", json!({"message": "hi"}));
            let (status, body) = send(app, request).await;

            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body["error"], "unauthorized");
            assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        }

        #[tokio::test]
        async fn test_chat_request_key_header() {
            let provider = Arc::new(CountingProvider::default());
            let app = app_with(provider.clone(), ChatAuthMode::Request, None).await;

            let mut request = post_json("/chat/message", json!({"message": "hi"}));
            request
                .headers_mut()
                .insert("x-api-key", HeaderValue::from_static("caller-key"));
            let (status, _) = send(app, request).await;

            assert_eq!(status, StatusCode::OK);
            assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        }

        #[tokio::test]
        async fn test_chat_empty_message() {
            let provider = Arc::new(CountingProvider::default());
            let app = app_with(provider, ChatAuthMode::Server, Some("key")).await;

            let request = post_json("/chat/message", json!({"message": "   "}));
            let (status, _) = send(app, request).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
    }
}
