use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;

use lms_core::model::{CourseId, LessonId};
use lms_core::scheduler::{MANUAL_SAVE_TIMEOUT, RemoteFailure};

use crate::wire::{
    CertificateRequest, ErrorBody, IssuedCertificate, LessonProgressRequest,
    LessonProgressResponse, ProgressSnapshot, QuizGrade, QuizSubmitRequest,
};

/// Where the progress server lives and how to authenticate against it.
#[derive(Clone, Debug)]
pub struct ProgressApiConfig {
    pub base_url: String,
    pub token: Option<String>,
    /// Upper bound for a single HTTP exchange.
    pub timeout: Duration,
}

impl ProgressApiConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            timeout: MANUAL_SAVE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Remote calls used by a course session.
#[async_trait]
pub trait ProgressApi: Send + Sync {
    /// # Errors
    ///
    /// Returns a classified `RemoteFailure` when the fetch does not succeed.
    async fn fetch_progress(&self, course_id: CourseId) -> Result<ProgressSnapshot, RemoteFailure>;

    /// # Errors
    ///
    /// Returns a classified `RemoteFailure` when the save does not land.
    async fn save_lesson(
        &self,
        course_id: CourseId,
        lesson_id: LessonId,
        body: &LessonProgressRequest,
    ) -> Result<LessonProgressResponse, RemoteFailure>;

    /// Grade a quiz attempt on the server.
    ///
    /// # Errors
    ///
    /// Returns a classified `RemoteFailure` when the submission is rejected or
    /// does not get through.
    async fn submit_quiz(
        &self,
        lesson_id: LessonId,
        body: &QuizSubmitRequest,
    ) -> Result<QuizGrade, RemoteFailure>;

    /// # Errors
    ///
    /// Returns a classified `RemoteFailure` when no certificate is returned.
    async fn issue_certificate(
        &self,
        course_id: CourseId,
    ) -> Result<IssuedCertificate, RemoteFailure>;
}

/// `ProgressApi` over HTTP.
#[derive(Clone)]
pub struct HttpProgressApi {
    client: Client,
    config: ProgressApiConfig,
}

impl HttpProgressApi {
    #[must_use]
    pub fn new(config: ProgressApiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, RemoteFailure>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let request = self.client.post(self.url(path)).json(body);
        self.send(request).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RemoteFailure> {
        let request = request.timeout(self.config.timeout);
        let request = match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await.map_err(transport_failure)?;
        decode(response).await
    }
}

#[async_trait]
impl ProgressApi for HttpProgressApi {
    async fn fetch_progress(&self, course_id: CourseId) -> Result<ProgressSnapshot, RemoteFailure> {
        let request = self.client.get(self.url(&format!("progress/courses/{course_id}")));
        self.send(request).await
    }

    async fn save_lesson(
        &self,
        course_id: CourseId,
        lesson_id: LessonId,
        body: &LessonProgressRequest,
    ) -> Result<LessonProgressResponse, RemoteFailure> {
        self.post_json(
            &format!("progress/courses/{course_id}/lessons/{lesson_id}"),
            body,
        )
        .await
    }

    async fn submit_quiz(
        &self,
        lesson_id: LessonId,
        body: &QuizSubmitRequest,
    ) -> Result<QuizGrade, RemoteFailure> {
        self.post_json(&format!("quiz/{lesson_id}/submit"), body)
            .await
    }

    async fn issue_certificate(
        &self,
        course_id: CourseId,
    ) -> Result<IssuedCertificate, RemoteFailure> {
        self.post_json("certificates", &CertificateRequest { course_id })
            .await
    }
}

fn transport_failure(err: reqwest::Error) -> RemoteFailure {
    if err.is_timeout() {
        RemoteFailure::Timeout
    } else {
        RemoteFailure::Unexpected(err.to_string())
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, RemoteFailure> {
    let status = response.status();
    if status.is_success() {
        return response.json().await.map_err(transport_failure);
    }
    // Error bodies are `{message}`; anything else falls back to the reason.
    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.message,
        Err(_) => status.canonical_reason().unwrap_or_default().to_owned(),
    };
    Err(RemoteFailure::from_status(status.as_u16(), message))
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use axum::{
        Json, Router,
        extract::Path,
        http::{HeaderMap, StatusCode, header::AUTHORIZATION},
        response::{IntoResponse, Response},
        routing::{get, post},
    };
    use serde_json::json;
    use tokio::net::TcpListener;

    use super::*;

    const TOKEN: &str = "t0k";

    async fn progress_route(Path(course): Path<u64>, headers: HeaderMap) -> Response {
        match course {
            1 => (
                StatusCode::NOT_FOUND,
                Json(json!({"message": "no progress route"})),
            )
                .into_response(),
            3 => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
            4 => (StatusCode::OK, "not json").into_response(),
            5 => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                StatusCode::OK.into_response()
            }
            _ => {
                let bearer = format!("Bearer {TOKEN}");
                let authorized = headers
                    .get(AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .is_some_and(|v| v == bearer);
                if authorized {
                    Json(ProgressSnapshot::skeleton()).into_response()
                } else {
                    StatusCode::UNAUTHORIZED.into_response()
                }
            }
        }
    }

    async fn rejecting_save() -> Response {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"message": "bad timestamp"})),
        )
            .into_response()
    }

    async fn stub_server() -> SocketAddr {
        let app = Router::new()
            .route("/progress/courses/:course_id", get(progress_route))
            .route(
                "/progress/courses/:course_id/lessons/:lesson_id",
                post(rejecting_save),
            );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn client(addr: SocketAddr) -> HttpProgressApi {
        HttpProgressApi::new(
            ProgressApiConfig::new(format!("http://{addr}/"))
                .with_token(TOKEN)
                .with_timeout(Duration::from_millis(200)),
        )
    }

    #[test]
    fn urls_join_without_double_slash() {
        let api = HttpProgressApi::new(ProgressApiConfig::new("http://localhost:8080/api/"));
        assert_eq!(
            api.url("progress/courses/4"),
            "http://localhost:8080/api/progress/courses/4"
        );
    }

    #[tokio::test]
    async fn successful_fetch_sends_bearer_token() {
        let api = client(stub_server().await);
        let snapshot = api.fetch_progress(CourseId::new(9)).await.unwrap();
        assert_eq!(snapshot, ProgressSnapshot::skeleton());

        let anonymous = HttpProgressApi::new(ProgressApiConfig::new(format!(
            "http://{}",
            stub_server().await
        )));
        let err = anonymous.fetch_progress(CourseId::new(9)).await.unwrap_err();
        assert!(matches!(err, RemoteFailure::Validation { status: 401, .. }));
    }

    #[tokio::test]
    async fn statuses_map_to_failure_kinds() {
        let api = client(stub_server().await);

        assert_eq!(
            api.fetch_progress(CourseId::new(1)).await.unwrap_err(),
            RemoteFailure::NotFound
        );
        assert!(matches!(
            api.fetch_progress(CourseId::new(3)).await.unwrap_err(),
            RemoteFailure::Unexpected(_)
        ));

        let err = api
            .save_lesson(
                CourseId::new(2),
                LessonId::new(1),
                &LessonProgressRequest::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RemoteFailure::Validation {
                status: 422,
                message: "bad timestamp".into(),
            }
        );
    }

    #[tokio::test]
    async fn malformed_success_body_is_unexpected() {
        let api = client(stub_server().await);
        assert!(matches!(
            api.fetch_progress(CourseId::new(4)).await.unwrap_err(),
            RemoteFailure::Unexpected(_)
        ));
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let api = client(stub_server().await);
        assert_eq!(
            api.fetch_progress(CourseId::new(5)).await.unwrap_err(),
            RemoteFailure::Timeout
        );
    }
}
