//! HTTP surface of the learning platform.
//!
//! Authentication happens upstream; the gateway forwards the learner's id in
//! the `X-User-Id` header. All bodies are JSON with camelCase keys and every
//! error response is `{"message": ...}`.

#![forbid(unsafe_code)]

use std::io;
use std::time::Duration;

use axum::{
    Router,
    http::{
        HeaderName, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post},
};
use services::{AppServices, AppServicesError, Clock};
use thiserror::Error;
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

pub mod error;
pub mod extract;
pub mod routes;

use extract::USER_HEADER;
use routes::{
    best_quiz_result_handler, complete_lesson_handler, course_analytics_handler,
    course_certificate_handler, course_detail_handler, course_lessons_handler,
    course_progress_handler, create_course_handler, create_lesson_handler,
    delete_course_handler, delete_lesson_handler, enroll_handler, health_handler,
    instructor_overview_handler, issue_certificate_handler, lesson_handler,
    list_certificates_handler, list_courses_handler, list_progress_handler,
    list_ratings_handler, quick_progress_handler, quiz_results_handler, rate_course_handler,
    students_progress_handler, submit_quiz_handler, update_course_handler,
    update_lesson_handler, update_lesson_progress_handler, verify_certificate_handler,
};

/// Where the server listens and which database it opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub db_url: String,
    pub bind: String,
    pub port: u16,
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServerError {
    #[error(transparent)]
    Services(#[from] AppServicesError),

    #[error("failed to bind {address}: {source}")]
    Bind { address: String, source: io::Error },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// All routes, wired to `services`.
pub fn router(services: AppServices) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static(USER_HEADER),
        ])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/health", get(health_handler))
        .route("/progress", get(list_progress_handler))
        .route("/progress/courses/:course_id", get(course_progress_handler))
        .route(
            "/progress/courses/:course_id/quick",
            get(quick_progress_handler),
        )
        .route(
            "/progress/courses/:course_id/lessons/:lesson_id",
            post(update_lesson_progress_handler),
        )
        .route(
            "/courses",
            get(list_courses_handler).post(create_course_handler),
        )
        .route(
            "/courses/:course_id",
            get(course_detail_handler)
                .put(update_course_handler)
                .delete(delete_course_handler),
        )
        .route(
            "/lessons/course/:course_id",
            get(course_lessons_handler).post(create_lesson_handler),
        )
        .route(
            "/lessons/:lesson_id",
            get(lesson_handler)
                .put(update_lesson_handler)
                .delete(delete_lesson_handler),
        )
        .route("/lessons/:lesson_id/complete", post(complete_lesson_handler))
        .route("/quiz/:lesson_id/submit", post(submit_quiz_handler))
        .route("/quiz/:lesson_id/results", get(quiz_results_handler))
        .route("/quiz/:lesson_id/best", get(best_quiz_result_handler))
        .route(
            "/certificates",
            get(list_certificates_handler).post(issue_certificate_handler),
        )
        .route(
            "/certificates/course/:course_id",
            get(course_certificate_handler),
        )
        .route("/certificates/:id/verify", get(verify_certificate_handler))
        .route("/courses/:course_id/enroll", post(enroll_handler))
        .route(
            "/courses/:course_id/ratings",
            get(list_ratings_handler).post(rate_course_handler),
        )
        .route("/analytics/overview", get(instructor_overview_handler))
        .route(
            "/analytics/course/:course_id",
            get(course_analytics_handler),
        )
        .route(
            "/analytics/students/progress",
            get(students_progress_handler),
        )
        .layer(cors)
        .with_state(services)
}

/// Open the database, then serve until Ctrl+C or SIGTERM.
///
/// # Errors
///
/// Returns `ServerError` if the database cannot be opened or the address
/// cannot be bound.
pub async fn serve(config: ServerConfig, clock: Clock) -> Result<(), ServerError> {
    info!(db = %config.db_url, "opening database");
    let services = AppServices::new_sqlite(&config.db_url, clock).await?;

    let address = config.address();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| ServerError::Bind {
            address: address.clone(),
            source,
        })?;
    info!("listening on {address}");

    axum::serve(listener, router(services))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("received Ctrl+C, shutting down"),
            Err(err) => {
                error!(error = %err, "failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(err) => {
                error!(error = %err, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
