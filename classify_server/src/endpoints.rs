//! Endpoints of HTTP server.
//!
use std::{convert::Infallible, sync::Arc};

use axum::{
    body::StreamBody,
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        Html, IntoResponse,
    },
    routing::{get, post},
    Extension, Json, Router,
};
use futures::{future, Stream, StreamExt};
use tokio_stream::wrappers::{BroadcastStream, WatchStream};

use crate::session::{Session, StartOutcome};

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Build the router serving the page and its streams.
pub fn router(session: Arc<Session>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthcheck", get(healthcheck))
        .route("/start", post(start))
        .route("/status", get(status))
        .route("/stream", get(video_stream))
        .route("/labels", get(label_events))
        .layer(Extension(session))
}

/// The page.
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Health check endpoint.
pub async fn healthcheck() -> &'static str {
    "healthy"
}

/// The start control. Answers with the status after the initializer finished.
pub async fn start(Extension(session): Extension<Arc<Session>>) -> impl IntoResponse {
    let code = match session.start().await {
        Ok(StartOutcome::Running { .. }) => StatusCode::OK,
        Ok(StartOutcome::Busy) => StatusCode::CONFLICT,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (code, Json(session.status()))
}

pub async fn status(Extension(session): Extension<Arc<Session>>) -> impl IntoResponse {
    Json(session.status())
}

/// Painted webcam frames as multipart JPEG stream.
pub async fn video_stream(Extension(session): Extension<Arc<Session>>) -> impl IntoResponse {
    log::info!("Video stream requested");

    let rx = session.publisher().subscribe_frames();

    // Lagging viewers skip frames instead of ending the stream
    let stream = BroadcastStream::from(rx)
        .filter_map(|x| future::ready(x.ok().map(Ok::<_, Infallible>)));

    // Set body and headers for multipart streaming
    let body = StreamBody::new(stream);
    let headers = [(
        header::CONTENT_TYPE,
        "multipart/x-mixed-replace; boundary=frame",
    )];

    (headers, body)
}

/// Label rows as server-sent events, one JSON array per frame.
pub async fn label_events(
    Extension(session): Extension<Arc<Session>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    log::info!("Label events requested");

    let rows = session.publisher().subscribe_rows();
    let stream = WatchStream::new(rows).map(|rows| Event::default().json_data(rows).map_err(axum::Error::new));

    Sse::new(stream).keep_alive(KeepAlive::default())
}
