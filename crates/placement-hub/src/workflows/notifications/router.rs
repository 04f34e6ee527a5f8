use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures_util::stream;
use serde::Deserialize;
use serde_json::json;

use super::{NotificationBus, Recipient};

#[derive(Debug, Deserialize)]
pub(crate) struct StreamQuery {
    recipient: String,
}

/// Router exposing the live notification stream.
pub fn notification_router(bus: Arc<NotificationBus>) -> Router {
    Router::new()
        .route("/api/notifications/stream", get(stream_handler))
        .with_state(bus)
}

pub(crate) async fn stream_handler(
    State(bus): State<Arc<NotificationBus>>,
    Query(query): Query<StreamQuery>,
) -> Response {
    let Some(recipient) = Recipient::parse(&query.recipient) else {
        let payload = json!({ "error": format!("unknown recipient '{}'", query.recipient) });
        return (StatusCode::BAD_REQUEST, Json(payload)).into_response();
    };

    let subscription = match bus.subscribe(&recipient) {
        Ok(subscription) => subscription,
        Err(err) => {
            let payload = json!({ "error": err.to_string() });
            return (StatusCode::SERVICE_UNAVAILABLE, Json(payload)).into_response();
        }
    };

    let events = stream::unfold(subscription, |mut subscription| async move {
        let notification = subscription.recv().await?;
        let event = Event::default()
            .event("notification")
            .json_data(&notification)
            .unwrap_or_else(|_| Event::default().comment("unserializable notification"));
        Some((Ok::<_, Infallible>(event), subscription))
    });

    Sse::new(events)
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("ping"))
        .into_response()
}
