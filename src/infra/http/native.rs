use axum::{
    Extension, Router,
    extract::{Query, State, rejection::QueryRejection},
    http::{StatusCode, Uri},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::error;

use crate::{
    application::{
        error::{HttpError, NativeRenderError},
        native::NativeRenderer,
        request::{NativeRenderQuery, RenderRequest},
        response::RenderResponse,
    },
    domain::error::DomainError,
};

use super::middleware::{RequestContext, log_responses, set_request_context};

const SOURCE: &str = "infra::http::native";

/// Route a renderer is mounted on, e.g. `/smart/checkout/venmo/popup`.
fn route_path(renderer: &NativeRenderer) -> String {
    format!(
        "/smart/checkout/{}/{}",
        renderer.funding_source().route_segment(),
        renderer.mode().as_str()
    )
}

pub fn build_router(renderers: impl IntoIterator<Item = NativeRenderer>) -> Router {
    let mut router = Router::new().route("/_health", get(health));
    for renderer in renderers {
        let path = route_path(&renderer);
        router = router.merge(
            Router::new()
                .route(&path, get(render_native))
                .with_state(renderer),
        );
    }

    router
        .fallback(not_found)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn render_native(
    State(renderer): State<NativeRenderer>,
    context: Option<Extension<RequestContext>>,
    query: Result<Query<NativeRenderQuery>, QueryRejection>,
) -> Response {
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            let err = NativeRenderError::Validation(DomainError::invalid_parameter(
                "query",
                rejection.body_text(),
            ));
            return RenderResponse::from_error(&err).into_response();
        }
    };

    let mut request = RenderRequest::new(query);
    if let Some(Extension(ctx)) = context {
        request = request.with_request_id(ctx.request_id);
    }

    // Detached so a client disconnect cannot cancel the render mid-flight.
    let task = tokio::spawn(async move { renderer.handle(request).await });
    match task.await {
        Ok(response) => response.into_response(),
        Err(join_error) => {
            error!(
                target = SOURCE,
                error = %join_error,
                "native render task aborted"
            );
            let err = NativeRenderError::Aborted(join_error.to_string());
            RenderResponse::from_error(&err).into_response()
        }
    }
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn not_found(uri: Uri) -> HttpError {
    HttpError::new(
        SOURCE,
        StatusCode::NOT_FOUND,
        "Not found",
        format!("no route for {}", uri.path()),
    )
}
