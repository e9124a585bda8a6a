use crate::state::{Action, RelayState};
use crate::upload;
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Query, Request, State},
    http::{header, Method},
    response::{Html, IntoResponse, Response},
    Router,
};
use std::any::Any;
use std::collections::HashMap;
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn};

pub const LAST_COMMAND_PATH: &str = "/lastCommand";
pub const UPLOAD_IMAGE_PATH: &str = "/uploadImage";
pub const LAST_IMAGE_PATH: &str = "/lastImage";

const UPLOAD_IMAGE_FORM: &str = "<form action=\"/uploadImage\" method=\"post\" enctype=\"multipart/form-data\">\n    \
    Select image to upload:\n    \
    <input type=\"file\" name=\"imageFile\" id=\"imageFile\">\n    \
    <input type=\"submit\" value=\"Upload Image\" name=\"submit\">\n\
    </form>";

const NO_IMAGE: &str = "no image to send!";

// The uploaded image is served with the same marker the upload form uses.
const IMAGE_CONTENT_TYPE: &str = "text/html";

pub fn router(state: RelayState, max_upload_bytes: usize) -> Router {
    // The rules are ordered (a command update wins over every method branch),
    // so all requests go through one handler instead of per-path routes.
    Router::new()
        .fallback(dispatch)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CatchPanicLayer::custom(panic_response))
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
}

async fn dispatch(State(state): State<RelayState>, request: Request) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let params = Query::<HashMap<String, String>>::try_from_uri(request.uri())
        .map(|Query(params)| params)
        .unwrap_or_default();

    if path == LAST_COMMAND_PATH {
        if let (Some(cmd), Some(action)) = (params.get("cmd"), params.get("action")) {
            return set_command(&state, cmd, action).into_response();
        }
    }

    if method == Method::POST {
        if path == UPLOAD_IMAGE_PATH {
            return upload_image(&state, request).await.into_response();
        }
        return format!("path {} not supported for POST.", path).into_response();
    }

    if method == Method::GET {
        return match path.as_str() {
            LAST_IMAGE_PATH => last_image(&state),
            LAST_COMMAND_PATH => state.command_snapshot().to_string().into_response(),
            _ => Html(UPLOAD_IMAGE_FORM).into_response(),
        };
    }

    format!("method {} not supported.", method).into_response()
}

fn set_command(state: &RelayState, cmd: &str, action: &str) -> String {
    match Action::parse(action) {
        Some(action) => {
            state.update_command(cmd, action);
            info!(command = cmd, action = action.as_str(), "Updated last command");
            format!("set last command: {}", cmd)
        }
        None => {
            debug!(command = cmd, action, "Ignored command with unknown action");
            format!("command {} is not one of down/up!", action.to_lowercase())
        }
    }
}

async fn upload_image(state: &RelayState, request: Request) -> String {
    match upload::read_image_field(request).await {
        Ok(image) => {
            let size = image.len();
            state.update_image(image);
            info!(size, "Stored uploaded image");
            format!("uploaded image. size: {}", size)
        }
        Err(e) => {
            warn!(error = %e, "Image upload failed");
            format!("error uploading image: {}", e)
        }
    }
}

fn last_image(state: &RelayState) -> Response {
    let image = state.image_snapshot();
    if image.is_empty() {
        return NO_IMAGE.into_response();
    }

    let len = image.len();
    (
        [
            (header::CONTENT_TYPE, IMAGE_CONTENT_TYPE.to_string()),
            (header::CONTENT_LENGTH, len.to_string()),
        ],
        Body::from(image),
    )
        .into_response()
}

// Failures are reported in the body, never through the status code.
fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    error!(detail = %detail, "Request handler panicked");
    format!("internal error: {}", detail).into_response()
}
