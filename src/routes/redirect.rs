use axum::{
    extract::{Path, State},
    http::{HeaderMap, header},
    response::Redirect,
};
use tracing::{info, instrument, warn};

use crate::{errors::ApiError, startup::AppState};

/// GET /{key}. Resolves a short link under the domain named by the Host
/// header and bounces the visitor to its destination.
#[instrument(name = "HTTP: Redirect request", skip(state, headers))]
pub async fn redirect(
    Path(key): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Redirect, ApiError> {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::LinkNotFound)?;
    let domain = host.split(':').next().unwrap_or(host);

    if let Some(url) = state.link_service.resolve(domain, &key).await {
        info!(%domain, %key, "Redirecting to {}", url);
        return Ok(Redirect::temporary(&url));
    }

    warn!(%domain, %key, "Short link not found");
    Err(ApiError::LinkNotFound)
}
