//! Liveness and readiness probes.
//!
//! `/healthz` answers whenever the process is serving requests. `/readyz`
//! also exercises what a real request needs: one SQLite round trip and one
//! scratch write under the media root.

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::fmt::Display;

/// `GET /healthz`: no I/O, fixed body.
pub async fn healthz() -> impl IntoResponse {
    Json(Liveness { status: "ok" })
}

/// `GET /readyz`: 200 with per-check detail when SQLite and the media
/// volume both respond, 503 otherwise.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let sqlite = check(
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*state.db)
            .await
            .map(|_| ()),
    );
    let disk = check(state.media.probe_disk().await);

    let ready = sqlite.ok && disk.ok;
    let report = Readiness {
        status: if ready { "ok" } else { "error" },
        checks: Checks { sqlite, disk },
    };
    let code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(report))
}

fn check<E: Display>(outcome: Result<(), E>) -> Probe {
    match outcome {
        Ok(()) => Probe {
            ok: true,
            error: None,
        },
        Err(err) => Probe {
            ok: false,
            error: Some(err.to_string()),
        },
    }
}

#[derive(Serialize)]
struct Liveness {
    status: &'static str,
}

#[derive(Serialize)]
struct Readiness {
    status: &'static str,
    checks: Checks,
}

#[derive(Serialize)]
struct Checks {
    sqlite: Probe,
    disk: Probe,
}

#[derive(Serialize)]
struct Probe {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}
