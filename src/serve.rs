//! HTTP search mode: the URL path suffix is the pattern, each match is
//! rendered through a user-supplied template. An empty pattern returns
//! the active configuration as JSON.

use crate::db::DB;
use crate::fsutil::final_component;
use crate::search::locate_all;
use crate::search::matcher::Method;
use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use log::info;
use serde::Serialize;
use std::sync::Arc;

/// Default per-match template. `{n}` is the 1-based rank, `{path}` the
/// full path and `{base}` its final component.
pub const DEFAULT_TEMPLATE: &str = "{n}. <a href=\"file://{path}\">{base}</a><br>";

/// Everything a request handler needs.
pub struct ServeState {
    pub db: DB,
    pub methods: Vec<Method>,
    pub template: String,
}

#[derive(Serialize)]
struct ConfigDump {
    databases: Vec<String>,
    methods: Vec<String>,
    options: crate::options::Options,
    template: String,
}

/// Bind `addr` and serve until interrupted.
pub fn serve(state: ServeState, addr: &str) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;
    runtime.block_on(run(state, addr))
}

async fn run(state: ServeState, addr: &str) -> Result<()> {
    let app = Router::new()
        .fallback(get(handler))
        .with_state(Arc::new(state));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("serving on http://{}", addr);
    axum::serve(listener, app).await.context("serving")?;
    Ok(())
}

async fn handler(State(state): State<Arc<ServeState>>, uri: Uri) -> Response {
    let pattern = uri.path().trim_start_matches('/').to_string();

    if pattern.is_empty() {
        let dump = ConfigDump {
            databases: state
                .db
                .db_filenames()
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
            methods: state.methods.iter().map(|m| m.to_string()).collect(),
            options: state.db.options().clone(),
            template: state.template.clone(),
        };
        return Json(dump).into_response();
    }

    // The search fans out onto its own worker threads; keep the async
    // executor out of that by running it on the blocking pool.
    let search_state = Arc::clone(&state);
    let result = tokio::task::spawn_blocking(move || {
        locate_all(&search_state.db, &search_state.methods, &pattern)
    })
    .await;

    match result {
        Ok(Ok(mut matches)) => {
            matches.sort();
            let mut body = String::new();
            for (i, path) in matches.iter().enumerate() {
                body.push_str(&render(&state.template, i + 1, path));
                body.push('\n');
            }
            Html(body).into_response()
        }
        Ok(Err(e)) => (StatusCode::BAD_REQUEST, format!("{:#}", e)).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

fn render(template: &str, rank: usize, path: &str) -> String {
    template
        .replace("{n}", &rank.to_string())
        .replace("{path}", path)
        .replace("{base}", final_component(path))
}
