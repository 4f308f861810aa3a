//! Shared fixtures for router tests: a scripted OpenClaw runner and request
//! helpers.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use dashmap::DashMap;
use mission_control::openclaw::{
    CommandOutput, CommandRunner, CommandSpec, DatasetSettings, InvokeError,
};
use mission_control::state::AppState;
use mission_control::web::create_router;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tower::ServiceExt;

/// Returns canned output per joined argv and counts invocations.
#[derive(Default)]
pub struct ScriptedRunner {
    responses: DashMap<String, Result<CommandOutput, InvokeError>>,
    calls: DashMap<String, Arc<AtomicUsize>>,
}

impl ScriptedRunner {
    pub fn respond(&self, args: &str, stdout: &str) {
        self.respond_with_exit(args, stdout, 0);
    }

    pub fn respond_with_exit(&self, args: &str, stdout: &str, exit_code: i32) {
        self.responses.insert(
            args.to_owned(),
            Ok(CommandOutput {
                stdout: stdout.to_owned(),
                stderr: if exit_code == 0 {
                    String::new()
                } else {
                    "gateway not reachable".to_owned()
                },
                exit_code: Some(exit_code),
            }),
        );
    }

    pub fn fail(&self, args: &str, error: InvokeError) {
        self.responses.insert(args.to_owned(), Err(error));
    }

    pub fn calls(&self, args: &str) -> usize {
        self.calls
            .get(args)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, InvokeError> {
        let args = spec.display();
        self.calls
            .entry(args.clone())
            .or_default()
            .fetch_add(1, Ordering::SeqCst);
        match self.responses.get(&args) {
            Some(response) => response.clone(),
            None => Err(InvokeError::Spawn {
                program: "openclaw".to_owned(),
                message: format!("no scripted response for `{args}`"),
            }),
        }
    }
}

pub fn setup() -> (Arc<ScriptedRunner>, AppState, Router) {
    let runner = Arc::new(ScriptedRunner::default());
    let state = AppState::new(runner.clone(), &DatasetSettings::default());
    let router = create_router(state.clone());
    (runner, state, router)
}

pub async fn send(router: &Router, method: Method, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    router.clone().oneshot(request).await.unwrap()
}

pub async fn json_body(response: Response<Body>) -> (StatusCode, serde_json::Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

pub async fn get_json(router: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    json_body(send(router, Method::GET, uri).await).await
}

pub async fn post_json(router: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    json_body(send(router, Method::POST, uri).await).await
}
