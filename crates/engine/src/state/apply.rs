// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Tether Contributors

//! Per-kind change handlers.
//!
//! `apply` dispatches a [`StateChange`] to the handler for its kind and
//! mutates the candidate state in place. Handlers are pure with respect
//! to everything but the passed state; version bump, checksum and
//! notification happen in the manager's commit path.
//!
//! Operation vocabulary:
//! - `file`: `created`, `modified`, `deleted`
//! - `dependency`: `added`, `updated`, `removed`
//! - `git`: `updated`, `conflict`
//! - `build`: `started`, `completed`, `failed`
//! - `server`: `started`, `stopped`, `error`, `stats`

use std::str::FromStr;

use serde_json::Value;

use tether_core::{
    BuildStatus, ChangeKind, DependencyKind, DependencyState, Error, FileState, GitStatus,
    ProjectState, Result, ServerStatus, StateChange,
};

/// Applies a change to the candidate state.
///
/// Returns an error for unknown operations, leaving the state in an
/// undefined partial form; callers must work on a throwaway clone.
pub fn apply(state: &mut ProjectState, change: &StateChange) -> Result<()> {
    match change.kind {
        ChangeKind::File => apply_file(state, change),
        ChangeKind::Dependency => apply_dependency(state, change),
        ChangeKind::Git => apply_git(state, change),
        ChangeKind::Build => apply_build(state, change),
        ChangeKind::Server => apply_server(state, change),
    }
}

fn unknown(change: &StateChange) -> Error {
    Error::UnknownOperation {
        kind: change.kind.as_str().to_string(),
        op: change.op.clone(),
    }
}

fn apply_file(state: &mut ProjectState, change: &StateChange) -> Result<()> {
    match change.op.as_str() {
        "created" | "modified" => {
            let meta = &change.metadata;
            let existing = state.files.get(&change.target);
            let entry = FileState {
                size: get_u64(meta, "size").unwrap_or_else(|| {
                    existing.map(|f| f.size).unwrap_or(0)
                }),
                modified: get_time(meta, "modified").unwrap_or(change.timestamp),
                hash: get_str(meta, "hash")
                    .map(str::to_string)
                    .or_else(|| existing.and_then(|f| f.hash.clone())),
                tracked: get_bool(meta, "tracked")
                    .unwrap_or_else(|| existing.map(|f| f.tracked).unwrap_or(true)),
                last_scan: change.timestamp,
            };
            state.files.insert(change.target.clone(), entry);
            Ok(())
        }
        "deleted" => {
            // Deleting an untracked path is a no-op, not an error.
            state.files.remove(&change.target);
            Ok(())
        }
        _ => Err(unknown(change)),
    }
}

fn apply_dependency(state: &mut ProjectState, change: &StateChange) -> Result<()> {
    match change.op.as_str() {
        "added" | "updated" => {
            let meta = &change.metadata;
            let existing = state.dependencies.get(&change.target);
            let kind = match get_str(meta, "kind") {
                Some(s) => parse_dependency_kind(s)?,
                None => existing.map(|d| d.kind).unwrap_or(DependencyKind::Runtime),
            };
            let entry = DependencyState {
                version: get_str(meta, "version")
                    .map(str::to_string)
                    .or_else(|| existing.map(|d| d.version.clone()))
                    .unwrap_or_default(),
                kind,
                installed: get_bool(meta, "installed")
                    .unwrap_or_else(|| existing.map(|d| d.installed).unwrap_or(false)),
                vulnerabilities: get_u64(meta, "vulnerabilities")
                    .map(|v| v as u32)
                    .unwrap_or_else(|| existing.map(|d| d.vulnerabilities).unwrap_or(0)),
            };
            state.dependencies.insert(change.target.clone(), entry);
            Ok(())
        }
        "removed" => {
            state.dependencies.remove(&change.target);
            Ok(())
        }
        _ => Err(unknown(change)),
    }
}

fn apply_git(state: &mut ProjectState, change: &StateChange) -> Result<()> {
    match change.op.as_str() {
        "updated" => {
            let meta = &change.metadata;
            let git = &mut state.git;
            if let Some(branch) = get_str(meta, "branch") {
                git.branch = branch.to_string();
            }
            if let Some(commit) = get_str(meta, "commit") {
                git.commit = commit.to_string();
            }
            if let Some(status) = get_str(meta, "status") {
                git.status = GitStatus::from_str(status)?;
            }
            if let Some(staged) = get_str_list(meta, "staged") {
                git.staged = staged;
            }
            if let Some(unstaged) = get_str_list(meta, "unstaged") {
                git.unstaged = unstaged;
            }
            if let Some(untracked) = get_str_list(meta, "untracked") {
                git.untracked = untracked;
            }
            if let Some(ahead) = get_u64(meta, "ahead") {
                git.ahead = ahead as u32;
            }
            if let Some(behind) = get_u64(meta, "behind") {
                git.behind = behind as u32;
            }
            Ok(())
        }
        "conflict" => {
            state.git.status = GitStatus::Conflict;
            Ok(())
        }
        _ => Err(unknown(change)),
    }
}

fn apply_build(state: &mut ProjectState, change: &StateChange) -> Result<()> {
    let meta = &change.metadata;
    let build = &mut state.build;
    match change.op.as_str() {
        "started" => {
            build.status = BuildStatus::Building;
            build.started = Some(change.timestamp);
            build.finished = None;
            build.errors.clear();
            build.warnings.clear();
            build.artifacts.clear();
            Ok(())
        }
        "completed" => {
            build.status = BuildStatus::Success;
            build.finished = Some(change.timestamp);
            if let Some(warnings) = get_str_list(meta, "warnings") {
                build.warnings = warnings;
            }
            if let Some(artifacts) = get_str_list(meta, "artifacts") {
                build.artifacts = artifacts;
            }
            Ok(())
        }
        "failed" => {
            build.status = BuildStatus::Failed;
            build.finished = Some(change.timestamp);
            if let Some(errors) = get_str_list(meta, "errors") {
                build.errors = errors;
            }
            if let Some(warnings) = get_str_list(meta, "warnings") {
                build.warnings = warnings;
            }
            Ok(())
        }
        _ => Err(unknown(change)),
    }
}

fn apply_server(state: &mut ProjectState, change: &StateChange) -> Result<()> {
    let meta = &change.metadata;
    let server = &mut state.server;
    match change.op.as_str() {
        "started" => {
            server.status = ServerStatus::Running;
            server.pid = get_u64(meta, "pid").map(|p| p as u32);
            server.started_at = Some(change.timestamp);
            server.uptime_secs = 0;
            Ok(())
        }
        "stopped" => {
            server.status = ServerStatus::Stopped;
            server.pid = None;
            server.started_at = None;
            server.uptime_secs = 0;
            Ok(())
        }
        "error" => {
            server.status = ServerStatus::Error;
            server.errors += 1;
            Ok(())
        }
        "stats" => {
            if let Some(uptime) = get_u64(meta, "uptime_secs") {
                server.uptime_secs = uptime;
            }
            if let Some(requests) = get_u64(meta, "requests") {
                server.requests = requests;
            }
            if let Some(errors) = get_u64(meta, "errors") {
                server.errors = errors;
            }
            Ok(())
        }
        _ => Err(unknown(change)),
    }
}

fn parse_dependency_kind(s: &str) -> Result<DependencyKind> {
    match s {
        "runtime" => Ok(DependencyKind::Runtime),
        "dev" => Ok(DependencyKind::Dev),
        "build" => Ok(DependencyKind::Build),
        _ => Err(Error::Validation(format!("invalid dependency kind: '{s}'"))),
    }
}

fn get_str<'a>(meta: &'a Value, key: &str) -> Option<&'a str> {
    meta.get(key).and_then(Value::as_str)
}

fn get_u64(meta: &Value, key: &str) -> Option<u64> {
    meta.get(key).and_then(Value::as_u64)
}

fn get_bool(meta: &Value, key: &str) -> Option<bool> {
    meta.get(key).and_then(Value::as_bool)
}

fn get_time(meta: &Value, key: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    meta.get(key)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

fn get_str_list(meta: &Value, key: &str) -> Option<Vec<String>> {
    meta.get(key).and_then(Value::as_array).map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    })
}

#[cfg(test)]
#[path = "apply_tests.rs"]
mod apply_tests;
