//! Configuration state cache
//!
//! Holds the last-known configuration state of each robot. Reads never touch
//! the network; `refresh` always asks the controller. Callers decide how
//! stale an entry may get.
//!
//! # Ordering
//!
//! Entries only move forward in time: an update whose `observed_at` is older
//! than the cached one is dropped and logged. Refreshes of the same robot are
//! serialized through a per-robot slot, and callers that queued behind a
//! refresh which then succeeded share its result instead of issuing another
//! request.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use wsc_core::error::CacheError;
use wsc_core::time;
use wsc_core::traits::Method;
use wsc_core::types::RobotId;

use crate::controller::{CallOptions, ControllerClient};

/// Snapshot of a robot's configuration as reported by the controller
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationState {
    /// Robot the state belongs to
    pub robot_id: RobotId,
    /// Controller-defined state (joint values, layout data...)
    pub payload: Value,
    /// Unix milliseconds at which the controller observed the state
    pub observed_at: u64,
    /// Controller-side revision, when reported
    pub source_version: Option<String>,
}

/// Wire shape of a configuration state response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StateDocument {
    payload: Value,
    #[serde(default)]
    observed_at: Option<u64>,
    #[serde(default)]
    source_version: Option<String>,
}

impl ConfigurationState {
    /// Create a state snapshot
    pub fn new(robot_id: impl Into<RobotId>, payload: Value, observed_at: u64) -> Self {
        Self {
            robot_id: robot_id.into(),
            payload,
            observed_at,
            source_version: None,
        }
    }

    /// Attach the controller revision
    pub fn with_source_version(mut self, version: impl Into<String>) -> Self {
        self.source_version = Some(version.into());
        self
    }

    /// How long ago the controller observed this state
    pub fn age(&self) -> Duration {
        time::age(self.observed_at)
    }

    /// Decode a controller response.
    ///
    /// Responses without `observedAt` are stamped with the local receive time.
    pub(crate) fn from_response(robot_id: &RobotId, body: Value) -> Result<Self, CacheError> {
        let document: StateDocument =
            serde_json::from_value(body).map_err(|e| CacheError::Malformed {
                robot_id: robot_id.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            robot_id: robot_id.clone(),
            payload: document.payload,
            observed_at: document
                .observed_at
                .unwrap_or_else(time::current_time_millis),
            source_version: document.source_version,
        })
    }
}

/// Result of applying a state to the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The state replaced (or created) the entry
    Applied,
    /// The cached entry is newer; the state was dropped
    Stale { cached_at: u64, rejected_at: u64 },
}

/// Per-robot refresh serialization
#[derive(Default)]
struct RefreshSlot {
    lock: tokio::sync::Mutex<()>,
    /// Number of successful refreshes, used to detect a refresh that
    /// completed while a caller was queued
    completed: AtomicU64,
    /// Bumped by every reset of the robot's entry
    reset_epoch: AtomicU64,
    /// Reset epoch in which the last completed refresh started
    completed_epoch: AtomicU64,
}

/// In-memory store of robot configuration states
pub struct ConfigurationStateCache {
    controller: ControllerClient,
    entries: DashMap<RobotId, ConfigurationState>,
    refresh_slots: DashMap<RobotId, Arc<RefreshSlot>>,
}

impl ConfigurationStateCache {
    /// Create an empty cache that refreshes through `controller`
    pub fn new(controller: ControllerClient) -> Self {
        Self {
            controller,
            entries: DashMap::new(),
            refresh_slots: DashMap::new(),
        }
    }

    /// Cached state for a robot, without any network call
    pub fn get(&self, robot_id: &RobotId) -> Option<ConfigurationState> {
        self.entries.get(robot_id).map(|entry| entry.value().clone())
    }

    /// Fetch the robot's current state from the controller and cache it.
    ///
    /// Returns the entry cached afterwards, which is the newer one when the
    /// response turned out to be stale. On failure the cache is untouched.
    ///
    /// A queued caller only shares a refresh that started after the robot's
    /// last `reset`. A refresh overtaken by a `reset` returns its response to
    /// its own caller without caching it.
    pub async fn refresh(&self, robot_id: &RobotId) -> Result<ConfigurationState, CacheError> {
        let slot = self.slot(robot_id);
        let seen = slot.completed.load(Ordering::Acquire);
        let _guard = slot.lock.lock().await;

        let epoch = slot.reset_epoch.load(Ordering::Acquire);
        if slot.completed.load(Ordering::Acquire) != seen
            && slot.completed_epoch.load(Ordering::Acquire) == epoch
        {
            if let Some(state) = self.get(robot_id) {
                tracing::debug!(robot_id = %robot_id, "Joined in-flight configuration refresh");
                return Ok(state);
            }
        }

        let state = self.fetch(robot_id).await?;
        let outcome = self.apply(state.clone(), || {
            slot.reset_epoch.load(Ordering::Acquire) == epoch
        });
        slot.completed_epoch.store(epoch, Ordering::Release);
        slot.completed.fetch_add(1, Ordering::Release);

        match outcome {
            Some(UpdateOutcome::Applied) => Ok(state),
            Some(UpdateOutcome::Stale { .. }) => Ok(self.get(robot_id).unwrap_or(state)),
            None => {
                tracing::debug!(robot_id = %robot_id, "Configuration state reset during refresh, not cached");
                Ok(state)
            }
        }
    }

    /// Drop the cached entry for a robot. The controller is not notified.
    ///
    /// Returns whether an entry was present.
    pub fn reset(&self, robot_id: &RobotId) -> bool {
        self.slot(robot_id).reset_epoch.fetch_add(1, Ordering::AcqRel);
        let removed = self.entries.remove(robot_id).is_some();
        tracing::debug!(robot_id = %robot_id, removed, "Reset cached configuration state");
        removed
    }

    /// Drop every cached entry
    pub fn clear(&self) {
        for slot in self.refresh_slots.iter() {
            slot.value().reset_epoch.fetch_add(1, Ordering::AcqRel);
        }
        self.entries.clear();
    }

    /// Robots with a cached entry
    pub fn robots(&self) -> Vec<RobotId> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply a state, keeping `observed_at` non-decreasing per robot
    #[cfg(test)]
    pub(crate) fn update(&self, state: ConfigurationState) -> UpdateOutcome {
        self.apply(state, || true).unwrap_or(UpdateOutcome::Applied)
    }

    /// Apply a state, keeping `observed_at` non-decreasing per robot, unless
    /// `still_current` fails under the entry lock.
    ///
    /// `reset` bumps the epoch before removing the entry, so a check made
    /// while holding the entry sees any reset that could remove it.
    fn apply(&self, state: ConfigurationState, still_current: impl Fn() -> bool) -> Option<UpdateOutcome> {
        let entry = self.entries.entry(state.robot_id.clone());
        if !still_current() {
            return None;
        }
        match entry {
            Entry::Occupied(mut cached) => {
                let cached_at = cached.get().observed_at;
                if state.observed_at < cached_at {
                    tracing::warn!(
                        robot_id = %state.robot_id,
                        cached_at,
                        rejected_at = state.observed_at,
                        "Dropping out-of-order configuration state"
                    );
                    return Some(UpdateOutcome::Stale {
                        cached_at,
                        rejected_at: state.observed_at,
                    });
                }
                cached.insert(state);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(state);
            }
        }
        Some(UpdateOutcome::Applied)
    }

    async fn fetch(&self, robot_id: &RobotId) -> Result<ConfigurationState, CacheError> {
        let path = self.controller.endpoints().configuration_state_path(robot_id);
        tracing::debug!(robot_id = %robot_id, "Requesting configuration state");

        let body = self
            .controller
            .call(Method::Get, &path, None, CallOptions::idempotent())
            .await
            .map_err(|source| CacheError::Transport {
                robot_id: robot_id.clone(),
                source,
            })?;

        ConfigurationState::from_response(robot_id, body)
    }

    fn slot(&self, robot_id: &RobotId) -> Arc<RefreshSlot> {
        Arc::clone(&*self.refresh_slots.entry(robot_id.clone()).or_default())
    }
}
