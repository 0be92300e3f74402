// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Tether Contributors

//! State layer: change application, the manager actor and persistence.

pub mod apply;
pub mod manager;
pub mod persist;

pub use manager::{StateHandle, StateManager, StateMetrics};
pub use persist::{load, save, StateDocument};
