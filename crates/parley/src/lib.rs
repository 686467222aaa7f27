// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parley service wiring: the `serve` and `publish` commands and the
//! [`App`](app::App) assembly they share.

pub mod app;
pub mod publish;
pub mod serve;
pub mod shutdown;
