// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod auth;
pub mod command;
pub mod config;
pub mod error;
pub mod http;

#[cfg(test)]
pub mod test_support;
