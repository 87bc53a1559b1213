// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod analysis;
pub mod config;
pub mod error;
pub mod log;
pub mod projection;
pub mod recognition;
pub mod script;
