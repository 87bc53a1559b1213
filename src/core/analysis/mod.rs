// SPDX-License-Identifier: MIT OR Apache-2.0

//! Driving analysis runs and holding what they produce.

pub mod results;
pub mod session;

pub use results::{AnalysisOutput, AnalysisResults};
pub use session::AnalysisSession;
