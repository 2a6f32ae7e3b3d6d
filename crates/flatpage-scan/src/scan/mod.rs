// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanning pipeline — locator/rectifier orchestration and post-rectification
// enhancement.

pub mod enhance;
pub mod pipeline;

pub use enhance::ScanEnhancer;
pub use pipeline::{DocumentPipeline, Outcome, PipelineOutput};
