// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod args;
mod status;
mod wait;

pub use args::{Args, BundleArgs, Command, OutputFormat};
pub use status::run_status;
pub use wait::{WaitOptions, run_wait};
