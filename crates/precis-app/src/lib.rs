// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod form;
pub mod pipeline;
pub mod state;

pub use form::*;
pub use pipeline::*;
pub use state::*;
