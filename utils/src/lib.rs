//! This module implements features common to several commands.

pub mod util;
