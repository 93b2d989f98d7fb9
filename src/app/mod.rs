//! Process-wide plumbing shared by the loop and the binary.

pub(crate) mod logging;
