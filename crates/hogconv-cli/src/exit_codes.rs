//! Process exit codes. Scripts driving `hogconv` rely on these.

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_SKIPPED: i32 = 1; // Batch finished but some submissions produced no matrix
pub const EXIT_CONFIG_ERROR: i32 = 2; // Bad config, unusable session, internal failure
