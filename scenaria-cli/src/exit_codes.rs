/// Exit codes for CI/automation.
pub const SUCCESS: i32 = 0;
pub const TEST_FAILED: i32 = 1;
/// The config or a scenario file is invalid; nothing ran.
pub const CONFIG_ERROR: i32 = 2;
pub const RUNTIME_ERROR: i32 = 4;
