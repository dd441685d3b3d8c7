/// Exit codes as defined in README.md.
pub mod exit {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = 1;
    pub const INVALID_INPUT: i32 = 2;
}
