//! Exit codes for `assent`. Scripts branch on these, so they are stable.

pub const SUCCESS: i32 = 0;
pub const NOTICE_SHOWN: i32 = 1; // load/evaluate decided the notice must be shown
pub const CONFIG_ERROR: i32 = 2; // bad config, unusable state dir, or output failure
