// Test modules for renewable-proxy crate
//
// Test organization follows the template pattern where each source file
// has a corresponding test file that focuses on business logic verification.

// Test helper utilities (scripted downstream targets, response builders)
pub mod helpers;

pub mod retry;
