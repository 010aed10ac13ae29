/// Router Module Index
///
/// Public reads and UI pings live apart from the admin actions so the admin
/// surface can be nested under one prefix.

/// Read-only board content, activity pings and session state.
pub mod public;

/// Sign-in, sign-out and publishing. Each handler goes through the admin gate.
pub mod admin;
