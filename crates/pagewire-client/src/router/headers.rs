//! Navigation protocol header names.

/// Marks a request (and confirms a response) as protocol-aware.
pub const PAGEWIRE: &str = "x-pagewire";
/// Asset version currently held by the client.
pub const VERSION: &str = "x-pagewire-version";
/// Component currently rendered; partial reloads apply to it.
pub const PARTIAL_COMPONENT: &str = "x-pagewire-partial-component";
/// Comma-joined props to include in a partial reload.
pub const PARTIAL_DATA: &str = "x-pagewire-partial-data";
/// Comma-joined props to exclude from a partial reload.
pub const PARTIAL_EXCEPT: &str = "x-pagewire-partial-except";
/// Comma-joined merge props whose previous value must be discarded.
pub const RESET: &str = "x-pagewire-reset";
/// Error bag the server should scope validation errors to.
pub const ERROR_BAG: &str = "x-pagewire-error-bag";
/// Response header asking for a full page load of its value.
pub const LOCATION: &str = "x-pagewire-location";
