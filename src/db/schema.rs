//! Built-in HANA statements used when a caller supplies none.
//! Creation has no built-in statements: callers must always provide them.

/// Password rotation.
pub const DEFAULT_PASSWORD_CHANGE: &[&str] = &[r#"ALTER USER {{username}} PASSWORD "{{password}}""#];

/// Expiration rotation. HANA deactivates the account itself once the
/// validity deadline passes.
pub const DEFAULT_EXPIRATION_CHANGE: &[&str] = &["ALTER USER {{username}} VALID UNTIL '{{expiration}}'"];

/// Soft drop, step one: disable login for the user.
pub const DEACTIVATE_USER: &str = "ALTER USER {{name}} DEACTIVATE USER NOW";

/// Soft drop, step two. `RESTRICT` fails the transaction when dependent
/// objects exist, which also undoes the deactivation.
pub const DROP_USER_RESTRICT: &str = "DROP USER {{name}} RESTRICT";
