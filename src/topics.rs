//! Channel and capability names shared by the background, the preloader and
//! the plugin page.

use const_format::concatcp;

/// Prefix of every channel this plugin owns. Also the default store namespace.
pub const NAMESPACE: &str = "example";

/// One-way, no payload. Sent by the exposed `sendUpdate` capability.
/// Handled by `BackgroundCoordinator` (increments the counter).
pub const UPDATE: &str = concatcp!(NAMESPACE, "-update");

/// Request/response. Payload is the page's content id, reply is the current count.
pub const REGISTER_PAGE: &str = concatcp!(NAMESPACE, "-register-page");

/// Background → page. Payload is the new count.
pub const COUNT_UPDATED: &str = concatcp!(NAMESPACE, "-count-updated");

/// Name of the object exposed into the page's main world.
pub const EXPOSED_OBJECT: &str = concatcp!(NAMESPACE, "API");

/// The only method on [`EXPOSED_OBJECT`].
pub const SEND_UPDATE: &str = "sendUpdate";

/// Store key holding the serialized count.
pub const COUNT_KEY: &str = "count";
