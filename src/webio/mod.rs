//! External url resolution.
//!
//! The [`WebIoController`] owns every piece of network state a validation context needs:
//!
//! - a permanent cache of [`SiteInfo`] keyed by [`CleanUrl`] (absolute url minus fragment,
//!   case-insensitive),
//! - per-host resolution state (`Unseen -> DnsPending -> KnownGood | Unresolvable`),
//! - the queues feeding a bounded pool of DNS and fetch tasks.
//!
//! Parser plugins never block on it. They call [`WebIoController::try_get_site_info`]; on
//! [`SiteLookup::Unknown`] they register the [`crate::pending::PendingOperation`] returned by
//! [`WebIoController::request_site_info`], and the validation context reparses their file once
//! the operation completes. Network failures are never errors here: they are recorded on the
//! cached [`SiteInfo`] for the plugins to turn into warnings.

pub mod backend;
pub mod controller;
pub mod hostname;
pub mod site;

pub use backend::{HttpBackend, WebBackend};
pub use controller::{SiteCacheState, SiteLookup, WebIoController, WebIoStats};
pub use hostname::is_documentation_hostname;
pub use site::{CleanUrl, FetchOutcome, FetchedResponse, SiteContent, SiteInfo};
