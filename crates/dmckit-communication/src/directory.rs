//! Controller address directory
//!
//! Address discovery is delegated to an external directory lookup (the
//! vendor's discovery protocol, a config file, a test fixture) that
//! returns a mapping of address to free-text description. The description
//! commonly embeds a revision marker like `Rev 1.3a`; beyond splitting
//! that marker out for display, the text is treated as opaque.

use dmckit_core::Result;
use std::collections::BTreeMap;

/// External lookup producing address -> description
pub trait AddressDirectory: Send {
    /// Enumerate reachable controllers
    fn addresses(&self) -> Result<BTreeMap<String, String>>;
}

/// Fixed directory, for tests and configured installations
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    entries: BTreeMap<String, String>,
}

impl StaticDirectory {
    /// Create a directory over a fixed mapping
    pub fn new(entries: BTreeMap<String, String>) -> Self {
        Self { entries }
    }
}

impl AddressDirectory for StaticDirectory {
    fn addresses(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.entries.clone())
    }
}

/// Drop serial/parallel device names from a directory listing
///
/// Vendor discovery reports local `COM`/`LPT` device names alongside
/// network controllers; network-facing screens want only the latter.
pub fn filter_network_addresses(entries: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    entries
        .iter()
        .filter(|(address, _)| {
            let upper = address.to_uppercase();
            !upper.starts_with("COM") && !upper.starts_with("LPT")
        })
        .map(|(a, d)| (a.clone(), d.clone()))
        .collect()
}

/// Split the revision marker out of a controller description
///
/// `"DMC4040 Rev 1.3a"` becomes `("DMC4040 ", Some("Rev 1.3a"))`; a
/// description without a marker comes back whole.
pub fn split_revision(description: &str) -> (&str, Option<&str>) {
    match description.find("Rev") {
        Some(pos) => (&description[..pos], Some(&description[pos..])),
        None => (description, None),
    }
}
