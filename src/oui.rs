use mac_oui::Oui;

use crate::interface::VendorLookup;

/// Vendor names from the IEEE OUI registry bundled with `mac_oui`.
pub struct OuiLookup {
    database: Oui,
}

impl OuiLookup {
    pub fn new() -> Result<OuiLookup, String> {
        let database = Oui::default().map_err(|e| e.to_string())?;
        Ok(OuiLookup { database })
    }
}

impl VendorLookup for OuiLookup {
    fn lookup_vendor(&self, mac: &str) -> Option<String> {
        self.database
            .lookup_by_mac(mac)
            .ok()
            .flatten()
            .map(|entry| entry.company_name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unparseable_mac_has_no_vendor() {
        let lookup = OuiLookup::new().expect("bundled OUI database");
        assert_eq!(lookup.lookup_vendor("not a mac"), None);
    }
}
