// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Name-keyed vendor gateway registry, built once at startup.

use std::collections::HashMap;
use std::sync::Arc;

use parley_core::{ParleyError, VendorGateway};
use tracing::{info, warn};

#[derive(Default)]
pub struct VendorRegistry {
    vendors: HashMap<String, Arc<dyn VendorGateway>>,
}

impl VendorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a gateway under its adapter name. A later registration
    /// with the same name replaces the earlier one.
    pub fn register(&mut self, vendor: Arc<dyn VendorGateway>) {
        let name = vendor.name().to_string();
        if self.vendors.insert(name.clone(), vendor).is_some() {
            warn!(vendor = %name, "vendor gateway registered twice, replacing");
        } else {
            info!(vendor = %name, "vendor gateway registered");
        }
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn VendorGateway>, ParleyError> {
        self.vendors
            .get(name)
            .cloned()
            .ok_or_else(|| ParleyError::AdapterNotFound {
                adapter_type: "vendor".to_string(),
                name: name.to_string(),
            })
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.vendors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
