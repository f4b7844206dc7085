// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process discovery directory.
//!
//! Every clone of a [`LocalDirectory`] sees the same announcements. Contexts
//! built with clones of one directory behave like separate processes on one
//! zero-configuration network.

use super::{Announcement, Browser, DiscoveryBackend, Interface, Metadata};
use crate::error::{Error, Result};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

type Services = HashMap<String, BTreeMap<String, Metadata>>;

/// Shared in-process directory of announced instances.
#[derive(Clone, Default)]
pub struct LocalDirectory {
    services: Arc<RwLock<Services>>,
}

impl LocalDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an instance record directly.
    pub fn insert(&self, service: &str, instance: &str, metadata: Metadata) {
        self.services
            .write()
            .entry(service.to_string())
            .or_default()
            .insert(instance.to_string(), metadata);
    }

    /// Remove an instance record. Returns whether it existed.
    pub fn remove(&self, service: &str, instance: &str) -> bool {
        let mut services = self.services.write();
        let Some(instances) = services.get_mut(service) else {
            return false;
        };
        let removed = instances.remove(instance).is_some();
        if instances.is_empty() {
            services.remove(service);
        }
        removed
    }

    /// Snapshot of the instances announced under `service`.
    pub fn instances(&self, service: &str) -> BTreeMap<String, Metadata> {
        self.services
            .read()
            .get(service)
            .cloned()
            .unwrap_or_default()
    }
}

impl DiscoveryBackend for LocalDirectory {
    fn is_available(&self) -> bool {
        true
    }

    fn browser(&self, service: &str) -> Box<dyn Browser> {
        Box::new(LocalBrowser {
            directory: self.clone(),
            service: service.to_string(),
            browsing: false,
            snapshot: BTreeMap::new(),
        })
    }

    fn announce(&self, service: &str, instance: &str, metadata: Metadata) -> Result<Announcement> {
        {
            let services = self.services.read();
            if services
                .get(service)
                .is_some_and(|instances| instances.contains_key(instance))
            {
                return Err(Error::Config(format!(
                    "instance {} already announced under {}",
                    instance, service
                )));
            }
        }

        self.insert(service, instance, metadata);
        log::debug!("[LocalDirectory] announced {} under {}", instance, service);

        let directory = self.clone();
        let service = service.to_string();
        let instance = instance.to_string();
        Ok(Announcement::new(move || {
            directory.remove(&service, &instance);
            log::debug!("[LocalDirectory] withdrew {} from {}", instance, service);
        }))
    }
}

/// Browser over a [`LocalDirectory`].
pub struct LocalBrowser {
    directory: LocalDirectory,
    service: String,
    browsing: bool,
    snapshot: BTreeMap<String, Metadata>,
}

impl Browser for LocalBrowser {
    fn is_available(&self) -> bool {
        true
    }

    fn begin_browsing(&mut self, _scope: Interface) -> Result<()> {
        if self.browsing {
            return Err(Error::Config("already browsing".into()));
        }
        self.browsing = true;
        self.snapshot = self.directory.instances(&self.service);
        Ok(())
    }

    fn browse(&mut self, _timeout: Duration) -> Result<()> {
        // Announcements are visible immediately; there is nothing to wait for.
        self.snapshot = self.directory.instances(&self.service);
        Ok(())
    }

    fn is_browsing(&self) -> bool {
        self.browsing
    }

    fn end_browsing(&mut self) {
        self.browsing = false;
    }

    fn instances(&self) -> Vec<String> {
        self.snapshot.keys().cloned().collect()
    }

    fn get(&self, instance: &str, key: &str) -> Option<String> {
        self.snapshot
            .get(instance)
            .and_then(|metadata| metadata.get(key))
            .cloned()
    }
}
