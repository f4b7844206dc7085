// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery backend for environments without zero-configuration support.

use super::{Announcement, Browser, DiscoveryBackend, Interface, Metadata};
use crate::error::{Error, Result};
use std::time::Duration;

/// Backend that is never available. Announcements are accepted and ignored.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullDiscovery;

impl DiscoveryBackend for NullDiscovery {
    fn is_available(&self) -> bool {
        false
    }

    fn browser(&self, _service: &str) -> Box<dyn Browser> {
        Box::new(NullBrowser)
    }

    fn announce(
        &self,
        _service: &str,
        _instance: &str,
        _metadata: Metadata,
    ) -> Result<Announcement> {
        Ok(Announcement::none())
    }
}

/// Browser that never finds anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullBrowser;

impl Browser for NullBrowser {
    fn is_available(&self) -> bool {
        false
    }

    fn begin_browsing(&mut self, _scope: Interface) -> Result<()> {
        Err(Error::Config("Empty discovery implementation".into()))
    }

    fn browse(&mut self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    fn is_browsing(&self) -> bool {
        false
    }

    fn end_browsing(&mut self) {}

    fn instances(&self) -> Vec<String> {
        Vec::new()
    }

    fn get(&self, _instance: &str, _key: &str) -> Option<String> {
        None
    }
}
