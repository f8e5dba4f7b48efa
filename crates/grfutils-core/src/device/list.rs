//! Bounded device list

use serde::Serialize;

use crate::protocol::ProtocolError;

/// Ids found by a device scan, in order of arrival
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DeviceList {
    ids: Vec<String>,
}

impl DeviceList {
    /// Most devices the radio module reports for one group
    pub const CAPACITY: usize = 40;

    pub fn new() -> Self {
        Self {
            ids: Vec::with_capacity(Self::CAPACITY),
        }
    }

    /// Append an id. Fails once [`DeviceList::CAPACITY`] ids are stored.
    pub fn push(&mut self, id: impl Into<String>) -> Result<(), ProtocolError> {
        if self.ids.len() >= Self::CAPACITY {
            return Err(ProtocolError::ResourceExhausted {
                capacity: Self::CAPACITY,
            });
        }
        self.ids.push(id.into());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.ids
    }
}

impl<'a> IntoIterator for &'a DeviceList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.iter()
    }
}
