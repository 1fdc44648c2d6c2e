// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Immutable registry of monitored points.
//!
//! The registry is built once from configuration and shared read-only
//! between the session task and the query surface. It keeps the
//! configuration order (used for subscription submission and for
//! `get_all`), a name index and a reverse index from remote node id to the
//! display names it feeds.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// =============================================================================
// SubscriptionDescriptor
// =============================================================================

/// One configured point: what to subscribe to and how to name it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionDescriptor {
    /// Unique key used by every external lookup.
    pub display_name: String,

    /// Remote node identifier, e.g. `ns=2;s=D1.Tag1`.
    pub remote_node_id: String,

    /// Display unit, carried through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl SubscriptionDescriptor {
    /// Creates a descriptor without a unit.
    pub fn new(display_name: impl Into<String>, remote_node_id: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            remote_node_id: remote_node_id.into(),
            unit: None,
        }
    }

    /// Sets the display unit.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

// =============================================================================
// NodeRegistry
// =============================================================================

/// The validated set of monitored points.
#[derive(Clone, Default)]
pub struct NodeRegistry {
    descriptors: Vec<SubscriptionDescriptor>,
    by_name: HashMap<String, usize>,
    by_node: HashMap<String, Vec<usize>>,
}

impl NodeRegistry {
    /// Builds a registry, rejecting duplicate or empty display names and
    /// empty remote node ids.
    pub fn build(descriptors: Vec<SubscriptionDescriptor>) -> Result<Self, ConfigError> {
        let mut by_name = HashMap::with_capacity(descriptors.len());
        let mut by_node: HashMap<String, Vec<usize>> = HashMap::new();

        for (index, descriptor) in descriptors.iter().enumerate() {
            if descriptor.display_name.trim().is_empty() {
                return Err(ConfigError::EmptyDisplayName { index });
            }
            if descriptor.remote_node_id.trim().is_empty() {
                return Err(ConfigError::empty_remote_node_id(&descriptor.display_name));
            }
            if by_name.insert(descriptor.display_name.clone(), index).is_some() {
                return Err(ConfigError::duplicate_display_name(&descriptor.display_name));
            }
            by_node
                .entry(descriptor.remote_node_id.clone())
                .or_default()
                .push(index);
        }

        tracing::debug!(points = descriptors.len(), nodes = by_node.len(), "Built node registry");

        Ok(Self {
            descriptors,
            by_name,
            by_node,
        })
    }

    /// Returns all descriptors in configuration order.
    #[inline]
    pub fn all(&self) -> &[SubscriptionDescriptor] {
        &self.descriptors
    }

    /// Looks up a descriptor by display name.
    pub fn lookup(&self, display_name: &str) -> Option<&SubscriptionDescriptor> {
        self.by_name
            .get(display_name)
            .map(|&index| &self.descriptors[index])
    }

    /// Returns every descriptor fed by the given remote node id.
    pub fn resolve<'a>(
        &'a self,
        remote_node_id: &str,
    ) -> impl Iterator<Item = &'a SubscriptionDescriptor> + 'a {
        self.by_node
            .get(remote_node_id)
            .into_iter()
            .flatten()
            .map(move |&index| &self.descriptors[index])
    }

    /// Returns `true` if the display name is registered.
    #[inline]
    pub fn contains(&self, display_name: &str) -> bool {
        self.by_name.contains_key(display_name)
    }

    /// Returns the number of points.
    #[inline]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Returns `true` if no points are configured.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Returns the number of distinct remote nodes.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.by_node.len()
    }
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("points", &self.descriptors.len())
            .field("nodes", &self.by_node.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<SubscriptionDescriptor> {
        vec![
            SubscriptionDescriptor::new("FlowTransmitter", "ns=2;s=D1.Tag1").with_unit("l/min"),
            SubscriptionDescriptor::new("Pressure", "ns=2;s=D1.Tag2").with_unit("bar"),
            SubscriptionDescriptor::new("PressureRaw", "ns=2;s=D1.Tag2"),
        ]
    }

    #[test]
    fn test_build_keeps_order() {
        let registry = NodeRegistry::build(sample()).unwrap();
        let names: Vec<_> = registry.all().iter().map(|d| d.display_name.as_str()).collect();
        assert_eq!(names, ["FlowTransmitter", "Pressure", "PressureRaw"]);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.node_count(), 2);
    }

    #[test]
    fn test_lookup() {
        let registry = NodeRegistry::build(sample()).unwrap();
        let flow = registry.lookup("FlowTransmitter").unwrap();
        assert_eq!(flow.unit.as_deref(), Some("l/min"));
        assert!(registry.lookup("Unknown").is_none());
        assert!(registry.contains("Pressure"));
    }

    #[test]
    fn test_resolve_shared_node() {
        let registry = NodeRegistry::build(sample()).unwrap();
        let names: Vec<_> = registry
            .resolve("ns=2;s=D1.Tag2")
            .map(|d| d.display_name.clone())
            .collect();
        assert_eq!(names, ["Pressure", "PressureRaw"]);
        assert_eq!(registry.resolve("ns=9;s=Nope").count(), 0);
    }

    #[test]
    fn test_duplicate_display_name() {
        let mut points = sample();
        points.push(SubscriptionDescriptor::new("Pressure", "ns=2;s=Other"));
        assert_eq!(
            NodeRegistry::build(points).unwrap_err(),
            ConfigError::duplicate_display_name("Pressure")
        );
    }

    #[test]
    fn test_empty_fields() {
        let err = NodeRegistry::build(vec![SubscriptionDescriptor::new("Flow", "  ")]).unwrap_err();
        assert_eq!(err, ConfigError::empty_remote_node_id("Flow"));

        let err = NodeRegistry::build(vec![SubscriptionDescriptor::new("", "ns=2;i=1")]).unwrap_err();
        assert_eq!(err, ConfigError::EmptyDisplayName { index: 0 });
    }

    #[test]
    fn test_empty_registry_is_valid() {
        let registry = NodeRegistry::build(Vec::new()).unwrap();
        assert!(registry.is_empty());
    }
}
