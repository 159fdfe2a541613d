//! Topology input: links between nodes and the nodes' current positions
//!
//! The engine does not own node or link identity. This module only resolves
//! what the topology supplies into the endpoint coordinates a batch needs.

use crate::geometry::Coordinate;
use crate::{LinkId, LinkRequest, PathError, Result};
use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifier of a network node, owned by the topology
pub type NodeId = String;

/// A node reference together with its current position
#[derive(Clone, Debug, PartialEq)]
pub struct LinkEndpoint {
    pub node_id: NodeId,
    pub coordinate: Coordinate,
}

/// A link as the topology knows it
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TopologyLink {
    pub link_id: LinkId,
    pub source: NodeId,
    pub target: NodeId,
}

/// Snapshot of the links and node positions supplied by the topology
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Topology {
    #[cfg_attr(feature = "serde", serde(default))]
    pub nodes: HashMap<NodeId, Coordinate>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub links: Vec<TopologyLink>,
}

impl Topology {
    /// Look up a link by id
    pub fn link(&self, link_id: &LinkId) -> Result<&TopologyLink> {
        self.links
            .iter()
            .find(|link| &link.link_id == link_id)
            .ok_or_else(|| PathError::LinkNotFound(link_id.clone()))
    }

    /// Source and target endpoints of a link
    pub fn endpoints(&self, link: &TopologyLink) -> Result<(LinkEndpoint, LinkEndpoint)> {
        Ok((self.endpoint(link, &link.source)?, self.endpoint(link, &link.target)?))
    }

    /// Batch request for a single link
    pub fn link_request(&self, link_id: &LinkId) -> Result<LinkRequest> {
        let link = self.link(link_id)?;
        self.request_for(link)
    }

    /// Batch requests for every link, in topology order
    pub fn link_requests(&self) -> Result<Vec<LinkRequest>> {
        self.links.iter().map(|link| self.request_for(link)).collect()
    }

    fn request_for(&self, link: &TopologyLink) -> Result<LinkRequest> {
        let (source, target) = self.endpoints(link)?;
        Ok(LinkRequest::new(
            link.link_id.clone(),
            source.coordinate,
            target.coordinate,
        ))
    }

    fn endpoint(&self, link: &TopologyLink, node_id: &NodeId) -> Result<LinkEndpoint> {
        let coordinate = self
            .nodes
            .get(node_id)
            .copied()
            .ok_or_else(|| PathError::UnknownNode {
                link_id: link.link_id.clone(),
                node_id: node_id.clone(),
            })?;
        Ok(LinkEndpoint {
            node_id: node_id.clone(),
            coordinate,
        })
    }
}
