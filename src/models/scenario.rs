//! Scenario: the static part of the placement problem.

use serde::{Deserialize, Serialize};

use super::{Application, Node, Resource};

/// Resources, applications and nodes of one problem instance.
///
/// Ids are positions in the vectors; they are assigned once and used to
/// index every grid of the system, environment and solution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Capacity dimensions.
    pub resources: Vec<Resource>,
    /// Applications.
    pub apps: Vec<Application>,
    /// Nodes, including exactly one cloud node.
    pub nodes: Vec<Node>,
    /// Index of the cloud node.
    pub cloud: usize,
}

impl Scenario {
    /// Creates a scenario. The cloud index is the first `Cloud` node, or 0.
    pub fn new(resources: Vec<Resource>, apps: Vec<Application>, nodes: Vec<Node>) -> Self {
        let cloud = nodes.iter().position(|n| n.is_cloud()).unwrap_or(0);
        Self {
            resources,
            apps,
            nodes,
            cloud,
        }
    }

    /// Number of applications.
    #[inline]
    pub fn nb_apps(&self) -> usize {
        self.apps.len()
    }

    /// Number of nodes.
    #[inline]
    pub fn nb_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of resources.
    #[inline]
    pub fn nb_resources(&self) -> usize {
        self.resources.len()
    }

    /// Index of the CPU dimension (first resource named "CPU", else 0).
    pub fn cpu_index(&self) -> usize {
        self.resources.iter().position(|r| r.is_cpu()).unwrap_or(0)
    }

    /// Indices of every node except the cloud.
    pub fn edge_nodes(&self) -> Vec<usize> {
        (0..self.nodes.len()).filter(|&n| n != self.cloud).collect()
    }

    /// Looks up an application index by id.
    pub fn app_index(&self, id: &str) -> Option<usize> {
        self.apps.iter().position(|a| a.id == id)
    }

    /// Looks up a node index by id.
    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_indices() {
        let scenario = Scenario::new(
            vec![Resource::ram(), Resource::cpu()],
            vec![Application::new("A")],
            vec![Node::new("e1"), Node::cloud("cloud", 2), Node::new("e2")],
        );
        assert_eq!(scenario.cloud, 1);
        assert_eq!(scenario.cpu_index(), 1);
        assert_eq!(scenario.edge_nodes(), vec![0, 2]);
        assert_eq!(scenario.node_index("e2"), Some(2));
        assert_eq!(scenario.app_index("B"), None);
    }
}
