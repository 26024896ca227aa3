//! Random-key chromosome layout.
//!
//! # Encoding
//!
//! ```text
//! [ instances: A ][ node priority: A x N ][ request priority: A x N ]
//! ```
//!
//! - **instances**: per application, the fraction of the candidate budget
//!   `min(non-cloud nodes, max_instances)` to open.
//! - **node priority**: per (app, node), higher genes are preferred
//!   candidates. Genes of the cloud node are ignored.
//! - **request priority**: per (app, source node), higher genes are served
//!   first during load distribution.

/// Gene offsets for a scenario with `nb_apps` applications and `nb_nodes` nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChromosomeLayout {
    nb_apps: usize,
    nb_nodes: usize,
}

impl ChromosomeLayout {
    /// Creates the layout.
    pub fn new(nb_apps: usize, nb_nodes: usize) -> Self {
        Self { nb_apps, nb_nodes }
    }

    /// Total number of genes.
    pub fn len(&self) -> usize {
        self.nb_apps * (1 + 2 * self.nb_nodes)
    }

    /// Whether the layout has no genes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of the instance gene of `app`.
    #[inline]
    pub fn instances(&self, app: usize) -> usize {
        debug_assert!(app < self.nb_apps);
        app
    }

    /// Index of the node-priority gene of (app, node).
    #[inline]
    pub fn node_priority(&self, app: usize, node: usize) -> usize {
        debug_assert!(app < self.nb_apps && node < self.nb_nodes);
        self.nb_apps + app * self.nb_nodes + node
    }

    /// Index of the request-priority gene of (app, src).
    #[inline]
    pub fn request_priority(&self, app: usize, src: usize) -> usize {
        debug_assert!(app < self.nb_apps && src < self.nb_nodes);
        self.nb_apps * (1 + self.nb_nodes) + app * self.nb_nodes + src
    }

    /// Node-priority genes of `app`.
    pub fn node_priorities<'g>(&self, genes: &'g [f64], app: usize) -> &'g [f64] {
        let start = self.node_priority(app, 0);
        &genes[start..start + self.nb_nodes]
    }

    /// Request-priority genes of `app`.
    pub fn request_priorities<'g>(&self, genes: &'g [f64], app: usize) -> &'g [f64] {
        let start = self.request_priority(app, 0);
        &genes[start..start + self.nb_nodes]
    }
}
