//! Node model.
//!
//! Nodes host application instances. Three kinds exist:
//!
//! | Kind | Meaning |
//! |------|---------|
//! | `Cloud` | Fallback node with unbounded capacity |
//! | `Simple` | A single physical node |
//! | `Composite` | A cluster of nodes seen as one node by a coarser controller |
//!
//! Composite nodes expose aggregated capacity and averaged cost/availability,
//! and designate a central member used to estimate inter-cluster delays.

use serde::{Deserialize, Serialize};

use super::ScalarFn;

/// Node variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Fallback node with unbounded capacity.
    Cloud,
    /// Physical node.
    Simple,
    /// Aggregation of other nodes.
    Composite {
        /// Indices of the member nodes in the parent scenario.
        members: Vec<usize>,
        /// Index (in the parent scenario) of the member used for delay estimation.
        central: usize,
    },
}

/// A node of the infrastructure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique node identifier.
    pub id: String,
    /// Node variant.
    pub kind: NodeKind,
    /// Capacity per resource.
    pub capacity: Vec<f64>,
    /// Availability (0.0..1.0).
    pub availability: f64,
    /// Cost per resource as a function of the allocated amount.
    pub cost: Vec<ScalarFn>,
    /// Power draw as a function of CPU utilization (0.0..1.0).
    pub power: ScalarFn,
    /// Planar position.
    pub position: (f64, f64),
}

impl Node {
    /// Creates a simple node with no capacity.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: NodeKind::Simple,
            capacity: Vec::new(),
            availability: 1.0,
            cost: Vec::new(),
            power: ScalarFn::zero(),
            position: (0.0, 0.0),
        }
    }

    /// Creates the fallback cloud node with unbounded capacity on `nb_resources` dimensions.
    pub fn cloud(id: impl Into<String>, nb_resources: usize) -> Self {
        Self {
            kind: NodeKind::Cloud,
            capacity: vec![f64::INFINITY; nb_resources],
            ..Self::new(id)
        }
    }

    /// Aggregates `members` into a composite node.
    ///
    /// `member_ids` are the members' indices in the parent scenario and
    /// `central` must be one of them. Capacity is summed, availability and
    /// cost coefficients are averaged, position is the central member's.
    pub fn composite(
        id: impl Into<String>,
        members: &[&Node],
        member_ids: Vec<usize>,
        central: usize,
    ) -> Self {
        let nb_resources = members.iter().map(|n| n.capacity.len()).max().unwrap_or(0);
        let mut capacity = vec![0.0; nb_resources];
        for node in members {
            for (r, cap) in node.capacity.iter().enumerate() {
                capacity[r] += cap;
            }
        }

        let count = members.len().max(1) as f64;
        let availability = members.iter().map(|n| n.availability).sum::<f64>() / count;

        let nb_cost = members.iter().map(|n| n.cost.len()).max().unwrap_or(0);
        let cost = (0..nb_cost)
            .map(|r| average_fn(members.iter().filter_map(|n| n.cost.get(r))))
            .collect();
        let power = average_fn(members.iter().map(|n| &n.power));

        let position = member_ids
            .iter()
            .position(|&m| m == central)
            .and_then(|i| members.get(i))
            .map(|n| n.position)
            .unwrap_or((0.0, 0.0));

        Self {
            id: id.into(),
            kind: NodeKind::Composite {
                members: member_ids,
                central,
            },
            capacity,
            availability: if members.is_empty() { 0.0 } else { availability },
            cost,
            power,
            position,
        }
    }

    /// Sets the capacity of resource `resource`, growing the list as needed.
    pub fn with_capacity(mut self, resource: usize, amount: f64) -> Self {
        if self.capacity.len() <= resource {
            self.capacity.resize(resource + 1, 0.0);
        }
        self.capacity[resource] = amount;
        self
    }

    /// Sets the cost function of resource `resource`.
    pub fn with_cost(mut self, resource: usize, cost: ScalarFn) -> Self {
        if self.cost.len() <= resource {
            self.cost.resize(resource + 1, ScalarFn::zero());
        }
        self.cost[resource] = cost;
        self
    }

    /// Sets the availability.
    pub fn with_availability(mut self, availability: f64) -> Self {
        self.availability = availability.clamp(0.0, 1.0);
        self
    }

    /// Sets the power model.
    pub fn with_power(mut self, power: ScalarFn) -> Self {
        self.power = power;
        self
    }

    /// Sets the position.
    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = (x, y);
        self
    }

    /// Whether this is the fallback node.
    #[inline]
    pub fn is_cloud(&self) -> bool {
        matches!(self.kind, NodeKind::Cloud)
    }

    /// Capacity of `resource` (∞ for the cloud, 0 if undefined).
    pub fn capacity_of(&self, resource: usize) -> f64 {
        match self.kind {
            NodeKind::Cloud => f64::INFINITY,
            _ => self.capacity.get(resource).copied().unwrap_or(0.0),
        }
    }

    /// Cost of allocating `amount` of `resource`.
    pub fn cost_of(&self, resource: usize, amount: f64) -> f64 {
        self.cost.get(resource).map(|f| f.eval(amount)).unwrap_or(0.0)
    }

    /// Number of physical nodes represented (1 unless composite).
    pub fn member_count(&self) -> usize {
        match &self.kind {
            NodeKind::Composite { members, .. } => members.len(),
            _ => 1,
        }
    }

    /// Euclidean distance to another node.
    pub fn distance_to(&self, other: &Node) -> f64 {
        let dx = self.position.0 - other.position.0;
        let dy = self.position.1 - other.position.1;
        (dx * dx + dy * dy).sqrt()
    }
}

fn average_fn<'a>(fns: impl Iterator<Item = &'a ScalarFn>) -> ScalarFn {
    let mut coeffs: Vec<f64> = Vec::new();
    let mut count = 0usize;
    for f in fns {
        let c = match f {
            ScalarFn::Constant(c) => vec![*c],
            ScalarFn::Linear { slope, intercept } => vec![*intercept, *slope],
            ScalarFn::Polynomial(c) => c.clone(),
        };
        if coeffs.len() < c.len() {
            coeffs.resize(c.len(), 0.0);
        }
        for (i, v) in c.iter().enumerate() {
            coeffs[i] += v;
        }
        count += 1;
    }
    if count == 0 {
        return ScalarFn::zero();
    }
    for c in &mut coeffs {
        *c /= count as f64;
    }
    ScalarFn::Polynomial(coeffs)
}
