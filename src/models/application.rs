//! Application model.
//!
//! An application is a service that can run as instances on several nodes.
//! Requests arrive at source nodes and are dispatched to hosting nodes
//! according to the load distribution of a [`super::Solution`].

use serde::{Deserialize, Serialize};

use super::ScalarFn;

/// A deployable application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    /// Unique application identifier.
    pub id: String,
    /// Maximum tolerated response time (s).
    pub deadline: f64,
    /// CPU work per request (MI).
    pub work: f64,
    /// Data transferred per request (MB).
    pub data_size: f64,
    /// Nominal request rate of a single user (req/s).
    pub request_rate: f64,
    /// Maximum number of hosting nodes.
    pub max_instances: usize,
    /// Minimum number of hosting nodes (0 = no lower bound).
    pub min_instances: usize,
    /// Availability of one instance (0.0..1.0).
    pub availability: f64,
    /// One-time delay for starting an instance on a node that did not host it before (s).
    pub init_delay: f64,
    /// Demand per resource as a function of received load (req/s).
    pub demand: Vec<ScalarFn>,
}

impl Application {
    /// Creates an application with no resource demand.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            deadline: f64::INFINITY,
            work: 1.0,
            data_size: 0.0,
            request_rate: 1.0,
            max_instances: usize::MAX,
            min_instances: 0,
            availability: 1.0,
            init_delay: 0.0,
            demand: Vec::new(),
        }
    }

    /// Sets the deadline.
    pub fn with_deadline(mut self, deadline: f64) -> Self {
        self.deadline = deadline;
        self
    }

    /// Sets the CPU work per request.
    pub fn with_work(mut self, work: f64) -> Self {
        self.work = work;
        self
    }

    /// Sets the data size per request.
    pub fn with_data_size(mut self, data_size: f64) -> Self {
        self.data_size = data_size;
        self
    }

    /// Sets the nominal per-user request rate.
    pub fn with_request_rate(mut self, rate: f64) -> Self {
        self.request_rate = rate;
        self
    }

    /// Sets the instance bounds.
    pub fn with_instances(mut self, min: usize, max: usize) -> Self {
        self.min_instances = min;
        self.max_instances = max.max(min);
        self
    }

    /// Sets the instance availability.
    pub fn with_availability(mut self, availability: f64) -> Self {
        self.availability = availability.clamp(0.0, 1.0);
        self
    }

    /// Sets the initialization delay.
    pub fn with_init_delay(mut self, delay: f64) -> Self {
        self.init_delay = delay;
        self
    }

    /// Sets the demand function of resource `resource`, growing the list as needed.
    pub fn with_demand(mut self, resource: usize, demand: ScalarFn) -> Self {
        if self.demand.len() <= resource {
            self.demand.resize(resource + 1, ScalarFn::zero());
        }
        self.demand[resource] = demand;
        self
    }

    /// Demand of resource `resource` at the given load (0 if undefined).
    ///
    /// Negative values are clamped to zero.
    pub fn demand_at(&self, resource: usize, load: f64) -> f64 {
        self.demand
            .get(resource)
            .map(|f| f.eval(load).max(0.0))
            .unwrap_or(0.0)
    }

    /// Largest load whose demand of `resource` stays within `amount`.
    pub fn max_load_for(&self, resource: usize, amount: f64) -> f64 {
        match self.demand.get(resource) {
            Some(f) => f.inverse_max(amount),
            None => f64::INFINITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_builder() {
        let app = Application::new("A")
            .with_deadline(0.2)
            .with_work(10.0)
            .with_instances(1, 3)
            .with_availability(1.5)
            .with_demand(1, ScalarFn::linear(2.0, 1.0));

        assert_eq!(app.id, "A");
        assert_eq!(app.max_instances, 3);
        assert_eq!(app.min_instances, 1);
        assert!((app.availability - 1.0).abs() < 1e-10);
        assert_eq!(app.demand.len(), 2);
        assert_eq!(app.demand_at(0, 5.0), 0.0);
        assert_eq!(app.demand_at(1, 5.0), 11.0);
        assert_eq!(app.demand_at(7, 5.0), 0.0);
    }

    #[test]
    fn test_negative_demand_clamped() {
        let app = Application::new("A").with_demand(0, ScalarFn::linear(1.0, -5.0));
        assert_eq!(app.demand_at(0, 1.0), 0.0);
    }

    #[test]
    fn test_max_load_for() {
        let app = Application::new("A").with_demand(0, ScalarFn::linear(2.0, 0.0));
        assert!((app.max_load_for(0, 10.0) - 5.0).abs() < 1e-12);
        assert!(app.max_load_for(3, 10.0).is_infinite());
    }
}
