//! Execution planner - builds resource execution plans

use crate::resource::BoxedResource;

/// An ordered set of resources applied one after another
///
/// Resources inside a group often depend on each other's outcome only
/// loosely (a failure never stops the rest), but they are always applied
/// in the order they were added.
#[derive(Debug)]
pub struct ResourceGroup {
    /// Name the group is reported under
    pub name: String,
    pub resources: Vec<BoxedResource>,
}

impl ResourceGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resources: Vec::new(),
        }
    }

    /// Append a resource to the group
    pub fn push(&mut self, resource: BoxedResource) {
        self.resources.push(resource);
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// An execution plan: independent groups that may run in parallel
#[derive(Debug, Default)]
pub struct ExecutionPlan {
    pub groups: Vec<ResourceGroup>,
}

impl ExecutionPlan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self { groups: Vec::new() }
    }

    /// Add a group to the plan
    pub fn add_group(&mut self, group: ResourceGroup) {
        self.groups.push(group);
    }

    /// Total number of resources in the plan
    pub fn total_resources(&self) -> usize {
        self.groups.iter().map(ResourceGroup::len).sum()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.total_resources() == 0
    }

    /// Iterate over every resource in plan order
    pub fn resources(&self) -> impl Iterator<Item = &BoxedResource> {
        self.groups.iter().flat_map(|g| g.resources.iter())
    }
}
