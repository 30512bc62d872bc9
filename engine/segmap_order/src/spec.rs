use std::collections::HashSet;

use segmap_lexer::SegmentId;
use thiserror::Error;

/// Problems with an order group declaration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderSpecError {
    #[error("order type must not be empty")]
    EmptyOrderType,
    #[error("{0} is the trigger of order group {1:?} and cannot also be a member")]
    TriggerIsMember(SegmentId, String),
    #[error("{0} is declared both as a detail and as a repeatable segment of {1:?}")]
    DetailAndRepeatable(SegmentId, String),
}

/// What a segment is to an order group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Trigger,
    /// Kept once per group; a later one replaces an earlier one
    Detail,
    /// Appended to the group's list for that id
    Repeatable,
    /// Belongs to the surrounding message
    Other,
}

/// Declares how the segments of one kind of order are grouped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderGroupSpec {
    pub order_type: String,
    pub trigger: SegmentId,
    pub detail: HashSet<SegmentId>,
    pub repeatable: HashSet<SegmentId>,
}

impl OrderGroupSpec {
    pub fn builder(order_type: impl Into<String>, trigger: SegmentId) -> OrderGroupSpecBuilder {
        OrderGroupSpecBuilder {
            spec: OrderGroupSpec {
                order_type: order_type.into(),
                trigger,
                detail: HashSet::new(),
                repeatable: HashSet::new(),
            },
        }
    }

    pub fn role(&self, id: SegmentId) -> Role {
        if id == self.trigger {
            Role::Trigger
        } else if self.detail.contains(&id) {
            Role::Detail
        } else if self.repeatable.contains(&id) {
            Role::Repeatable
        } else {
            Role::Other
        }
    }
}

/// Collects the segment ids of an [`OrderGroupSpec`] and checks them.
#[derive(Debug, Clone)]
pub struct OrderGroupSpecBuilder {
    spec: OrderGroupSpec,
}

impl OrderGroupSpecBuilder {
    pub fn detail(mut self, id: SegmentId) -> Self {
        self.spec.detail.insert(id);
        self
    }

    pub fn repeatable(mut self, id: SegmentId) -> Self {
        self.spec.repeatable.insert(id);
        self
    }

    pub fn build(self) -> Result<OrderGroupSpec, OrderSpecError> {
        let spec = self.spec;
        if spec.order_type.trim().is_empty() {
            return Err(OrderSpecError::EmptyOrderType);
        }
        if spec.detail.contains(&spec.trigger) || spec.repeatable.contains(&spec.trigger) {
            return Err(OrderSpecError::TriggerIsMember(spec.trigger, spec.order_type));
        }
        // Sorted so the reported id does not depend on hash order
        let mut overlap: Vec<_> = spec.detail.intersection(&spec.repeatable).copied().collect();
        overlap.sort();
        if let Some(id) = overlap.first() {
            return Err(OrderSpecError::DetailAndRepeatable(*id, spec.order_type));
        }
        Ok(spec)
    }
}
