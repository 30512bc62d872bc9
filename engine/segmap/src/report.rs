//! JSON shapes printed by the `segmap` binary.

use std::collections::BTreeMap;

use segmap_lexer::SegmentLine;
use segmap_map::{Mapping, MappingSpec, SpecDocument};
use segmap_order::{Assembly, OrderGroup};
use segmap_type::Record;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct SegmentReport<'a> {
    pub id: String,
    pub position: usize,
    pub text: &'a str,
}

impl<'a> From<&SegmentLine<'a>> for SegmentReport<'a> {
    fn from(line: &SegmentLine<'a>) -> Self {
        SegmentReport {
            id: line.id.to_string(),
            position: line.position,
            text: line.text,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderGroupReport<'a> {
    pub order_type: &'a str,
    pub primary: SegmentReport<'a>,
    pub details: BTreeMap<String, SegmentReport<'a>>,
    pub repeatable: BTreeMap<String, Vec<SegmentReport<'a>>>,
}

impl<'a> From<&OrderGroup<'a>> for OrderGroupReport<'a> {
    fn from(group: &OrderGroup<'a>) -> Self {
        OrderGroupReport {
            order_type: group.order_type,
            primary: SegmentReport::from(&group.primary),
            details: group
                .details
                .iter()
                .map(|(id, line)| (id.to_string(), SegmentReport::from(line)))
                .collect(),
            repeatable: group
                .repeatable
                .iter()
                .map(|(id, lines)| {
                    (id.to_string(), lines.iter().map(SegmentReport::from).collect())
                })
                .collect(),
        }
    }
}

/// Order groups of every order spec, in spec order, plus strict-mode
/// warnings.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrdersReport<'a> {
    pub groups: Vec<OrderGroupReport<'a>>,
    pub warnings: Vec<String>,
}

impl<'a> OrdersReport<'a> {
    pub fn extend(&mut self, assembly: Assembly<'a>) {
        self.groups
            .extend(assembly.groups.iter().map(OrderGroupReport::from));
        self.warnings
            .extend(assembly.warnings.iter().map(ToString::to_string));
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldSource {
    pub field: String,
    pub source: &'static str,
}

/// A mapped record and the source of each of its scalar fields.
#[derive(Debug, Clone, Serialize)]
pub struct ExplainReport {
    pub record: Record,
    pub sources: Vec<FieldSource>,
}

impl ExplainReport {
    pub fn new(mapping: Mapping) -> Self {
        let sources = mapping
            .provenance
            .into_iter()
            .map(|(field, provenance)| FieldSource {
                field,
                source: provenance.as_str(),
            })
            .collect();
        ExplainReport {
            record: mapping.record,
            sources,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SpecSummary {
    pub root: String,
    pub types: Vec<String>,
    pub root_fields: usize,
    pub order_types: Vec<String>,
}

impl SpecSummary {
    pub fn new(document: &SpecDocument, spec: &MappingSpec) -> Self {
        SpecSummary {
            root: spec.root().name.clone(),
            types: document.types.keys().cloned().collect(),
            root_fields: spec.root().fields.len(),
            order_types: spec.orders().iter().map(|o| o.order_type.clone()).collect(),
        }
    }
}
