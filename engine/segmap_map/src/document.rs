//! Declarative mapping documents.
//!
//! A [`SpecDocument`] is the JSON form of a mapping: named record types
//! whose fields list their candidates and defaults, the root type, enum
//! vocabularies and order groups. [`MappingSpec::from_document`] checks it
//! and compiles it into immutable, already rebased rule tables.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use log::{debug, warn};
use segmap_cond::Condition;
use segmap_lexer::{Delimiters, SegmentId};
use segmap_order::OrderGroupSpec;
use segmap_path::FieldAddress;
use segmap_type::{CodedElement, Converter, Value, ValueParser, Wire};
use serde::Deserialize;

use crate::engine::MappingSpec;
use crate::error::SpecError;
use crate::rule::{CandidateRule, ComplexTypeSpec, FieldRule};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpecDocument {
    /// Name of the type each message is mapped to
    pub root: String,
    #[serde(default)]
    pub enums: BTreeMap<String, Vec<String>>,
    pub types: BTreeMap<String, TypeDocument>,
    #[serde(default)]
    pub orders: Vec<OrderDocument>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeDocument {
    /// Address relative child addresses are resolved against
    #[serde(default)]
    pub base: Option<String>,
    pub fields: Vec<FieldDocument>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDocument {
    pub name: String,
    /// A scalar type, an enum, a registered custom type or a record type
    #[serde(rename = "type", default = "default_type")]
    pub type_name: String,
    /// chrono format for `date`, `datetime` and `time`
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub candidates: Vec<CandidateDocument>,
    #[serde(default)]
    pub conditional_defaults: Vec<ConditionalDefaultDocument>,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub conditional_only: bool,
    #[serde(default)]
    pub repeated: bool,
    /// Record types only: one record per occurrence of the base segment
    #[serde(default)]
    pub each: bool,
    /// Record types only: null when nothing came from the message
    #[serde(default)]
    pub nullable: bool,
}

fn default_type() -> String {
    "string".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CandidateDocument {
    pub address: String,
    #[serde(default)]
    pub condition: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    /// Overrides the field's type for this candidate
    #[serde(rename = "type", default)]
    pub type_name: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionalDefaultDocument {
    pub when: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderDocument {
    pub order_type: String,
    pub trigger: String,
    #[serde(default)]
    pub detail: Vec<String>,
    #[serde(default)]
    pub repeatable: Vec<String>,
}

impl SpecDocument {
    pub fn from_json(text: &str) -> Result<Self, SpecError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Custom value types available to spec documents, by type name.
#[derive(Debug, Clone)]
pub struct ConverterRegistry {
    parsers: HashMap<String, Arc<dyn ValueParser>>,
}

impl ConverterRegistry {
    pub fn empty() -> Self {
        ConverterRegistry {
            parsers: HashMap::new(),
        }
    }

    pub fn register(&mut self, parser: impl ValueParser + 'static) {
        let parser: Arc<dyn ValueParser> = Arc::new(parser);
        self.parsers.insert(parser.type_name().to_string(), parser);
    }

    pub fn get(&self, name: &str) -> Option<Converter> {
        self.parsers.get(name).cloned().map(Converter::Custom)
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Wire::<CodedElement>::new());
        registry
    }
}

enum TypeRef<'d> {
    Scalar(Converter),
    Record(&'d str),
}

struct Compiler<'d> {
    doc: &'d SpecDocument,
    registry: &'d ConverterRegistry,
    built: HashMap<&'d str, Arc<ComplexTypeSpec>>,
    visiting: Vec<&'d str>,
}

impl<'d> Compiler<'d> {
    fn record(&mut self, name: &'d str, path: &str) -> Result<Arc<ComplexTypeSpec>, SpecError> {
        if let Some(spec) = self.built.get(name) {
            return Ok(Arc::clone(spec));
        }
        if let Some(start) = self.visiting.iter().position(|v| *v == name) {
            let mut cycle = self.visiting[start..].to_vec();
            cycle.push(name);
            return Err(SpecError::Cycle {
                path: path.to_string(),
                name: name.to_string(),
                cycle: cycle.join(" -> "),
            });
        }
        let Some(doc) = self.doc.types.get(name) else {
            return Err(SpecError::UnknownType {
                path: path.to_string(),
                name: name.to_string(),
            });
        };

        self.visiting.push(name);
        let mut builder = ComplexTypeSpec::builder(name);
        if let Some(base) = &doc.base {
            builder = builder.base(parse_address(base, name)?);
        }
        for field in &doc.fields {
            let field_path = format!("{name}.{}", field.name);
            builder = builder.field(self.field(field, &field_path)?);
        }
        self.visiting.pop();

        let spec = Arc::new(builder.build()?);
        self.built.insert(name, Arc::clone(&spec));
        Ok(spec)
    }

    fn field(&mut self, field: &'d FieldDocument, path: &str) -> Result<FieldRule, SpecError> {
        match self.resolve_type(&field.type_name, field.format.as_deref(), path)? {
            TypeRef::Record(name) => {
                if !field.candidates.is_empty()
                    || !field.conditional_defaults.is_empty()
                    || field.default.is_some()
                    || field.conditional_only
                    || field.repeated
                {
                    return Err(SpecError::invalid(
                        path,
                        format!("{name} is a record type; its own fields carry candidates and defaults"),
                    ));
                }
                if field.each && field.nullable {
                    return Err(SpecError::invalid(path, "`each` and `nullable` cannot be combined"));
                }
                let spec = self.record(name, path)?;
                Ok(if field.each {
                    FieldRule::each(&field.name, spec)
                } else if field.nullable {
                    FieldRule::nullable(&field.name, spec)
                } else {
                    FieldRule::complex(&field.name, spec)
                })
            }
            TypeRef::Scalar(converter) => {
                if field.each || field.nullable {
                    return Err(SpecError::invalid(
                        path,
                        "`each` and `nullable` only apply to record types",
                    ));
                }
                self.scalar(field, converter, path)
            }
        }
    }

    fn scalar(
        &mut self,
        field: &'d FieldDocument,
        converter: Converter,
        path: &str,
    ) -> Result<FieldRule, SpecError> {
        let mut builder = FieldRule::scalar(&field.name);
        for (i, doc) in field.candidates.iter().enumerate() {
            let path = format!("{path}.candidates[{i}]");
            let converter = match &doc.type_name {
                Some(name) => match self.resolve_type(name, doc.format.as_deref(), &path)? {
                    TypeRef::Scalar(converter) => converter,
                    TypeRef::Record(name) => {
                        return Err(SpecError::invalid(
                            &path,
                            format!("candidates cannot convert to record type {name}"),
                        ))
                    }
                },
                None => converter.clone(),
            };
            let mut candidate =
                CandidateRule::new(parse_address(&doc.address, &path)?, converter.clone())
                    .when(parse_condition(&doc.condition, &path)?);
            if doc.required {
                if i > 0 {
                    warn!("{path}: only the first candidate's `required` flag is used");
                }
                candidate = candidate.required();
            }
            if let Some(default) = &doc.default {
                candidate = candidate.or_default(literal(default, &converter, field.repeated, &path)?);
            }
            builder = builder.candidate(candidate);
        }
        for (i, doc) in field.conditional_defaults.iter().enumerate() {
            let path = format!("{path}.conditional_defaults[{i}]");
            let condition = parse_condition(&doc.when, &path)?;
            if condition.is_always() {
                warn!("{path}: empty condition always holds");
            }
            let value = literal(&doc.value, &converter, field.repeated, &path)?;
            builder = builder.default_when(condition, value);
        }
        if let Some(default) = &field.default {
            builder = builder.default(literal(default, &converter, field.repeated, path)?);
        }
        if field.conditional_only {
            builder = builder.conditional_only();
        }
        if field.repeated {
            builder = builder.repeated();
        }
        builder.build().map_err(|err| match err {
            SpecError::NoCandidates { .. } => SpecError::NoCandidates {
                path: path.to_string(),
            },
            other => other,
        })
    }

    fn resolve_type(
        &self,
        name: &'d str,
        format: Option<&str>,
        path: &str,
    ) -> Result<TypeRef<'d>, SpecError> {
        let temporal = |make: fn(String) -> Converter| {
            format
                .map(|f| TypeRef::Scalar(make(f.to_string())))
                .ok_or_else(|| SpecError::MissingFormat {
                    path: path.to_string(),
                    type_name: name.to_string(),
                })
        };
        match name {
            "string" => Ok(TypeRef::Scalar(Converter::Text)),
            "raw" => Ok(TypeRef::Scalar(Converter::Raw)),
            "integer" => Ok(TypeRef::Scalar(Converter::Integer)),
            "decimal" => Ok(TypeRef::Scalar(Converter::Decimal)),
            "boolean" => Ok(TypeRef::Scalar(Converter::Boolean)),
            "date" => temporal(Converter::Date),
            "datetime" => temporal(Converter::DateTime),
            "time" => temporal(Converter::Time),
            _ => {
                if let Some(variants) = self.doc.enums.get(name) {
                    return Ok(TypeRef::Scalar(Converter::enumeration(name, variants.iter().cloned())));
                }
                if let Some(custom) = self.registry.get(name) {
                    return Ok(TypeRef::Scalar(custom));
                }
                if self.doc.types.contains_key(name) {
                    return Ok(TypeRef::Record(name));
                }
                Err(SpecError::UnknownType {
                    path: path.to_string(),
                    name: name.to_string(),
                })
            }
        }
    }
}

fn parse_address(notation: &str, path: &str) -> Result<FieldAddress, SpecError> {
    FieldAddress::parse(notation).map_err(|source| SpecError::Address {
        path: path.to_string(),
        notation: notation.to_string(),
        source,
    })
}

fn parse_condition(text: &str, path: &str) -> Result<Condition, SpecError> {
    Condition::parse(text).map_err(|source| SpecError::Condition {
        path: path.to_string(),
        text: text.to_string(),
        source,
    })
}

/// Convert a default literal through the field's converter, once, at build
/// time.
fn literal(
    value: &serde_json::Value,
    converter: &Converter,
    repeated: bool,
    path: &str,
) -> Result<Value, SpecError> {
    use serde_json::Value as Json;

    let text = match value {
        Json::Null => return Ok(Value::Null),
        Json::Array(items) if repeated => {
            return items
                .iter()
                .map(|item| literal(item, converter, false, path))
                .collect::<Result<_, _>>()
                .map(Value::List)
        }
        Json::String(s) => s.clone(),
        Json::Number(n) => n.to_string(),
        Json::Bool(b) => b.to_string(),
        Json::Array(_) | Json::Object(_) => {
            return Err(SpecError::invalid(
                path,
                "defaults must be strings, numbers, booleans or null",
            ))
        }
    };
    converter
        .convert(&text, &Delimiters::DEFAULT)
        .map_err(|source| SpecError::Default {
            path: path.to_string(),
            source,
        })
}

impl MappingSpec {
    /// Parse and compile a JSON spec document with the default registry.
    pub fn from_json(text: &str) -> Result<Self, SpecError> {
        Self::from_document(&SpecDocument::from_json(text)?, &ConverterRegistry::default())
    }

    /// Compile a spec document. Every declared type is checked, including
    /// types the root does not reach.
    pub fn from_document(
        doc: &SpecDocument,
        registry: &ConverterRegistry,
    ) -> Result<Self, SpecError> {
        let mut compiler = Compiler {
            doc,
            registry,
            built: HashMap::new(),
            visiting: Vec::new(),
        };
        let root = compiler.record(&doc.root, "root")?;
        for name in doc.types.keys() {
            compiler.record(name, name)?;
        }
        debug!("compiled {} record type(s)", compiler.built.len());

        let root = Arc::try_unwrap(root).unwrap_or_else(|shared| (*shared).clone());
        let mut orders = Vec::with_capacity(doc.orders.len());
        for (i, order) in doc.orders.iter().enumerate() {
            orders.push(compile_order(order, &format!("orders[{i}]"))?);
        }
        Ok(MappingSpec::new(root)?.with_orders(orders))
    }
}

fn compile_order(doc: &OrderDocument, path: &str) -> Result<OrderGroupSpec, SpecError> {
    let segment = |id: &str| {
        SegmentId::new(id).map_err(|source| SpecError::Segment {
            path: path.to_string(),
            source,
        })
    };
    let mut builder = OrderGroupSpec::builder(&doc.order_type, segment(&doc.trigger)?);
    for id in &doc.detail {
        builder = builder.detail(segment(id)?);
    }
    for id in &doc.repeatable {
        builder = builder.repeatable(segment(id)?);
    }
    builder.build().map_err(|source| SpecError::Order {
        path: path.to_string(),
        source,
    })
}
