use std::ops::Range;
use std::sync::Arc;

use log::{debug, trace};
use segmap_lexer::{Delimiters, SegmentId, SegmentLine};
use segmap_order::OrderGroupSpec;
use segmap_path::{FieldAddress, Level, Lookup, Message, ResolvedSlice};
use segmap_type::{Record, Value};

use crate::error::{MappingError, MappingErrors, SpecError};
use crate::rule::{ComplexTypeSpec, FieldKind, ScalarRule};

/// What to do after the first field error of a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Keep mapping and report every failing field
    #[default]
    CollectAll,
    /// Stop at the first failing field
    FailFast,
}

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Converted from message text
    Message,
    CandidateDefault,
    ConditionalDefault,
    UnconditionalDefault,
    /// Zero value of the destination type
    Zero,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Message => "message",
            Provenance::CandidateDefault => "candidate-default",
            Provenance::ConditionalDefault => "conditional-default",
            Provenance::UnconditionalDefault => "default",
            Provenance::Zero => "zero",
        }
    }
}

/// The value of one scalar field and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub value: Value,
    pub provenance: Provenance,
    /// The candidate address that supplied the value, if any
    pub address: Option<FieldAddress>,
}

/// A mapped record with the provenance of each scalar field.
#[derive(Debug, Clone, PartialEq)]
pub struct Mapping {
    pub record: Record,
    /// Dotted field path and provenance, in resolution order
    pub provenance: Vec<(String, Provenance)>,
}

/// Lookups within one message.
///
/// Inside a repeating record the segment the record was drawn from is
/// pinned, so addresses on that segment resolve in that occurrence. Pins
/// nest. Repeating records nested in another one draw their occurrences
/// from `window`, the segments between the outer occurrence and the next.
struct Scope<'m, 'a> {
    message: &'m Message<'a>,
    window: Range<usize>,
    pins: Vec<(SegmentId, &'m SegmentLine<'a>)>,
}

impl<'m, 'a> Scope<'m, 'a> {
    fn whole(message: &'m Message<'a>) -> Self {
        Scope {
            message,
            window: 0..message.segments().len(),
            pins: Vec::new(),
        }
    }

    fn pinned(&self, address: &FieldAddress) -> Option<&'m SegmentLine<'a>> {
        let id = address.segment?;
        self.pins
            .iter()
            .find(|(pin, _)| *pin == id)
            .map(|(_, line)| *line)
    }

    fn repetitions(&self, address: &FieldAddress) -> Vec<&'a str> {
        match self.pinned(address) {
            Some(line) => self.message.repetitions_in(line, address),
            None => self.message.repetitions_of(address),
        }
    }

    fn delimiters(&self) -> &Delimiters {
        self.message.delimiters()
    }

    /// One scope per occurrence of `id` inside the window, each pinned to
    /// its occurrence and windowed up to the next one.
    fn occurrences(&self, id: SegmentId) -> Vec<Scope<'m, 'a>> {
        let segments = self.message.segments();
        let starts: Vec<usize> = self
            .window
            .clone()
            .filter(|&i| segments.get(i).is_some_and(|line| line.id == id))
            .collect();
        starts
            .iter()
            .enumerate()
            .filter_map(|(k, &start)| {
                let line = segments.get(start)?;
                let end = starts.get(k + 1).copied().unwrap_or(self.window.end);
                let mut pins: Vec<_> = self
                    .pins
                    .iter()
                    .copied()
                    .filter(|(pin, _)| *pin != id)
                    .collect();
                pins.push((id, line));
                Some(Scope {
                    message: self.message,
                    window: start..end,
                    pins,
                })
            })
            .collect()
    }
}

impl<'m, 'a> Lookup<'a> for Scope<'m, 'a> {
    fn lookup(&self, address: &FieldAddress) -> ResolvedSlice<'a> {
        match self.pinned(address) {
            Some(line) => self.message.resolve_in(line, address),
            None => self.message.resolve(address),
        }
    }
}

/// Resolve one scalar field against a message.
///
/// Candidates are tried in order and the first non-empty one wins. When no
/// candidate supplies a value the defaults apply: the first conditional
/// default whose condition holds, then the unconditional default, then the
/// zero value of the field's type.
pub fn resolve_field(
    rule: &ScalarRule,
    field: &str,
    message: &Message<'_>,
) -> Result<Resolved, MappingError> {
    resolve_scalar(rule, field, &Scope::whole(message))
}

fn resolve_scalar(
    rule: &ScalarRule,
    field: &str,
    scope: &Scope<'_, '_>,
) -> Result<Resolved, MappingError> {
    if rule.is_conditional_only() {
        trace!("{field}: conditional only, skipping candidates");
    } else {
        for candidate in rule.candidates() {
            if !candidate.condition.evaluate(scope) {
                trace!("{field}: condition on {} is false", candidate.address);
                continue;
            }
            let convert = |raw: &str| {
                candidate
                    .converter
                    .convert(raw, scope.delimiters())
                    .map_err(|err| MappingError::conversion(field, candidate.address, err))
            };
            let found = if rule.is_repeated() {
                let raws: Vec<_> = scope
                    .repetitions(&candidate.address)
                    .into_iter()
                    .filter(|raw| !raw.is_empty())
                    .collect();
                if raws.is_empty() {
                    None
                } else {
                    let values = raws.into_iter().map(convert).collect::<Result<_, _>>()?;
                    Some(Value::List(values))
                }
            } else {
                match scope.lookup(&candidate.address).non_empty() {
                    Some(raw) => Some(convert(raw)?),
                    None => None,
                }
            };
            if let Some(value) = found {
                debug!("{field}: taken from {}", candidate.address);
                return Ok(Resolved {
                    value,
                    provenance: Provenance::Message,
                    address: Some(candidate.address),
                });
            }
            if let Some(default) = &candidate.default {
                debug!("{field}: {} is empty, using its default", candidate.address);
                return Ok(Resolved {
                    value: shape(rule, default.clone()),
                    provenance: Provenance::CandidateDefault,
                    address: Some(candidate.address),
                });
            }
        }
        if let Some(first) = rule.candidates().first().filter(|c| c.required) {
            return Err(MappingError::RequiredFieldMissing {
                field: field.to_string(),
                address: first.address,
            });
        }
    }

    let defaults = rule.defaults();
    if let Some((condition, value)) = defaults
        .conditional
        .iter()
        .find(|(condition, _)| condition.evaluate(scope))
    {
        debug!("{field}: conditional default for {condition}");
        return Ok(Resolved {
            value: shape(rule, value.clone()),
            provenance: Provenance::ConditionalDefault,
            address: None,
        });
    }
    if let Some(value) = &defaults.unconditional {
        return Ok(Resolved {
            value: shape(rule, value.clone()),
            provenance: Provenance::UnconditionalDefault,
            address: None,
        });
    }
    Ok(Resolved {
        value: rule.zero(),
        provenance: Provenance::Zero,
        address: None,
    })
}

/// Repeated fields always hold a list.
fn shape(rule: &ScalarRule, value: Value) -> Value {
    match value {
        Value::List(_) => value,
        Value::Null if rule.is_repeated() => Value::List(Vec::new()),
        other if rule.is_repeated() => Value::List(vec![other]),
        other => other,
    }
}

struct Halt;

struct Walk {
    policy: ErrorPolicy,
    errors: Vec<MappingError>,
    provenance: Vec<(String, Provenance)>,
}

impl Walk {
    fn new(policy: ErrorPolicy) -> Self {
        Walk {
            policy,
            errors: Vec::new(),
            provenance: Vec::new(),
        }
    }

    fn fail(&mut self, err: MappingError) -> Result<(), Halt> {
        debug!("{err}");
        self.errors.push(err);
        match self.policy {
            ErrorPolicy::FailFast => Err(Halt),
            ErrorPolicy::CollectAll => Ok(()),
        }
    }

    /// Map a complex type; the flag tells whether any scalar inside it was
    /// taken from the message.
    fn complex(
        &mut self,
        spec: &ComplexTypeSpec,
        scope: &Scope<'_, '_>,
        path: &str,
    ) -> Result<(Record, bool), Halt> {
        let mut record = Record::with_capacity(spec.fields.len());
        let mut sourced = false;
        for field in &spec.fields {
            let path = if path.is_empty() {
                field.name.clone()
            } else {
                format!("{path}.{}", field.name)
            };
            let value = match &field.kind {
                FieldKind::Scalar(rule) => match resolve_scalar(rule, &path, scope) {
                    Ok(resolved) => {
                        sourced |= resolved.provenance == Provenance::Message;
                        self.provenance.push((path, resolved.provenance));
                        resolved.value
                    }
                    Err(err) => {
                        self.fail(err)?;
                        continue;
                    }
                },
                FieldKind::Complex {
                    spec,
                    nullable: false,
                } => {
                    let (nested, from_message) = self.complex(spec, scope, &path)?;
                    sourced |= from_message;
                    Value::Record(nested)
                }
                FieldKind::Complex {
                    spec,
                    nullable: true,
                } => match self.nullable(spec, scope, &path)? {
                    Some(nested) => {
                        sourced = true;
                        Value::Record(nested)
                    }
                    None => Value::Null,
                },
                FieldKind::Each(spec) => {
                    let (items, from_message) = self.each(spec, scope, &path)?;
                    sourced |= from_message;
                    Value::List(items)
                }
            };
            record.insert(field.name.clone(), value);
        }
        Ok((record, sourced))
    }

    /// Map a nullable complex type. Its fields are resolved on the side:
    /// when nothing in it came from the message it is absent, and neither
    /// its provenance nor its errors are kept.
    fn nullable(
        &mut self,
        spec: &ComplexTypeSpec,
        scope: &Scope<'_, '_>,
        path: &str,
    ) -> Result<Option<Record>, Halt> {
        let mut inner = Walk::new(ErrorPolicy::CollectAll);
        let (nested, from_message) = inner.complex(spec, scope, path)?;
        // Text that failed to convert is still text from the message
        let present = from_message
            || inner
                .errors
                .iter()
                .any(|err| matches!(err, MappingError::Conversion { .. }));
        if !present {
            trace!("{path}: absent, mapped to null");
            return Ok(None);
        }
        self.provenance.append(&mut inner.provenance);
        for err in inner.errors {
            self.fail(err)?;
        }
        Ok(Some(nested))
    }

    fn each(
        &mut self,
        spec: &ComplexTypeSpec,
        scope: &Scope<'_, '_>,
        path: &str,
    ) -> Result<(Vec<Value>, bool), Halt> {
        let Some(id) = spec.base.and_then(|base| base.segment) else {
            return Ok((Vec::new(), false));
        };
        let occurrences = scope.occurrences(id);
        trace!("{path}: {} occurrence(s) of {id}", occurrences.len());
        let mut items = Vec::with_capacity(occurrences.len());
        let mut sourced = false;
        for (n, scope) in occurrences.iter().enumerate() {
            let (record, from_message) = self.complex(spec, scope, &format!("{path}[{n}]"))?;
            sourced |= from_message;
            items.push(Value::Record(record));
        }
        Ok((items, sourced))
    }
}

/// A compiled mapping: the root destination type plus the order groups to
/// assemble from each message. Immutable and shareable across threads.
#[derive(Debug, Clone)]
pub struct MappingSpec {
    root: Arc<ComplexTypeSpec>,
    orders: Vec<OrderGroupSpec>,
}

impl MappingSpec {
    /// Anchor and check a root type. Every address must end up absolute.
    pub fn new(root: ComplexTypeSpec) -> Result<Self, SpecError> {
        let name = root.name.clone();
        let root = root.anchored(None, &name)?;
        check_anchored(&root, &name)?;
        Ok(MappingSpec {
            root: Arc::new(root),
            orders: Vec::new(),
        })
    }

    pub fn with_orders(mut self, orders: Vec<OrderGroupSpec>) -> Self {
        self.orders = orders;
        self
    }

    pub fn root(&self) -> &ComplexTypeSpec {
        &self.root
    }

    pub fn orders(&self) -> &[OrderGroupSpec] {
        &self.orders
    }

    /// Map a message to a record.
    pub fn map(&self, message: &Message<'_>, policy: ErrorPolicy) -> Result<Record, MappingErrors> {
        self.map_traced(message, policy).map(|mapping| mapping.record)
    }

    /// Map a message, keeping the provenance of every scalar field.
    pub fn map_traced(
        &self,
        message: &Message<'_>,
        policy: ErrorPolicy,
    ) -> Result<Mapping, MappingErrors> {
        let mut walk = Walk::new(policy);
        let mapped = walk.complex(&self.root, &Scope::whole(message), "");
        match mapped {
            Ok((record, _)) if walk.errors.is_empty() => Ok(Mapping {
                record,
                provenance: walk.provenance,
            }),
            _ => Err(MappingErrors(walk.errors)),
        }
    }
}

fn check_anchored(spec: &ComplexTypeSpec, path: &str) -> Result<(), SpecError> {
    for field in &spec.fields {
        let path = format!("{path}.{}", field.name);
        match &field.kind {
            FieldKind::Scalar(rule) => {
                let conditions = rule
                    .candidates()
                    .iter()
                    .map(|c| &c.condition)
                    .chain(rule.defaults().conditional.iter().map(|(c, _)| c));
                let addresses = rule
                    .candidates()
                    .iter()
                    .map(|c| &c.address)
                    .chain(conditions.flat_map(|c| c.addresses()));
                for address in addresses {
                    if address.is_relative() {
                        return Err(SpecError::Unanchored {
                            path,
                            address: address.to_string(),
                        });
                    }
                }
            }
            FieldKind::Complex { spec, .. } => check_anchored(spec, &path)?,
            FieldKind::Each(spec) => {
                let segment_base = spec
                    .base
                    .filter(|base| base.level() == Level::Segment && !base.is_relative());
                if segment_base.is_none() {
                    return Err(SpecError::invalid(
                        &path,
                        "repeated records need a segment as their base",
                    ));
                }
                check_anchored(spec, &path)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{CandidateRule, FieldRule};
    use pretty_assertions::assert_eq;
    use segmap_cond::Condition;
    use segmap_type::Converter;

    const ADT: &str = "MSH|^~\\&|SRC|FAC|DST|HOSP|202501010101||ADT^A01|123|P|2.5\r\
                       PID|1||MRN123||DOE^JOHN||19800115|M|||1 MAIN ST^^TOWN^ST^12345~PO BOX 9^^CITY||||||\r\
                       PV1|1|R|CCU^101^A\r\
                       NK1|1|DOE^JANE|SPO\r\
                       NK1|2|DOE^JIM|CHD";

    fn addr(s: &str) -> FieldAddress {
        FieldAddress::parse(s).unwrap()
    }

    fn cond(s: &str) -> Condition {
        Condition::parse(s).unwrap()
    }

    fn scalar(rule: FieldRule) -> ScalarRule {
        match rule.kind {
            FieldKind::Scalar(rule) => rule,
            other => panic!("scalar expected, got {other:?}"),
        }
    }

    fn message() -> Message<'static> {
        Message::parse(ADT).unwrap()
    }

    #[test]
    fn first_non_empty_candidate_wins() {
        let msg = Message::parse(
            "MSH|^~\\&|A\rPID|1|||||||||||||555-WORK||||||||||||||||||||||||||555-OTHER",
        )
        .unwrap();
        let rule = scalar(
            FieldRule::scalar("phone")
                .candidate(CandidateRule::new(addr("PID.13"), Converter::Text))
                .candidate(CandidateRule::new(addr("PID.14"), Converter::Text))
                .candidate(CandidateRule::new(addr("PID.40"), Converter::Text))
                .build()
                .unwrap(),
        );
        let resolved = resolve_field(&rule, "phone", &msg).unwrap();
        assert_eq!(resolved.value, Value::from("555-WORK"));
        assert_eq!(resolved.provenance, Provenance::Message);
        assert_eq!(resolved.address, Some(addr("PID.14")));
    }

    #[test]
    fn false_condition_skips_candidate() {
        let rule = scalar(
            FieldRule::scalar("unit")
                .candidate(
                    CandidateRule::new(addr("PV1.3.1"), Converter::Text).when(cond("PV1.2 == I")),
                )
                .candidate(CandidateRule::new(addr("PV1.3.2"), Converter::Text))
                .build()
                .unwrap(),
        );
        let resolved = resolve_field(&rule, "unit", &message()).unwrap();
        assert_eq!(resolved.value, Value::from("101"));
    }

    #[test]
    fn required_first_candidate() {
        let rule = scalar(
            FieldRule::scalar("ssn")
                .candidate(CandidateRule::new(addr("PID.19"), Converter::Text).required())
                .default(Value::from("unused"))
                .build()
                .unwrap(),
        );
        assert_eq!(
            resolve_field(&rule, "ssn", &message()),
            Err(MappingError::RequiredFieldMissing {
                field: "ssn".into(),
                address: addr("PID.19"),
            })
        );
    }

    #[test]
    fn candidate_default_applies_when_its_condition_holds() {
        let rule = scalar(
            FieldRule::scalar("room")
                .candidate(
                    CandidateRule::new(addr("PV1.3.4"), Converter::Text)
                        .when(cond("PV1.3.1 == CCU"))
                        .or_default(Value::from("ICU-BED")),
                )
                .default(Value::from("NONE"))
                .build()
                .unwrap(),
        );
        let resolved = resolve_field(&rule, "room", &message()).unwrap();
        assert_eq!(resolved.value, Value::from("ICU-BED"));
        assert_eq!(resolved.provenance, Provenance::CandidateDefault);
    }

    #[test]
    fn default_chain_order() {
        let build = |conditional: bool, unconditional: bool| {
            let mut b = FieldRule::scalar("priority")
                .candidate(CandidateRule::new(addr("PV1.40"), Converter::Integer));
            if conditional {
                b = b
                    .default_when(cond("PV1.2 == I"), Value::Integer(1))
                    .default_when(cond("PV1.3.1 == CCU"), Value::Integer(999))
                    .default_when(cond("PV1.2 == R"), Value::Integer(5));
            }
            if unconditional {
                b = b.default(Value::Integer(50));
            }
            scalar(b.build().unwrap())
        };
        let msg = message();
        let get = |rule: &ScalarRule| resolve_field(rule, "priority", &msg).unwrap();

        let r = get(&build(true, true));
        assert_eq!((r.value, r.provenance), (Value::Integer(999), Provenance::ConditionalDefault));
        let r = get(&build(false, true));
        assert_eq!((r.value, r.provenance), (Value::Integer(50), Provenance::UnconditionalDefault));
        let r = get(&build(false, false));
        assert_eq!((r.value, r.provenance), (Value::Integer(0), Provenance::Zero));
    }

    #[test]
    fn conditional_only_ignores_candidates() {
        let rule = scalar(
            FieldRule::scalar("mrn")
                .candidate(CandidateRule::new(addr("PID.3"), Converter::Text))
                .default_when(cond("PV1.2 == E"), Value::from("EMERGENCY"))
                .default_when(cond("PV1.2 == I"), Value::from("INPATIENT"))
                .conditional_only()
                .build()
                .unwrap(),
        );
        let resolved = resolve_field(&rule, "mrn", &message()).unwrap();
        assert_eq!(resolved.value, Value::from(""));
        assert_eq!(resolved.provenance, Provenance::Zero);
    }

    #[test]
    fn conversion_errors_name_field_type_and_address() {
        let rule = scalar(
            FieldRule::scalar("dob")
                .candidate(CandidateRule::new(addr("PID.5.1"), Converter::Integer))
                .build()
                .unwrap(),
        );
        let err = resolve_field(&rule, "dob", &message()).unwrap_err();
        assert_eq!(
            err,
            MappingError::Conversion {
                field: "dob".into(),
                target: "integer".into(),
                address: addr("PID.5.1"),
                raw: "DOE".into(),
                reason: "invalid digit found in string".into(),
            }
        );
    }

    #[test]
    fn repeated_fields_convert_every_repetition() {
        let rule = scalar(
            FieldRule::scalar("cities")
                .candidate(CandidateRule::new(addr("PID.11.3"), Converter::Text))
                .repeated()
                .build()
                .unwrap(),
        );
        let resolved = resolve_field(&rule, "cities", &message()).unwrap();
        assert_eq!(
            resolved.value,
            Value::List(vec![Value::from("TOWN"), Value::from("CITY")])
        );
    }

    fn kin_spec() -> ComplexTypeSpec {
        let kin = ComplexTypeSpec::builder("NextOfKin")
            .base(addr("NK1"))
            .field(
                FieldRule::scalar("name")
                    .candidate(CandidateRule::new(addr("2.2"), Converter::Text))
                    .build()
                    .unwrap(),
            )
            .field(
                FieldRule::scalar("relationship")
                    .candidate(CandidateRule::new(addr("3"), Converter::Text))
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();
        let address = ComplexTypeSpec::builder("Address")
            .base(addr("PID.11"))
            .field(
                FieldRule::scalar("country")
                    .candidate(CandidateRule::new(addr("6"), Converter::Text))
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();
        ComplexTypeSpec::builder("Admission")
            .field(FieldRule::each("kin", kin))
            .field(FieldRule::nullable("address", address))
            .build()
            .unwrap()
    }

    #[test]
    fn each_resolves_once_per_segment_and_nullable_collapses() {
        let spec = MappingSpec::new(kin_spec()).unwrap();
        let mapping = spec.map_traced(&message(), ErrorPolicy::CollectAll).unwrap();
        let kin = mapping.record.get("kin").and_then(Value::as_list).unwrap();
        assert_eq!(kin.len(), 2);
        let second = kin[1].as_record().unwrap();
        assert_eq!(second.get("name"), Some(&Value::from("JIM")));
        assert_eq!(second.get("relationship"), Some(&Value::from("CHD")));
        assert_eq!(mapping.record.get("address"), Some(&Value::Null));
        assert_eq!(
            mapping.provenance[0],
            ("kin[0].name".to_string(), Provenance::Message)
        );
    }

    #[test]
    fn error_policy_controls_collection() {
        let spec = ComplexTypeSpec::builder("Broken")
            .field(
                FieldRule::scalar("a")
                    .candidate(CandidateRule::new(addr("PID.5.1"), Converter::Integer))
                    .build()
                    .unwrap(),
            )
            .field(
                FieldRule::scalar("b")
                    .candidate(CandidateRule::new(addr("PID.30"), Converter::Text).required())
                    .build()
                    .unwrap(),
            )
            .field(
                FieldRule::scalar("c")
                    .candidate(CandidateRule::new(addr("PID.3"), Converter::Text))
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();
        let spec = MappingSpec::new(spec).unwrap();
        let all = spec.map(&message(), ErrorPolicy::CollectAll).unwrap_err();
        let fields: Vec<_> = all.iter().map(MappingError::field).collect();
        assert_eq!(fields, vec!["a", "b"]);
        let first = spec.map(&message(), ErrorPolicy::FailFast).unwrap_err();
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn unanchored_addresses_are_rejected() {
        let spec = ComplexTypeSpec::builder("Loose")
            .field(
                FieldRule::scalar("x")
                    .candidate(CandidateRule::new(addr("3"), Converter::Text))
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();
        let err = MappingSpec::new(spec).unwrap_err();
        assert!(matches!(err, SpecError::Unanchored { path, .. } if path == "Loose.x"));
    }

    #[test]
    fn each_needs_a_segment_base() {
        let inner = ComplexTypeSpec::builder("Inner")
            .base(addr("PID.11"))
            .field(
                FieldRule::scalar("x")
                    .candidate(CandidateRule::new(addr("1"), Converter::Text))
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();
        let outer = ComplexTypeSpec::builder("Outer")
            .field(FieldRule::each("items", inner))
            .build()
            .unwrap();
        assert!(matches!(
            MappingSpec::new(outer),
            Err(SpecError::Invalid { .. })
        ));
    }
}
