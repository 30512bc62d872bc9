// Resolution rules for destination fields

use std::sync::Arc;

use segmap_cond::Condition;
use segmap_path::{AddressError, FieldAddress};
use segmap_type::{Converter, Value};

use crate::error::SpecError;

/// One place a destination field may take its value from.
#[derive(Debug, Clone)]
pub struct CandidateRule {
    pub address: FieldAddress,
    /// Checked before the address is resolved
    pub condition: Condition,
    pub converter: Converter,
    /// Only meaningful on the first candidate of a field
    pub required: bool,
    /// Used when the condition holds but the address is absent or empty
    pub default: Option<Value>,
}

impl CandidateRule {
    pub fn new(address: FieldAddress, converter: Converter) -> Self {
        CandidateRule {
            address,
            condition: Condition::Always,
            converter,
            required: false,
            default: None,
        }
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn or_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    fn rebase(&self, base: &FieldAddress) -> Result<Self, AddressError> {
        Ok(CandidateRule {
            address: self.address.rebase(base)?,
            condition: self.condition.rebase(base)?,
            ..self.clone()
        })
    }
}

/// Fallback values for a field no candidate supplied.
#[derive(Debug, Clone, Default)]
pub struct Defaults {
    /// Checked in order; the first whose condition holds wins
    pub conditional: Vec<(Condition, Value)>,
    pub unconditional: Option<Value>,
}

/// Candidates and defaults of a scalar (or repeated scalar) field.
#[derive(Debug, Clone)]
pub struct ScalarRule {
    candidates: Vec<CandidateRule>,
    defaults: Defaults,
    conditional_only: bool,
    repeated: bool,
}

impl ScalarRule {
    pub fn candidates(&self) -> &[CandidateRule] {
        &self.candidates
    }

    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    /// When set, candidates are never read and only the defaults apply.
    pub fn is_conditional_only(&self) -> bool {
        self.conditional_only
    }

    /// When set, every repetition of the winning field is converted.
    pub fn is_repeated(&self) -> bool {
        self.repeated
    }

    /// Zero value of the destination type, taken from the first candidate.
    pub fn zero(&self) -> Value {
        if self.repeated {
            return Value::List(Vec::new());
        }
        self.candidates
            .first()
            .map_or(Value::Null, |c| c.converter.zero())
    }

    fn rebase(&self, base: &FieldAddress) -> Result<Self, AddressError> {
        let candidates = self
            .candidates
            .iter()
            .map(|c| c.rebase(base))
            .collect::<Result<_, _>>()?;
        let conditional = self
            .defaults
            .conditional
            .iter()
            .map(|(cond, value)| Ok((cond.rebase(base)?, value.clone())))
            .collect::<Result<_, AddressError>>()?;
        Ok(ScalarRule {
            candidates,
            defaults: Defaults {
                conditional,
                unconditional: self.defaults.unconditional.clone(),
            },
            ..*self
        })
    }
}

/// The shape of a destination field.
#[derive(Debug, Clone)]
pub enum FieldKind {
    Scalar(ScalarRule),
    /// A nested record; `nullable` fields become null when none of their
    /// children came from the message
    Complex {
        spec: Arc<ComplexTypeSpec>,
        nullable: bool,
    },
    /// One nested record per occurrence of the spec's base segment
    Each(Arc<ComplexTypeSpec>),
}

/// A named destination field and how to resolve it.
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldRule {
    pub fn scalar(name: impl Into<String>) -> ScalarRuleBuilder {
        ScalarRuleBuilder {
            name: name.into(),
            rule: ScalarRule {
                candidates: Vec::new(),
                defaults: Defaults::default(),
                conditional_only: false,
                repeated: false,
            },
        }
    }

    pub fn complex(name: impl Into<String>, spec: impl Into<Arc<ComplexTypeSpec>>) -> Self {
        FieldRule {
            name: name.into(),
            kind: FieldKind::Complex {
                spec: spec.into(),
                nullable: false,
            },
        }
    }

    pub fn nullable(name: impl Into<String>, spec: impl Into<Arc<ComplexTypeSpec>>) -> Self {
        FieldRule {
            name: name.into(),
            kind: FieldKind::Complex {
                spec: spec.into(),
                nullable: true,
            },
        }
    }

    pub fn each(name: impl Into<String>, spec: impl Into<Arc<ComplexTypeSpec>>) -> Self {
        FieldRule {
            name: name.into(),
            kind: FieldKind::Each(spec.into()),
        }
    }

    fn anchored(&self, base: &FieldAddress, path: &str) -> Result<Self, SpecError> {
        let path = format!("{path}.{}", self.name);
        let kind = match &self.kind {
            FieldKind::Scalar(rule) => FieldKind::Scalar(
                rule.rebase(base)
                    .map_err(|source| rebase_error(&path, base, source))?,
            ),
            FieldKind::Complex { spec, nullable } => FieldKind::Complex {
                spec: Arc::new(spec.anchored(Some(base), &path)?),
                nullable: *nullable,
            },
            FieldKind::Each(spec) => FieldKind::Each(Arc::new(spec.anchored(Some(base), &path)?)),
        };
        Ok(FieldRule {
            name: self.name.clone(),
            kind,
        })
    }
}

fn rebase_error(path: &str, base: &FieldAddress, source: AddressError) -> SpecError {
    SpecError::Address {
        path: path.to_string(),
        notation: base.to_string(),
        source,
    }
}

/// Builds a scalar [`FieldRule`].
#[derive(Debug, Clone)]
pub struct ScalarRuleBuilder {
    name: String,
    rule: ScalarRule,
}

impl ScalarRuleBuilder {
    /// Add a candidate; candidates are tried in the order they are added.
    pub fn candidate(mut self, candidate: CandidateRule) -> Self {
        self.rule.candidates.push(candidate);
        self
    }

    /// Add a conditional default, after any added before it.
    pub fn default_when(mut self, condition: Condition, value: Value) -> Self {
        self.rule.defaults.conditional.push((condition, value));
        self
    }

    pub fn default(mut self, value: Value) -> Self {
        self.rule.defaults.unconditional = Some(value);
        self
    }

    pub fn conditional_only(mut self) -> Self {
        self.rule.conditional_only = true;
        self
    }

    pub fn repeated(mut self) -> Self {
        self.rule.repeated = true;
        self
    }

    pub fn build(self) -> Result<FieldRule, SpecError> {
        if self.rule.candidates.is_empty() {
            return Err(SpecError::NoCandidates { path: self.name });
        }
        Ok(FieldRule {
            name: self.name,
            kind: FieldKind::Scalar(self.rule),
        })
    }
}

/// A composite destination type.
///
/// Relative addresses of its fields (and inside their conditions) are
/// resolved against `base` when the spec is built. A spec whose base is
/// itself relative, or missing, is anchored by the spec that contains it.
#[derive(Debug, Clone)]
pub struct ComplexTypeSpec {
    pub name: String,
    pub base: Option<FieldAddress>,
    pub fields: Vec<FieldRule>,
}

impl ComplexTypeSpec {
    pub fn builder(name: impl Into<String>) -> ComplexTypeSpecBuilder {
        ComplexTypeSpecBuilder {
            spec: ComplexTypeSpec {
                name: name.into(),
                base: None,
                fields: Vec::new(),
            },
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldRule> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Resolve this spec's base against the base of the enclosing spec and
    /// rebase every field onto the result, if it is absolute.
    pub(crate) fn anchored(
        &self,
        outer: Option<&FieldAddress>,
        path: &str,
    ) -> Result<ComplexTypeSpec, SpecError> {
        let base = match (&self.base, outer) {
            (Some(own), Some(outer)) => Some(
                own.rebase(outer)
                    .map_err(|source| rebase_error(path, own, source))?,
            ),
            (Some(own), None) => Some(*own),
            (None, outer) => outer.copied(),
        };
        let fields = match base.filter(|b| !b.is_relative()) {
            Some(anchor) => self
                .fields
                .iter()
                .map(|field| field.anchored(&anchor, path))
                .collect::<Result<_, _>>()?,
            None => self.fields.clone(),
        };
        Ok(ComplexTypeSpec {
            name: self.name.clone(),
            base,
            fields,
        })
    }
}

/// Builds a [`ComplexTypeSpec`].
#[derive(Debug, Clone)]
pub struct ComplexTypeSpecBuilder {
    spec: ComplexTypeSpec,
}

impl ComplexTypeSpecBuilder {
    pub fn base(mut self, base: FieldAddress) -> Self {
        self.spec.base = Some(base);
        self
    }

    pub fn field(mut self, field: FieldRule) -> Self {
        self.spec.fields.push(field);
        self
    }

    pub fn build(self) -> Result<ComplexTypeSpec, SpecError> {
        let name = self.spec.name.clone();
        self.spec.anchored(None, &name)
    }
}
