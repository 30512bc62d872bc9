use std::collections::HashMap;
use std::fmt;
use std::mem;

use log::{debug, trace};
use segmap_lexer::{SegmentId, SegmentLine};
use segmap_path::Message;

use crate::spec::{OrderGroupSpec, Role};

/// One order: its trigger segment and the segments that belong to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderGroup<'a> {
    pub order_type: &'a str,
    pub primary: SegmentLine<'a>,
    pub details: HashMap<SegmentId, SegmentLine<'a>>,
    pub repeatable: HashMap<SegmentId, Vec<SegmentLine<'a>>>,
}

impl<'a> OrderGroup<'a> {
    fn open(spec: &'a OrderGroupSpec, primary: SegmentLine<'a>) -> Self {
        OrderGroup {
            order_type: &spec.order_type,
            primary,
            details: HashMap::new(),
            repeatable: HashMap::new(),
        }
    }

    pub fn detail(&self, id: SegmentId) -> Option<&SegmentLine<'a>> {
        self.details.get(&id)
    }

    /// Repeatable segments with the given id, in message order.
    pub fn repeated(&self, id: SegmentId) -> &[SegmentLine<'a>] {
        self.repeatable.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every segment of the group in message order, trigger first.
    pub fn segments(&self) -> Vec<SegmentLine<'a>> {
        let mut all: Vec<_> = std::iter::once(self.primary)
            .chain(self.details.values().copied())
            .chain(self.repeatable.values().flatten().copied())
            .collect();
        all.sort_by_key(|segment| segment.position);
        all
    }
}

/// How strictly assembly treats segments it does not expect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AssemblyMode {
    /// Unexpected segments are skipped silently
    #[default]
    Lenient,
    /// Unexpected segments are skipped and reported
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// A segment inside a group that is neither detail nor repeatable
    Ignored,
    /// A second detail segment replaced the first
    OverwrittenDetail,
}

/// A non-fatal observation made in strict mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyWarning {
    pub kind: WarningKind,
    pub segment: SegmentId,
    /// Position of the segment in the message (0-based)
    pub position: usize,
    /// Order type of the group the segment was seen in
    pub order_type: String,
}

impl fmt::Display for AssemblyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            WarningKind::Ignored => write!(
                f,
                "segment {} at position {} is not part of order group {:?}",
                self.segment, self.position, self.order_type
            ),
            WarningKind::OverwrittenDetail => write!(
                f,
                "segment {} at position {} replaces an earlier {} in order group {:?}",
                self.segment, self.position, self.segment, self.order_type
            ),
        }
    }
}

enum State<'a> {
    Idle,
    InGroup(OrderGroup<'a>),
}

/// Lazily groups a stream of segments into [`OrderGroup`]s.
///
/// A trigger closes the open group and opens a new one; the end of the
/// stream closes the last group. Segments seen before the first trigger
/// belong to the surrounding message and are skipped.
pub struct OrderGroups<'a, I> {
    spec: &'a OrderGroupSpec,
    segments: I,
    state: State<'a>,
    mode: AssemblyMode,
    warnings: Vec<AssemblyWarning>,
}

impl<'a, I> OrderGroups<'a, I>
where
    I: Iterator<Item = SegmentLine<'a>>,
{
    pub fn new(spec: &'a OrderGroupSpec, segments: I, mode: AssemblyMode) -> Self {
        OrderGroups {
            spec,
            segments,
            state: State::Idle,
            mode,
            warnings: Vec::new(),
        }
    }

    /// Warnings recorded so far (always empty in lenient mode).
    pub fn warnings(&self) -> &[AssemblyWarning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<AssemblyWarning> {
        self.warnings
    }

    fn warn(&mut self, kind: WarningKind, segment: &SegmentLine<'a>) {
        if self.mode == AssemblyMode::Strict {
            self.warnings.push(AssemblyWarning {
                kind,
                segment: segment.id,
                position: segment.position,
                order_type: self.spec.order_type.clone(),
            });
        }
    }

    fn add(&mut self, segment: SegmentLine<'a>) {
        let State::InGroup(group) = &mut self.state else {
            trace!("{} outside any {} group", segment.id, self.spec.order_type);
            return;
        };
        match self.spec.role(segment.id) {
            Role::Detail => {
                if group.details.insert(segment.id, segment).is_some() {
                    self.warn(WarningKind::OverwrittenDetail, &segment);
                }
            }
            Role::Repeatable => group.repeatable.entry(segment.id).or_default().push(segment),
            Role::Other => self.warn(WarningKind::Ignored, &segment),
            Role::Trigger => {}
        }
    }
}

impl<'a, I> Iterator for OrderGroups<'a, I>
where
    I: Iterator<Item = SegmentLine<'a>>,
{
    type Item = OrderGroup<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(segment) = self.segments.next() {
            if segment.id != self.spec.trigger {
                self.add(segment);
                continue;
            }
            let opened = State::InGroup(OrderGroup::open(self.spec, segment));
            if let State::InGroup(closed) = mem::replace(&mut self.state, opened) {
                debug!("closing {} group at {}", closed.order_type, closed.primary.position);
                return Some(closed);
            }
        }
        match mem::replace(&mut self.state, State::Idle) {
            State::InGroup(last) => Some(last),
            State::Idle => None,
        }
    }
}

/// Groups collected from one message.
#[derive(Debug, Clone, Default)]
pub struct Assembly<'a> {
    pub groups: Vec<OrderGroup<'a>>,
    pub warnings: Vec<AssemblyWarning>,
}

/// Group every segment of `message` according to `spec`.
pub fn assemble<'a>(
    message: &Message<'a>,
    spec: &'a OrderGroupSpec,
    mode: AssemblyMode,
) -> Assembly<'a> {
    let mut iter = OrderGroups::new(spec, message.segments().iter().copied(), mode);
    let groups: Vec<_> = iter.by_ref().collect();
    debug!("assembled {} {} groups", groups.len(), spec.order_type);
    Assembly {
        groups,
        warnings: iter.into_warnings(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segmap_lexer::{Delimiters, Segments};

    const PHARMACY: &str = "MSH|^~\\&|SRC|FAC|DST|HOSP|202501010101||OMP^O09|1|P|2.5\r\
                            PID|1||MRN123\r\
                            ORC|NW|A1\r\
                            RXO|DRUG1\r\
                            RXR|PO\r\
                            RXR|IV\r\
                            ORC|NW|A2\r\
                            RXO|DRUG2\r\
                            RXR|IM\r\
                            RXR|SC";

    fn id(s: &str) -> SegmentId {
        SegmentId::new(s).unwrap()
    }

    fn pharmacy() -> OrderGroupSpec {
        OrderGroupSpec::builder("pharmacy", id("ORC"))
            .detail(id("RXO"))
            .repeatable(id("RXR"))
            .build()
            .unwrap()
    }

    #[test]
    fn groups_are_emitted_lazily() {
        let spec = pharmacy();
        let mut groups = OrderGroups::new(
            &spec,
            Segments::new(PHARMACY, &Delimiters::DEFAULT),
            AssemblyMode::Lenient,
        );
        let first = groups.next().unwrap();
        assert_eq!(first.primary.text, "ORC|NW|A1");
        assert_eq!(first.repeated(id("RXR")).len(), 2);
        let second = groups.next().unwrap();
        assert_eq!(second.detail(id("RXO")).map(|s| s.text), Some("RXO|DRUG2"));
        assert!(groups.next().is_none());
        assert!(groups.next().is_none());
    }

    #[test]
    fn segments_are_listed_in_message_order() {
        let spec = pharmacy();
        let message = Message::parse(PHARMACY).unwrap();
        let assembly = assemble(&message, &spec, AssemblyMode::Lenient);
        let texts: Vec<_> = assembly.groups[0].segments().iter().map(|s| s.text).collect();
        assert_eq!(texts, vec!["ORC|NW|A1", "RXO|DRUG1", "RXR|PO", "RXR|IV"]);
    }

    #[test]
    fn strict_mode_reports_ignored_and_overwritten_segments() {
        let spec = pharmacy();
        let text = "MSH|^~\\&|A\rPID|1\rORC|NW\rRXO|A\rNTE|1|note\rRXO|B";
        let message = Message::parse(text).unwrap();

        let lenient = assemble(&message, &spec, AssemblyMode::Lenient);
        assert!(lenient.warnings.is_empty());
        assert_eq!(
            lenient.groups[0].detail(id("RXO")).map(|s| s.text),
            Some("RXO|B")
        );

        let strict = assemble(&message, &spec, AssemblyMode::Strict);
        let kinds: Vec<_> = strict.warnings.iter().map(|w| (w.kind, w.position)).collect();
        assert_eq!(
            kinds,
            vec![(WarningKind::Ignored, 4), (WarningKind::OverwrittenDetail, 5)]
        );
        assert_eq!(
            strict.warnings[0].to_string(),
            "segment NTE at position 4 is not part of order group \"pharmacy\""
        );
    }
}
