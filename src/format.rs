//! Journal layouts.
//!
//! Each classified event is written as a bracketed record: `>>` opens a record, the next word
//! names the event kind (`malloc` or `free`) and `<<` closes it. Offline tooling pairs the records
//! by allocated address.

use crate::classify::Classification;
use crate::evidence::{AllocationEvidence, DeallocationEvidence};
use itertools::Itertools;
use strum_macros::{Display, EnumString, IntoStaticStr};

const HEADER_STARS: &str = "**************************************\n\n";
const SEPARATOR: &str = "---------------------------------\n";
const FOOTER: &str = "======================================\n\n";
const RECORD_START: &str = ">>";
const RECORD_END: &str = "<<\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, IntoStaticStr)]
pub enum FormatKind {
    /// Short records, every halt is followed by its raw stack.
    #[strum(serialize = "compact")]
    Compact,
    /// Records with process identity and the raw stack of an allocation.
    #[strum(serialize = "detailed")]
    Detailed,
}

impl FormatKind {
    pub fn policy(self) -> Box<dyn EvidenceFormat> {
        match self {
            FormatKind::Compact => Box::new(Compact),
            FormatKind::Detailed => Box::new(Detailed),
        }
    }
}

/// Renders evidence into journal text.
pub trait EvidenceFormat {
    /// Whether a raw stack snapshot must be captured for a halt of the given kind.
    fn wants_snapshot(&self, _kind: Classification) -> bool {
        false
    }

    /// Run header, `trigger_output` is the engine answer to the trigger command.
    fn header(&self, trigger_output: &[String]) -> String {
        let mut out = lines(trigger_output, "");
        out.push_str(HEADER_STARS);
        out.push_str(SEPARATOR);
        out.push('g');
        out
    }

    fn allocation(&self, evidence: &AllocationEvidence) -> String;

    fn deallocation(&self, evidence: &DeallocationEvidence) -> String;

    /// Text written after every halt, classified or not.
    fn halt_trailer(&self, _snapshot: Option<&[String]>) -> Option<String> {
        None
    }

    fn footer(&self) -> String {
        FOOTER.to_string()
    }
}

fn lines<S: AsRef<str>>(src: impl IntoIterator<Item = S>, prefix: &str) -> String {
    src.into_iter()
        .map(|line| format!("{prefix}{}\n", line.as_ref()))
        .join("")
}

fn record(kind: Classification, body: String) -> String {
    format!("{RECORD_START}{kind}\n{body}{RECORD_END}")
}

/// Layout of short records.
#[derive(Debug, Default)]
pub struct Compact;

impl EvidenceFormat for Compact {
    fn wants_snapshot(&self, _kind: Classification) -> bool {
        true
    }

    fn allocation(&self, evidence: &AllocationEvidence) -> String {
        record(Classification::Allocation, lines(&evidence.return_value, ""))
    }

    fn deallocation(&self, evidence: &DeallocationEvidence) -> String {
        record(Classification::Deallocation, lines(evidence.lines(), ""))
    }

    fn halt_trailer(&self, snapshot: Option<&[String]>) -> Option<String> {
        let mut out = "+\n".to_string();
        out.push_str(&lines(snapshot.unwrap_or_default(), " "));
        out.push_str(SEPARATOR);
        Some(out)
    }
}

/// Layout of detailed records.
#[derive(Debug, Default)]
pub struct Detailed;

impl EvidenceFormat for Detailed {
    /// Only an allocation record carries the raw stack.
    fn wants_snapshot(&self, kind: Classification) -> bool {
        kind == Classification::Allocation
    }

    fn allocation(&self, evidence: &AllocationEvidence) -> String {
        let mut body = lines(
            evidence.process.iter().chain(evidence.image.iter()),
            "-> ",
        );
        body.push_str(&lines(&evidence.return_value, "-> "));
        if let Some(stack) = &evidence.stack {
            body.push_str("{{\n");
            body.push_str(&lines(stack, " "));
            body.push_str("}}\n");
        }
        format!("\n{}", record(Classification::Allocation, body))
    }

    fn deallocation(&self, evidence: &DeallocationEvidence) -> String {
        format!(
            "\n{}",
            record(Classification::Deallocation, lines(evidence.lines(), ""))
        )
    }
}
