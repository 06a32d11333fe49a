use crate::config::Symbols;
use strum_macros::Display;

/// Kind of a halt, decided by the top frames of the current stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Classification {
    #[strum(serialize = "malloc")]
    Allocation,
    #[strum(serialize = "free")]
    Deallocation,
    #[strum(serialize = "unclassified")]
    Unclassified,
}

impl Classification {
    pub fn is_matched(self) -> bool {
        self != Classification::Unclassified
    }
}

/// Classify a halt by scanning at most `symbols.max_frames` frames top-down.
///
/// The first frame that mentions an allocation or a deallocation entry symbol decides the
/// result. Allocation symbols are checked before deallocation symbols inside a single frame.
pub fn classify(stack: &[String], symbols: &Symbols) -> Classification {
    let mentions = |frame: &str, set: &[String]| set.iter().any(|sym| frame.contains(sym.as_str()));

    stack
        .iter()
        .take(symbols.max_frames)
        .find_map(|frame| {
            if mentions(frame, &symbols.allocation) {
                Some(Classification::Allocation)
            } else if mentions(frame, &symbols.deallocation) {
                Some(Classification::Deallocation)
            } else {
                None
            }
        })
        .unwrap_or(Classification::Unclassified)
}
