//! Evidence collection for classified halts.
//!
//! Allocation halts are walked forward until control leaves every nested allocator frame, then
//! the return register holds the allocated address. Deallocation halts are resolved in place by
//! a stack dump that carries frame parameters.

use crate::channel::CommandChannel;
use crate::classify::{classify, Classification};
use crate::config::{Commands, SessionConfig, Symbols};
use crate::error::Error;
use crate::ph_debug;

/// Diagnostic payload of an allocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllocationEvidence {
    /// Return register read after the allocator returns.
    pub return_value: Vec<String>,
    /// Image name line of the current process, without indentation.
    pub image: Option<String>,
    /// Process block header line.
    pub process: Option<String>,
    /// Raw stack captured at halt, before any step-out.
    pub stack: Option<Vec<String>>,
    /// Number of step-outs it took to leave the allocator.
    pub step_outs: usize,
}

/// A free routine frame and its labeled parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct FreeSite {
    pub frame: String,
    pub parameters: Vec<String>,
}

/// Diagnostic payload of a deallocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeallocationEvidence {
    pub sites: Vec<FreeSite>,
}

impl DeallocationEvidence {
    /// Evidence lines in the dump order: each free frame followed by its parameters.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.sites.iter().flat_map(|site| {
            std::iter::once(site.frame.as_str()).chain(site.parameters.iter().map(String::as_str))
        })
    }
}

/// Runs evidence protocols against a halted target.
pub struct Collector<'a, C: CommandChannel> {
    channel: &'a mut C,
    commands: &'a Commands,
    symbols: &'a Symbols,
    step_out_limit: usize,
}

impl<'a, C: CommandChannel> Collector<'a, C> {
    pub fn new(channel: &'a mut C, config: &'a SessionConfig) -> Self {
        Self {
            channel,
            commands: &config.commands,
            symbols: &config.symbols,
            step_out_limit: config.step_out_limit,
        }
    }

    /// Collect evidence of an allocation.
    ///
    /// Target is stepped out of the allocator, so it is left at the allocator caller.
    ///
    /// # Arguments
    ///
    /// * `stack`: bounded stack that was classified as an allocation
    /// * `snapshot`: raw stack captured before classification, if any
    pub fn allocation(
        &mut self,
        stack: Vec<String>,
        snapshot: Option<Vec<String>>,
    ) -> Result<AllocationEvidence, Error> {
        let process_info = self.channel.execute(&self.commands.process)?;
        let (image, process) = process_identity(&process_info, self.symbols);

        let mut stack = stack;
        let mut step_outs = 0;
        while classify(&stack, self.symbols) == Classification::Allocation {
            if step_outs == self.step_out_limit {
                return Err(Error::StepOutLimit(step_outs));
            }
            self.channel.execute(&self.commands.step_out)?;
            step_outs += 1;
            stack = self.channel.execute(&self.commands.bounded_stack)?;
        }
        ph_debug!("allocator left after {step_outs} step-outs");

        let return_value = self.channel.execute(&self.commands.return_register)?;

        Ok(AllocationEvidence {
            return_value,
            image,
            process,
            stack: snapshot,
            step_outs,
        })
    }

    /// Collect evidence of a deallocation, target execution state is not changed.
    pub fn deallocation(&mut self) -> Result<DeallocationEvidence, Error> {
        let dump = self.channel.execute(&self.commands.parameter_stack)?;
        Ok(DeallocationEvidence {
            sites: free_sites(&dump, self.symbols),
        })
    }
}

/// Find image name and process header lines in a process query output.
pub fn process_identity(lines: &[String], symbols: &Symbols) -> (Option<String>, Option<String>) {
    let image = lines
        .iter()
        .find(|l| l.contains(symbols.image_label.as_str()))
        .map(|l| l.trim().to_string());
    let process = lines
        .iter()
        .find(|l| l.starts_with(symbols.process_prefix.as_str()))
        .cloned();
    (image, process)
}

/// Scan a parameter stack dump for free routine frames and their first parameter.
///
/// Scan stops at the first line of the second stack segment. A frame line opens a site if it
/// mentions the free routine, parameter lines are attached to the last opened site until a
/// frame that doesn't mention the free routine is met.
pub fn free_sites(dump: &[String], symbols: &Symbols) -> Vec<FreeSite> {
    let mut sites: Vec<FreeSite> = vec![];
    let mut interesting = false;

    for line in dump {
        if line.starts_with(symbols.segment_end_prefix.as_str()) {
            break;
        }

        if line.starts_with(symbols.frame_prefix.as_str()) {
            interesting = line.contains(symbols.free_routine.as_str());
            if interesting {
                sites.push(FreeSite {
                    frame: line.clone(),
                    parameters: vec![],
                });
            }
        } else if interesting && line.contains(symbols.parameter_label.as_str()) {
            if let Some(site) = sites.last_mut() {
                site.parameters.push(line.clone());
            }
        }
    }

    sites
}
