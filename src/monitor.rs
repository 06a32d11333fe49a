//! Run loop of a triage session.
//!
//! Monitor moves through `Idle -> Armed -> closed` states, each transition consumes the previous
//! state:
//! - [`Monitor::arm`] loads engine extensions, opens the journal and writes the encoded tag into
//!   the trigger symbol
//! - [`Monitor::run`] processes the configured number of halts (one resume per halt) and closes
//!   the journal
//!
//! A failed engine command ends the run immediately. Journal is left as is in this case, without
//! footer and not closed, so the operator can see where the run stopped.

use crate::channel::CommandChannel;
use crate::classify::{classify, Classification};
use crate::config::SessionConfig;
use crate::error::Error;
use crate::evidence::Collector;
use crate::format::EvidenceFormat;
use crate::journal::Journal;
use crate::{ph_debug, ph_info, ph_warn, tag};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Monitor state.
pub trait State {}

/// Monitor is created but engine is not touched yet.
pub struct Idle;

impl State for Idle {}

/// Trigger is armed and journal is opened.
pub struct Armed;

impl State for Armed {}

/// Cooperative run cancellation, checked between halts.
#[derive(Clone, Default, Debug)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counters of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Processed halts.
    pub iterations: u32,
    pub allocations: u32,
    pub deallocations: u32,
    pub unclassified: u32,
    /// Run stopped by [`CancelToken`] before all iterations were done.
    pub cancelled: bool,
}

pub struct Monitor<C: CommandChannel, J: Journal, S: State> {
    config: SessionConfig,
    channel: C,
    journal: J,
    format: Box<dyn EvidenceFormat>,
    cancel: CancelToken,
    _p: PhantomData<S>,
}

impl<C: CommandChannel, J: Journal> Monitor<C, J, Idle> {
    /// Create a monitor, evidence layout is taken from configuration.
    pub fn new(config: SessionConfig, channel: C, journal: J) -> Self {
        Self {
            format: config.format.policy(),
            config,
            channel,
            journal,
            cancel: CancelToken::default(),
            _p: PhantomData,
        }
    }

    /// Replace evidence layout.
    pub fn with_format(mut self, format: Box<dyn EvidenceFormat>) -> Self {
        self.format = format;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Prepare engine and journal, then arm the pool tag trigger.
    pub fn arm(mut self) -> Result<Monitor<C, J, Armed>, Error> {
        let commands = &self.config.commands;
        for extension in &commands.extensions {
            self.channel.execute(extension)?;
        }

        if let Some(engine_log) = &self.config.engine_log {
            self.channel.execute(&commands.log_close)?;
            self.channel
                .execute(&format!("{} {}", commands.log_open, engine_log.display()))?;
        }

        self.journal.open(&self.config.log_path)?;

        let trigger = tag::trigger_command(&commands.trigger_symbol, &self.config.tag);
        let trigger_out = self.channel.execute(&trigger)?;
        self.journal.write(&self.format.header(&trigger_out))?;
        ph_info!("armed: {trigger}");

        if self.config.resume_after_arm {
            self.channel.execute(&commands.resume)?;
        }

        Ok(Monitor {
            config: self.config,
            channel: self.channel,
            journal: self.journal,
            format: self.format,
            cancel: self.cancel,
            _p: PhantomData,
        })
    }
}

impl<C: CommandChannel, J: Journal> Monitor<C, J, Armed> {
    /// Process configured number of halts and close the journal.
    pub fn run(mut self) -> Result<RunSummary, Error> {
        let mut summary = RunSummary::default();

        for iteration in 0..self.config.iterations {
            if self.cancel.is_cancelled() {
                ph_warn!("run cancelled after {iteration} halts");
                summary.cancelled = true;
                break;
            }

            let kind = self.halt()?;
            match kind {
                Classification::Allocation => summary.allocations += 1,
                Classification::Deallocation => summary.deallocations += 1,
                Classification::Unclassified => summary.unclassified += 1,
            }
            self.channel.execute(&self.config.commands.resume)?;
            summary.iterations += 1;
        }

        self.close()?;
        Ok(summary)
    }

    /// Classify current halt and journal its evidence.
    fn halt(&mut self) -> Result<Classification, Error> {
        let commands = &self.config.commands;
        let stack = self.channel.execute(&commands.bounded_stack)?;
        let kind = classify(&stack, &self.config.symbols);

        // taken before any step-out, so it shows the halting context
        let snapshot = if self.format.wants_snapshot(kind) {
            Some(self.channel.execute(&commands.full_stack)?)
        } else {
            None
        };

        let record = match kind {
            Classification::Allocation => {
                let evidence = Collector::new(&mut self.channel, &self.config)
                    .allocation(stack, snapshot.clone())?;
                ph_info!(
                    "malloc: {} ({} step-outs)",
                    evidence.return_value.join(" "),
                    evidence.step_outs
                );
                Some(self.format.allocation(&evidence))
            }
            Classification::Deallocation => {
                let evidence = Collector::new(&mut self.channel, &self.config).deallocation()?;
                ph_info!("free: {} site(s)", evidence.sites.len());
                Some(self.format.deallocation(&evidence))
            }
            Classification::Unclassified => {
                ph_debug!("unclassified halt");
                None
            }
        };

        if let Some(record) = record {
            self.journal.write(&record)?;
        }
        if let Some(trailer) = self.format.halt_trailer(snapshot.as_deref()) {
            self.journal.write(&trailer)?;
        }

        Ok(kind)
    }

    fn close(mut self) -> Result<(), Error> {
        self.journal.write(&self.format.footer())?;
        self.journal.close()?;
        if self.config.engine_log.is_some() {
            self.channel.execute(&self.config.commands.log_close)?;
        }
        Ok(())
    }
}

/// Arm the trigger and run a whole session.
pub fn triage<C: CommandChannel, J: Journal>(
    config: SessionConfig,
    channel: C,
    journal: J,
    cancel: CancelToken,
) -> Result<RunSummary, Error> {
    Monitor::new(config, channel, journal)
        .with_cancel(cancel)
        .arm()?
        .run()
}
