//! Signal dispositions for the interpreter and for the children it spawns.
//!
//! Dispositions are described as a value and applied in one go: once before
//! the read loop starts (interactive mode only) and once in every child right
//! before the program image is replaced.

use nix::libc::c_int;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};

/// What happens when a signal arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The system default action.
    Default,
    /// The signal is discarded.
    Ignore,
    /// A handler that does nothing. Blocking system calls return `EINTR`,
    /// which is how a pending line read gets cut short.
    Interrupt,
}

/// Dispositions for the interrupt (`SIGINT`) and terminal stop (`SIGTSTP`)
/// signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalDispositions {
    pub interrupt: Disposition,
    pub stop: Disposition,
}

impl SignalDispositions {
    /// The interactive interpreter survives Ctrl-C and never stops on Ctrl-Z.
    pub const INTERACTIVE: Self = Self {
        interrupt: Disposition::Interrupt,
        stop: Disposition::Ignore,
    };

    /// Children behave like ordinary programs.
    pub const CHILD: Self = Self {
        interrupt: Disposition::Default,
        stop: Disposition::Default,
    };

    /// Install these dispositions for the calling process.
    ///
    /// Only calls `sigaction`, so it is safe to use between fork and exec.
    pub fn apply(&self) -> nix::Result<()> {
        install(Signal::SIGINT, self.interrupt)?;
        install(Signal::SIGTSTP, self.stop)?;
        Ok(())
    }
}

extern "C" fn interrupt_only(_signum: c_int) {}

fn install(signal: Signal, disposition: Disposition) -> nix::Result<()> {
    let action = match disposition {
        Disposition::Default => SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty()),
        Disposition::Ignore => SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty()),
        // no SA_RESTART: the interrupted read must fail with EINTR
        Disposition::Interrupt => SigAction::new(
            SigHandler::Handler(interrupt_only),
            SaFlags::empty(),
            SigSet::all(),
        ),
    };
    // SAFETY: the only handler installed here is `interrupt_only`, which does
    // nothing and is therefore async-signal-safe.
    unsafe { sigaction(signal, &action) }?;
    Ok(())
}
