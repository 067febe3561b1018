//! Periodic interrupt suspension for RP2040
//!
//! Flash operations stall XIP, so whatever drives display/audio from a
//! timer interrupt is masked in the NVIC for the duration.

use embassy_rp::interrupt::{Interrupt, InterruptExt};

pub use chunkfs_hal::ticker::{InterruptMask, MaskingTicker, PeriodicTicker};

/// Masks one NVIC interrupt while flash is busy
pub type IrqTicker = MaskingTicker<NvicLine>;

/// One NVIC interrupt line
///
/// Typically `Interrupt::TIMER_IRQ_1` or whichever alarm drives the
/// periodic ticker.
#[derive(Debug, Clone, Copy)]
pub struct NvicLine(Interrupt);

impl NvicLine {
    /// Wrap `irq`
    pub fn new(irq: Interrupt) -> Self {
        Self(irq)
    }
}

impl InterruptMask for NvicLine {
    fn is_enabled(&self) -> bool {
        self.0.is_enabled()
    }

    fn disable(&mut self) {
        self.0.disable();
    }

    fn enable(&mut self) {
        // SAFETY: `MaskingTicker` only unmasks a line it found enabled when
        // it paused it, so the handler the application bound is unchanged.
        unsafe { self.0.enable() };
    }
}
