//! Periodic interrupt control
//!
//! Flash erase and program stall the bus. Anything driven from a periodic
//! timer interrupt (display refresh, PWM, audio sampling) has to be paused
//! for the duration so it does not miss deadlines half-way through a frame.

/// A periodic timer interrupt that can be suspended
pub trait PeriodicTicker {
    /// Suspend the periodic interrupt
    fn stop(&mut self);

    /// Resume the periodic interrupt
    fn start(&mut self);
}

/// Ticker for platforms with nothing time-sensitive on the flash bus
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTicker;

impl PeriodicTicker for NoTicker {
    fn stop(&mut self) {}

    fn start(&mut self) {}
}

impl<T: PeriodicTicker + ?Sized> PeriodicTicker for &mut T {
    fn stop(&mut self) {
        (**self).stop()
    }

    fn start(&mut self) {
        (**self).start()
    }
}

/// An interrupt line that can be masked
pub trait InterruptMask {
    /// Whether the line is currently unmasked
    fn is_enabled(&self) -> bool;

    /// Mask the line
    fn disable(&mut self);

    /// Unmask the line
    fn enable(&mut self);
}

/// Ticker that masks one interrupt while flash is busy
///
/// The line is unmasked again only if it was enabled when paused, so a
/// ticker the application has switched off stays off.
#[derive(Debug)]
pub struct MaskingTicker<M> {
    line: M,
    resume: bool,
}

impl<M: InterruptMask> MaskingTicker<M> {
    /// Pause `line` around every flash operation
    pub fn new(line: M) -> Self {
        Self {
            line,
            resume: false,
        }
    }

    /// The masked interrupt line
    pub fn line(&self) -> &M {
        &self.line
    }
}

impl<M: InterruptMask> PeriodicTicker for MaskingTicker<M> {
    fn stop(&mut self) {
        self.resume = self.line.is_enabled();
        self.line.disable();
    }

    fn start(&mut self) {
        if core::mem::take(&mut self.resume) {
            self.line.enable();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct FakeLine {
        enabled: bool,
        enables: u32,
    }

    impl InterruptMask for FakeLine {
        fn is_enabled(&self) -> bool {
            self.enabled
        }

        fn disable(&mut self) {
            self.enabled = false;
        }

        fn enable(&mut self) {
            self.enabled = true;
            self.enables += 1;
        }
    }

    #[test]
    fn test_enabled_line_resumes() {
        let mut ticker = MaskingTicker::new(FakeLine {
            enabled: true,
            enables: 0,
        });
        ticker.stop();
        assert!(!ticker.line().enabled);
        ticker.start();
        assert!(ticker.line().enabled);
        assert_eq!(ticker.line().enables, 1);
    }

    #[test]
    fn test_disabled_line_stays_off() {
        let mut ticker = MaskingTicker::new(FakeLine::default());
        for _ in 0..3 {
            ticker.stop();
            ticker.start();
        }
        assert!(!ticker.line().enabled);
        assert_eq!(ticker.line().enables, 0);
    }

    #[test]
    fn test_start_without_stop_does_nothing() {
        let mut ticker = MaskingTicker::new(FakeLine::default());
        ticker.start();
        assert_eq!(ticker.line().enables, 0);
    }
}
