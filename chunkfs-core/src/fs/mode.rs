//! Open mode strings

use crate::error::Error;

/// Direction and encoding requested when opening a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OpenMode {
    /// Open for writing (create or overwrite) instead of reading
    pub write: bool,
    /// Binary stream instead of text
    pub binary: bool,
}

impl OpenMode {
    /// Read, text
    pub const READ: Self = Self {
        write: false,
        binary: false,
    };

    /// Write, text
    pub const WRITE: Self = Self {
        write: true,
        binary: false,
    };

    /// Parse a mode string such as `"r"`, `"wb"` or `"tr"`
    ///
    /// Each of `r`/`w` and `b`/`t` may appear at most once, in any order.
    /// Omitted parts default to read and text. Anything else fails with
    /// [`Error::IllegalMode`].
    pub fn parse(mode: &str) -> Result<Self, Error> {
        let mut write = None;
        let mut binary = None;

        for c in mode.chars() {
            let (slot, value) = match c {
                'r' => (&mut write, false),
                'w' => (&mut write, true),
                't' => (&mut binary, false),
                'b' => (&mut binary, true),
                _ => return Err(Error::IllegalMode),
            };
            if slot.replace(value).is_some() {
                return Err(Error::IllegalMode);
            }
        }

        Ok(Self {
            write: write.unwrap_or(false),
            binary: binary.unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(OpenMode::parse("").unwrap(), OpenMode::READ);
        assert_eq!(OpenMode::parse("r").unwrap(), OpenMode::READ);
        assert_eq!(OpenMode::parse("w").unwrap(), OpenMode::WRITE);
    }

    #[test]
    fn test_any_order() {
        let expected = OpenMode {
            write: true,
            binary: true,
        };
        assert_eq!(OpenMode::parse("wb").unwrap(), expected);
        assert_eq!(OpenMode::parse("bw").unwrap(), expected);
        assert_eq!(OpenMode::parse("rt").unwrap(), OpenMode::READ);
    }

    #[test]
    fn test_rejects_repeats_and_unknown() {
        for mode in ["rw", "rr", "bt", "wbb", "a", "r+", "R"] {
            assert_eq!(OpenMode::parse(mode), Err(Error::IllegalMode), "{mode}");
        }
    }
}
