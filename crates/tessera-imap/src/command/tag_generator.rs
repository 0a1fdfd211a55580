//! IMAP command tag generator.
//!
//! Tags are used to match commands with their responses.

/// Tag generator for IMAP commands.
///
/// Generates sequential tags in the format "A0001", "A0002", etc. The
/// counter only moves forward for the lifetime of a client, across
/// reconnects.
#[derive(Debug, Clone)]
pub struct TagGenerator {
    counter: u64,
    prefix: char,
}

impl TagGenerator {
    /// Creates a new tag generator with the given prefix.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self { counter: 0, prefix }
    }

    /// Generates the next tag.
    pub fn next_tag(&mut self) -> String {
        self.counter = self.counter.wrapping_add(1);
        format!("{}{:04}", self.prefix, self.counter)
    }

    /// Number of tags generated so far.
    #[must_use]
    pub const fn count(&self) -> u64 {
        self.counter
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new('A')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_generation() {
        let mut generator = TagGenerator::default();
        assert_eq!(generator.next_tag(), "A0001");
        assert_eq!(generator.next_tag(), "A0002");
        assert_eq!(generator.count(), 2);
    }

    #[test]
    fn test_custom_prefix_and_padding() {
        let mut generator = TagGenerator::new('T');
        for _ in 0..99 {
            let _ = generator.next_tag();
        }
        assert_eq!(generator.next_tag(), "T0100");
        for _ in 0..9900 {
            let _ = generator.next_tag();
        }
        assert_eq!(generator.next_tag(), "T10001");
    }

    #[test]
    fn test_uniqueness() {
        let mut generator = TagGenerator::default();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..10000 {
            assert!(seen.insert(generator.next_tag()), "duplicate tag generated");
        }
    }
}
