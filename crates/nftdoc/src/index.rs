/// Hands out rule positions `0, 1, 2, ...` for rules appended to one chain.
///
/// Pass each value as the rule's `index` so the kernel keeps the intended
/// relative order. Use one instance per chain; it is never shared globally.
#[derive(Debug, Clone, Default)]
pub struct RuleIndex {
    last: Option<u32>,
}

impl RuleIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Iterator for RuleIndex {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        let next = match self.last {
            None => 0,
            Some(last) => last.checked_add(1)?,
        };
        self.last = Some(next);
        Some(next)
    }
}
