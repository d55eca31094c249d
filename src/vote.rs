/// Counts of observed values, kept in first-seen order.
///
/// The modal value is the one with the highest count; on a tie the value that
/// was observed first wins, so repeated runs over the same samples agree.
#[derive(Debug, Clone)]
pub struct Tally<T> {
    entries: Vec<(T, usize)>,
}

impl<T: PartialEq> Tally<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn record(&mut self, value: T) {
        match self.entries.iter_mut().find(|(v, _)| *v == value) {
            Some((_, count)) => *count += 1,
            None => self.entries.push((value, 1)),
        }
    }

    /// Number of distinct values that share the top count.
    pub fn tied_at_top(&self) -> usize {
        let top = self.entries.iter().map(|(_, c)| *c).max().unwrap_or(0);
        self.entries.iter().filter(|(_, c)| *c == top).count()
    }

    pub fn into_modal(self) -> Option<(T, usize)> {
        let mut best: Option<(T, usize)> = None;
        for (value, count) in self.entries {
            if best.as_ref().map_or(true, |(_, c)| count > *c) {
                best = Some((value, count));
            }
        }
        best
    }
}

impl<T: PartialEq> Default for Tally<T> {
    fn default() -> Self {
        Self::new()
    }
}
