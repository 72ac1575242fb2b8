/// Precomputed weighted turn order over backend indices.
///
/// Index `i` with weight `w` occupies `w` slots, grouped and in list order:
/// weights `[1, 3]` yield `[0, 1, 1, 1]`. The table never changes once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationTable {
    slots: Vec<usize>,
}

impl RotationTable {
    pub fn from_weights<I>(weights: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<usize>,
    {
        let mut slots = Vec::new();
        for (index, weight) in weights.into_iter().enumerate() {
            slots.extend(std::iter::repeat(index).take(weight.into()));
        }
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Backend index at rotation position `position mod len`
    pub fn backend_at(&self, position: u64) -> Option<usize> {
        if self.slots.is_empty() {
            return None;
        }
        let pos = (position % self.slots.len() as u64) as usize;
        Some(self.slots[pos])
    }

    /// How many slots `index` owns
    pub fn multiplicity(&self, index: usize) -> usize {
        self.slots.iter().filter(|&&i| i == index).count()
    }

    pub fn slots(&self) -> &[usize] {
        &self.slots
    }
}
