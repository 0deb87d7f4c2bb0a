use shared::{ClassLabel, LabelEntry};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum LabelTableError {
    #[error("label table is empty")]
    Empty,
    #[error("class index {0} appears more than once")]
    DuplicateIndex(usize),
    #[error("class indices must cover 0..{len} without gaps, found {index}")]
    IndexGap { index: usize, len: usize },
    #[error("class index {0} has a blank label")]
    BlankLabel(usize),
}

/// Index-aligned class names for the model's output positions.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelTable {
    labels: Vec<ClassLabel>,
}

impl LabelTable {
    /// Builds a table from explicit `(index, label)` entries in any order.
    pub fn new(mut entries: Vec<LabelEntry>) -> Result<Self, LabelTableError> {
        if entries.is_empty() {
            return Err(LabelTableError::Empty);
        }

        entries.sort_by_key(|entry| entry.index);
        let len = entries.len();
        if let Some(pair) = entries.windows(2).find(|pair| pair[0].index == pair[1].index) {
            return Err(LabelTableError::DuplicateIndex(pair[1].index));
        }

        let mut labels = Vec::with_capacity(len);
        for (expected, entry) in entries.into_iter().enumerate() {
            if entry.index != expected {
                return Err(LabelTableError::IndexGap {
                    index: entry.index,
                    len,
                });
            }
            if entry.label.as_str().trim().is_empty() {
                return Err(LabelTableError::BlankLabel(entry.index));
            }
            labels.push(entry.label);
        }

        Ok(Self { labels })
    }

    pub fn get(&self, index: usize) -> Option<&ClassLabel> {
        self.labels.get(index)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn names(&self) -> Vec<ClassLabel> {
        self.labels.clone()
    }

    pub fn entries(&self) -> Vec<LabelEntry> {
        self.labels
            .iter()
            .enumerate()
            .map(|(index, label)| LabelEntry {
                index,
                label: label.clone(),
            })
            .collect()
    }
}

impl Default for LabelTable {
    fn default() -> Self {
        Self {
            labels: default_entries().into_iter().map(|e| e.label).collect(),
        }
    }
}

pub fn default_entries() -> Vec<LabelEntry> {
    ["Type 1", "Type 2", "Type 3"]
        .into_iter()
        .enumerate()
        .map(|(index, label)| LabelEntry {
            index,
            label: label.into(),
        })
        .collect()
}
