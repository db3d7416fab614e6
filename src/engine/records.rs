use crate::core::Record;

/// One record or a sequence of records handed to a write.
///
/// The caller keeps ownership; records are updated in place, so a single
/// record comes back as a single record.
#[derive(Debug)]
pub enum Records<'a> {
    Single(&'a mut Record),
    Many(&'a mut [Record]),
}

impl Records<'_> {
    pub fn is_single(&self) -> bool {
        matches!(self, Self::Single(_))
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Many(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [Record] {
        match self {
            Self::Single(record) => std::slice::from_mut(&mut **record),
            Self::Many(records) => records,
        }
    }
}

impl<'a> From<&'a mut Record> for Records<'a> {
    fn from(record: &'a mut Record) -> Self {
        Self::Single(record)
    }
}

impl<'a> From<&'a mut [Record]> for Records<'a> {
    fn from(records: &'a mut [Record]) -> Self {
        Self::Many(records)
    }
}

impl<'a> From<&'a mut Vec<Record>> for Records<'a> {
    fn from(records: &'a mut Vec<Record>) -> Self {
        Self::Many(records.as_mut_slice())
    }
}

impl<'a, const N: usize> From<&'a mut [Record; N]> for Records<'a> {
    fn from(records: &'a mut [Record; N]) -> Self {
        Self::Many(records.as_mut_slice())
    }
}

/// Counts of what one write call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
}

impl UpdateSummary {
    /// Number of statements executed.
    pub fn written(&self) -> usize {
        self.inserted + self.updated + self.deleted
    }
}
