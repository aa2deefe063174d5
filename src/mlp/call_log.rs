use serde_json::Value;

use crate::dd::DdResponse;

/// Which façade operation produced a logged answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallKind {
    CreateService,
    Train,
    Predict,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CallRecord {
    pub call: CallKind,
    pub response: Value,
}

/// Raw server answers in the order the façade received them.
///
/// Purely observational; nothing in the façade reads it back.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CallLog {
    records: Vec<CallRecord>,
}

impl CallLog {
    pub(crate) fn push(&mut self, call: CallKind, response: &DdResponse) {
        self.records.push(CallRecord {
            call,
            response: response.raw().clone(),
        });
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[CallRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&CallRecord> {
        self.records.last()
    }

    pub fn count(&self, call: CallKind) -> usize {
        self.records.iter().filter(|record| record.call == call).count()
    }
}
