//! Reordering buffer between out-of-order workers and an in-order sink.
//!
//! Workers finish items in whatever order the scheduler dictates. The
//! [`OrderedAssembler`] parks every result whose index is ahead of the next one the
//! sink expects, and forwards runs of consecutive indices as soon as the gap closes.
//! Write order is therefore a function of index alone.
//!
//! The buffer is unbounded: one slow worker holds back everything after its index.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::{FeatError, Result};
use crate::value::Value;
use crate::writer::RecordSink;

#[derive(Debug)]
struct AssemblerState<S> {
    next_expected: usize,
    /// Results parked ahead of a gap, keyed by index.
    pending: BTreeMap<usize, Value>,
    sink: S,
}

/// Forwards `(index, value)` pairs to a sink in strictly increasing index order.
#[derive(Debug)]
pub struct OrderedAssembler<S> {
    expected: usize,
    state: Mutex<AssemblerState<S>>,
}

impl<S: RecordSink> OrderedAssembler<S> {
    /// Creates an assembler expecting indices `0..expected`.
    pub fn new(sink: S, expected: usize) -> Self {
        Self {
            expected,
            state: Mutex::new(AssemblerState {
                next_expected: 0,
                pending: BTreeMap::new(),
                sink,
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, AssemblerState<S>>> {
        self.state
            .lock()
            .map_err(|_| FeatError::Internal("OrderedAssembler mutex poisoned".into()))
    }

    /// Accepts the value for `index` and forwards every value that is now in order.
    ///
    /// # Errors
    /// [`FeatError::Internal`] for an index outside `0..expected` or one that was
    /// already pushed; any error of the sink's `append`.
    pub fn push(&self, index: usize, value: Value) -> Result<()> {
        if index >= self.expected {
            return Err(FeatError::Internal(format!(
                "index {index} beyond expected count {}",
                self.expected
            )));
        }

        let mut guard = self.lock()?;
        let state = &mut *guard;

        if index < state.next_expected || state.pending.contains_key(&index) {
            return Err(FeatError::Internal(format!(
                "index {index} pushed twice (next expected {})",
                state.next_expected
            )));
        }
        state.pending.insert(index, value);

        while let Some(entry) = state.pending.first_entry() {
            if *entry.key() != state.next_expected {
                break;
            }
            state.sink.append(entry.remove())?;
            state.next_expected += 1;
        }
        Ok(())
    }

    /// Total number of indices this assembler waits for.
    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Index the sink is waiting for. Equals the number of values forwarded.
    pub fn next_expected(&self) -> Result<usize> {
        Ok(self.lock()?.next_expected)
    }

    /// Number of values parked ahead of a gap.
    pub fn pending_len(&self) -> Result<usize> {
        Ok(self.lock()?.pending.len())
    }

    /// True iff nothing is parked and every expected index was forwarded.
    pub fn is_drained(&self) -> Result<bool> {
        let state = self.lock()?;
        Ok(state.pending.is_empty() && state.next_expected == self.expected)
    }

    /// Seals the sink. Parked values are discarded.
    pub fn seal(&self) -> Result<()> {
        self.lock()?.sink.seal()
    }

    /// Consumes the assembler and returns its sink.
    pub fn into_sink(self) -> S {
        let state = self.state.into_inner().unwrap_or_else(|p| p.into_inner());
        state.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(i: usize) -> Value {
        Value::Int(i as i64)
    }

    #[test]
    fn out_of_order_pushes_come_out_in_order() {
        let asm = OrderedAssembler::new(Vec::new(), 5);
        for i in [3, 1, 4, 0, 2] {
            asm.push(i, v(i)).unwrap();
        }
        assert!(asm.is_drained().unwrap());
        assert_eq!(asm.into_sink(), (0..5).map(v).collect::<Vec<_>>());
    }

    #[test]
    fn gap_holds_back_later_indices() {
        let asm = OrderedAssembler::new(Vec::new(), 4);
        asm.push(2, v(2)).unwrap();
        asm.push(3, v(3)).unwrap();
        asm.push(0, v(0)).unwrap();
        assert_eq!(asm.next_expected().unwrap(), 1);
        assert_eq!(asm.pending_len().unwrap(), 2);
        assert!(!asm.is_drained().unwrap());

        asm.push(1, v(1)).unwrap();
        assert_eq!(asm.next_expected().unwrap(), 4);
        assert_eq!(asm.pending_len().unwrap(), 0);
    }

    #[test]
    fn duplicate_index_is_rejected() {
        let asm = OrderedAssembler::new(Vec::new(), 3);
        asm.push(0, v(0)).unwrap();
        assert!(matches!(asm.push(0, v(0)), Err(FeatError::Internal(_))));

        // A duplicate of a parked index fails on its own push.
        asm.push(2, v(2)).unwrap();
        assert!(matches!(asm.push(2, v(2)), Err(FeatError::Internal(_))));
        assert_eq!(asm.pending_len().unwrap(), 1);

        asm.push(1, v(1)).unwrap();
        assert!(asm.is_drained().unwrap());
        assert_eq!(asm.into_sink(), (0..3).map(v).collect::<Vec<_>>());
    }

    #[test]
    fn index_beyond_expected_is_rejected() {
        let asm = OrderedAssembler::new(Vec::new(), 2);
        assert!(asm.push(2, v(2)).is_err());
    }

    #[test]
    fn empty_assembler_is_drained() {
        let asm = OrderedAssembler::new(Vec::<Value>::new(), 0);
        assert!(asm.is_drained().unwrap());
    }
}
