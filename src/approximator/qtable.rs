use super::{ApproximatorSpec, QFunction};
use crate::error::{Result, SignalError};
use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Tabular action values keyed by the observation rounded to integers.
///
/// Unseen states read as all zeros. Each `update` applies
/// `Q(s, a) += lr * (target - Q(s, a))` for every row in order, so a state
/// appearing twice in a batch is updated twice.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QTable {
    table: HashMap<Vec<i32>, Vec<f32>>,
    num_actions: usize,
    learning_rate: f32,
}

impl QTable {
    pub fn new(num_actions: usize, learning_rate: f32) -> Result<Self> {
        if num_actions == 0 {
            return Err(SignalError::invalid_parameter("num_actions", "At least one action is required"));
        }
        if !(learning_rate > 0.0 && learning_rate <= 1.0) {
            return Err(SignalError::invalid_parameter("learning_rate", "Learning rate must be in (0, 1]"));
        }
        Ok(QTable {
            table: HashMap::new(),
            num_actions,
            learning_rate,
        })
    }

    fn key(state: ArrayView1<f32>) -> Vec<i32> {
        state.iter().map(|v| v.round() as i32).collect()
    }

    /// Number of distinct states visited by updates.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl QFunction for QTable {
    fn num_actions(&self) -> usize {
        self.num_actions
    }

    fn predict(&self, states: ArrayView2<f32>) -> Result<Array2<f32>> {
        let mut values = Array2::zeros((states.nrows(), self.num_actions));
        for (state, mut row) in states.outer_iter().zip(values.outer_iter_mut()) {
            if let Some(stored) = self.table.get(&Self::key(state)) {
                for (dst, &src) in row.iter_mut().zip(stored) {
                    *dst = src;
                }
            }
        }
        Ok(values)
    }

    fn update(&mut self, states: ArrayView2<f32>, actions: &[usize], targets: ArrayView1<f32>) -> Result<f32> {
        if actions.len() != states.nrows() || targets.len() != states.nrows() {
            return Err(SignalError::dimension_mismatch(
                format!("{} actions and targets", states.nrows()),
                format!("{} actions, {} targets", actions.len(), targets.len()),
            ));
        }
        if let Some(&bad) = actions.iter().find(|&&a| a >= self.num_actions) {
            return Err(SignalError::invalid_parameter(
                "action".to_string(),
                format!("action {} outside 0..{}", bad, self.num_actions),
            ));
        }
        let mut squared = 0.0;
        for ((state, &action), &target) in states.outer_iter().zip(actions).zip(targets.iter()) {
            let values = self
                .table
                .entry(Self::key(state))
                .or_insert_with(|| vec![0.0; self.num_actions]);
            let error = target - values[action];
            squared += 0.5 * error * error;
            values[action] += self.learning_rate * error;
        }
        Ok(squared / actions.len().max(1) as f32)
    }

    fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, bincode::serialize(self)?)?;
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let loaded: QTable = bincode::deserialize(&fs::read(path)?)?;
        if loaded.num_actions != self.num_actions {
            return Err(SignalError::dimension_mismatch(
                format!("{} actions", self.num_actions),
                format!("{} actions", loaded.num_actions),
            ));
        }
        *self = loaded;
        Ok(())
    }

    fn spec(&self) -> ApproximatorSpec {
        ApproximatorSpec::Table {
            num_actions: self.num_actions,
            learning_rate: self.learning_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_unseen_states_are_zero() {
        let table = QTable::new(4, 0.5).unwrap();
        assert_eq!(table.predict(array![[1.0, 2.0]].view()).unwrap(), Array2::<f32>::zeros((1, 4)));
    }

    #[test]
    fn test_rejected_update_leaves_table_untouched() {
        let mut table = QTable::new(2, 1.0).unwrap();
        let result = table.update(array![[0.0], [1.0]].view(), &[0, 7], array![5.0, 5.0].view());
        assert!(matches!(result, Err(SignalError::InvalidParameter { .. })));
        assert!(table.is_empty());
        assert_eq!(table.predict(array![[0.0]].view()).unwrap(), Array2::<f32>::zeros((1, 2)));
    }

    #[test]
    fn test_update_is_sequential() {
        let mut table = QTable::new(2, 0.5).unwrap();
        let states = array![[1.0, 0.0], [1.2, 0.1]];
        let loss = table.update(states.view(), &[1, 1], array![4.0, 4.0].view()).unwrap();
        // Both rows round to the same key: 0 -> 2 -> 3.
        let q = table.predict(array![[1.0, 0.0]].view()).unwrap();
        assert_eq!(q[[0, 1]], 3.0);
        assert_eq!(q[[0, 0]], 0.0);
        assert_eq!(table.len(), 1);
        assert!((loss - (8.0 + 2.0) / 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(QTable::new(0, 0.1).is_err());
        assert!(QTable::new(2, 1.5).is_err());
        let mut table = QTable::new(2, 0.1).unwrap();
        assert!(table.update(array![[0.0]].view(), &[3], array![1.0].view()).is_err());
    }
}
