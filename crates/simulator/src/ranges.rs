use serde::{Deserialize, Serialize};

/// `points` evenly spaced values from `start` to `stop`, both included.
pub fn linspace(start: f64, stop: f64, points: usize) -> Vec<f64> {
    match points {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (points - 1) as f64;
            (0..points)
                .map(|i| if i + 1 == points { stop } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// Coupling values of a campaign: an explicit list or an even grid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CouplingRange {
    List(Vec<f64>),
    Linspace { start: f64, stop: f64, points: usize },
}

impl Default for CouplingRange {
    fn default() -> Self {
        Self::Linspace {
            start: 0.0,
            stop: 2.0,
            points: 50,
        }
    }
}

impl CouplingRange {
    pub fn values(&self) -> Vec<f64> {
        match self {
            Self::List(v) => v.clone(),
            Self::Linspace { start, stop, points } => linspace(*start, *stop, *points),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{linspace, CouplingRange};

    #[test]
    fn linspace_includes_both_ends() {
        assert_eq!(linspace(0.0, 2.0, 5), vec![0.0, 0.5, 1.0, 1.5, 2.0]);
        assert_eq!(linspace(1.0, 3.0, 1), vec![1.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn coupling_range_from_yaml() {
        let grid: CouplingRange =
            serde_yaml::from_str("{start: 0.0, stop: 1.0, points: 3}").unwrap();
        assert_eq!(grid.values(), vec![0.0, 0.5, 1.0]);
        let list: CouplingRange = serde_yaml::from_str("[0.1, 0.7]").unwrap();
        assert_eq!(list.values(), vec![0.1, 0.7]);
    }
}
