//! Energy registers

use std::fmt;

use crate::error::{Error, Result};

/// Cumulative active energy, total and per tariff [kWh]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ActiveEnergy {
    pub total: f64,
    pub t1: f64,
    pub t2: f64,
    pub t3: f64,
    pub t4: f64,
}

impl ActiveEnergy {
    /// Register count in an energy reading
    pub const REGISTERS: usize = 5;

    pub fn from_values(values: &[f64]) -> Result<Self> {
        match *values {
            [total, t1, t2, t3, t4] => Ok(Self { total, t1, t2, t3, t4 }),
            _ => Err(Error::Validation(format!(
                "expected {} energy registers, got {}",
                Self::REGISTERS,
                values.len()
            ))),
        }
    }

    /// Energy accumulated since `baseline`, rounded to 10 Wh
    pub fn since(&self, baseline: &ActiveEnergy) -> ActiveEnergy {
        let delta = |now: f64, then: f64| ((now - then) * 100.0).round() / 100.0;
        ActiveEnergy {
            total: delta(self.total, baseline.total),
            t1: delta(self.t1, baseline.t1),
            t2: delta(self.t2, baseline.t2),
            t3: delta(self.t3, baseline.t3),
            t4: delta(self.t4, baseline.t4),
        }
    }
}

impl fmt::Display for ActiveEnergy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total={:.2} T1={:.2} T2={:.2} T3={:.2} T4={:.2} kWh",
            self.total, self.t1, self.t2, self.t3, self.t4
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_values() {
        let energy = ActiveEnergy::from_values(&[16442.17, 12865.25, 3576.92, 0.0, 0.0]).unwrap();
        assert_eq!(energy.total, 16442.17);
        assert_eq!(energy.t2, 3576.92);

        assert!(matches!(
            ActiveEnergy::from_values(&[1.0, 2.0]),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_since_rounds_to_hundredths() {
        let now = ActiveEnergy::from_values(&[16442.17, 12865.25, 3576.92, 0.0, 0.0]).unwrap();
        let then = ActiveEnergy::from_values(&[16300.05, 12790.1, 3509.95, 0.0, 0.0]).unwrap();

        let delta = now.since(&then);
        assert_eq!(delta.total, 142.12);
        assert_eq!(delta.t1, 75.15);
        assert_eq!(delta.t2, 66.97);
        assert_eq!(delta.t3, 0.0);
    }
}
