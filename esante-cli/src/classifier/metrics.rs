//! Held-out evaluation: accuracy, confusion matrix, per-class report

use crate::models::{HealthStatus, NUM_CLASSES};
use serde::Serialize;
use std::fmt;

/// Rows are true classes, columns are predicted classes
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ConfusionMatrix {
    pub counts: [[usize; NUM_CLASSES]; NUM_CLASSES],
}

impl ConfusionMatrix {
    pub fn from_predictions(truth: &[usize], predicted: &[usize]) -> Self {
        let mut counts = [[0; NUM_CLASSES]; NUM_CLASSES];
        for (&t, &p) in truth.iter().zip(predicted) {
            if t < NUM_CLASSES && p < NUM_CLASSES {
                counts[t][p] += 1;
            }
        }
        Self { counts }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn correct(&self) -> usize {
        (0..NUM_CLASSES).map(|c| self.counts[c][c]).sum()
    }

    pub fn accuracy(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.correct() as f64 / total as f64,
        }
    }

    /// Number of true samples of a class
    pub fn support(&self, class: usize) -> usize {
        self.counts[class].iter().sum()
    }

    /// Number of samples predicted as a class
    pub fn predicted(&self, class: usize) -> usize {
        self.counts.iter().map(|row| row[class]).sum()
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>20}", "true \\ predicted")?;
        for class in 0..NUM_CLASSES {
            write!(f, " {:>6}", class)?;
        }
        writeln!(f)?;
        for status in HealthStatus::ALL {
            write!(f, "{:>20}", status.name())?;
            for count in self.counts[status.index()] {
                write!(f, " {:>6}", count)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class precision/recall/F1 with macro and weighted averages.
///
/// Undefined ratios (no predictions, no support) count as 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub per_class: [ClassMetrics; NUM_CLASSES],
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
    pub confusion: ConfusionMatrix,
}

impl ClassificationReport {
    pub fn new(truth: &[usize], predicted: &[usize]) -> Self {
        let confusion = ConfusionMatrix::from_predictions(truth, predicted);

        let mut per_class = [ClassMetrics::default(); NUM_CLASSES];
        for (class, metrics) in per_class.iter_mut().enumerate() {
            let tp = confusion.counts[class][class] as f64;
            let support = confusion.support(class);
            let predicted = confusion.predicted(class);

            let precision = ratio(tp, predicted as f64);
            let recall = ratio(tp, support as f64);
            let f1 = ratio(2.0 * precision * recall, precision + recall);
            *metrics = ClassMetrics {
                precision,
                recall,
                f1,
                support,
            };
        }

        let total = confusion.total();
        let macro_avg = average(&per_class, |_| 1.0, total);
        let weighted_avg = average(&per_class, |m| m.support as f64, total);

        Self {
            per_class,
            accuracy: confusion.accuracy(),
            macro_avg,
            weighted_avg,
            confusion,
        }
    }

    pub fn get(&self, status: HealthStatus) -> &ClassMetrics {
        &self.per_class[status.index()]
    }
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

fn average(
    per_class: &[ClassMetrics; NUM_CLASSES],
    weight: impl Fn(&ClassMetrics) -> f64,
    total: usize,
) -> ClassMetrics {
    let mut weight_sum = 0.0;
    let (mut precision, mut recall, mut f1) = (0.0, 0.0, 0.0);
    for m in per_class {
        let w = weight(m);
        weight_sum += w;
        precision += m.precision * w;
        recall += m.recall * w;
        f1 += m.f1 * w;
    }
    ClassMetrics {
        precision: ratio(precision, weight_sum),
        recall: ratio(recall, weight_sum),
        f1: ratio(f1, weight_sum),
        support: total,
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>20} {:>10} {:>10} {:>10} {:>10}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for status in HealthStatus::ALL {
            let m = self.get(status);
            writeln!(
                f,
                "{:>20} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                status.name(),
                m.precision,
                m.recall,
                m.f1,
                m.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>20} {:>10} {:>10} {:>10.2} {:>10}",
            "accuracy",
            "",
            "",
            self.accuracy,
            self.confusion.total()
        )?;
        for (label, m) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>20} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                label, m.precision, m.recall, m.f1, m.support
            )?;
        }
        Ok(())
    }
}
