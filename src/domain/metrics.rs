// ============================================================
// Layer 3 — Classification Metrics
// ============================================================
// Framework-free maths behind the Metric Evaluator. The ml layer
// copies logits and labels to host memory and feeds them here.
//
// F1 follows the usual multi-class definition restricted to a
// fixed class-index set 0..n_classes:
//   precision = tp / (tp + fp), 0 when nothing was predicted
//   recall    = tp / (tp + fn), 0 when the class has no support
//   f1        = 2pr / (p + r),  0 when p + r = 0
// Macro-F1 averages over every class in the set, including
// classes absent from the split. Weighted-F1 weights by support.

/// Mean loss / accuracy of one training epoch.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EpochStats {
    pub loss:     f64,
    /// Percentage in [0, 100]
    pub accuracy: f64,
    /// Batches that went into the means
    pub batches:  usize,
}

/// Result of one evaluation pass over a split.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EvalSummary {
    pub loss:           f64,
    /// Percentage in [0, 100]
    pub accuracy:       f64,
    pub macro_f1:       f64,
    pub weighted_f1:    f64,
    /// Percentage in [0, 100]
    pub top_k_accuracy: f64,
}

/// Running mean over accepted batches only.
///
/// Skipped batches never reach `add`, so they are absent from
/// both the sums and the denominator.
#[derive(Debug, Default)]
pub struct BatchAverager {
    loss_sum: f64,
    acc_sum:  f64,
    batches:  usize,
}

impl BatchAverager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, loss: f64, accuracy: f64) {
        self.loss_sum += loss;
        self.acc_sum += accuracy;
        self.batches += 1;
    }

    pub fn batches(&self) -> usize {
        self.batches
    }

    pub fn mean_loss(&self) -> f64 {
        if self.batches == 0 { return 0.0; }
        self.loss_sum / self.batches as f64
    }

    pub fn mean_accuracy(&self) -> f64 {
        if self.batches == 0 { return 0.0; }
        self.acc_sum / self.batches as f64
    }

    pub fn stats(&self) -> EpochStats {
        EpochStats { loss: self.mean_loss(), accuracy: self.mean_accuracy(), batches: self.batches }
    }
}

/// counts[true][predicted] over a fixed class-index set.
#[derive(Debug, Clone)]
pub struct ConfusionMatrix {
    n_classes: usize,
    counts:    Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn new(n_classes: usize) -> Self {
        Self { n_classes, counts: vec![vec![0; n_classes]; n_classes] }
    }

    #[cfg(test)]
    pub fn from_pairs(n_classes: usize, pairs: &[(usize, usize)]) -> Self {
        let mut cm = Self::new(n_classes);
        for &(truth, pred) in pairs {
            cm.record(truth, pred);
        }
        cm
    }

    /// Labels outside the class set are ignored.
    pub fn record(&mut self, truth: usize, predicted: usize) {
        if truth < self.n_classes && predicted < self.n_classes {
            self.counts[truth][predicted] += 1;
        }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn support(&self, class: usize) -> usize {
        self.counts[class].iter().sum()
    }

    pub fn true_positives(&self, class: usize) -> usize {
        self.counts[class][class]
    }

    pub fn false_positives(&self, class: usize) -> usize {
        (0..self.n_classes)
            .filter(|&t| t != class)
            .map(|t| self.counts[t][class])
            .sum()
    }

    pub fn false_negatives(&self, class: usize) -> usize {
        self.support(class) - self.true_positives(class)
    }

    /// Fraction in [0, 1].
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 { return 0.0; }
        let correct: usize = (0..self.n_classes).map(|c| self.counts[c][c]).sum();
        correct as f64 / total as f64
    }

    pub fn f1(&self, class: usize) -> f64 {
        let tp = self.true_positives(class) as f64;
        let fp = self.false_positives(class) as f64;
        let fn_ = self.false_negatives(class) as f64;

        let precision = if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 };
        let recall    = if tp + fn_ > 0.0 { tp / (tp + fn_) } else { 0.0 };
        if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        }
    }

    pub fn macro_f1(&self) -> f64 {
        if self.n_classes == 0 { return 0.0; }
        (0..self.n_classes).map(|c| self.f1(c)).sum::<f64>() / self.n_classes as f64
    }

    pub fn weighted_f1(&self) -> f64 {
        let total = self.total();
        if total == 0 { return 0.0; }
        (0..self.n_classes)
            .map(|c| self.f1(c) * self.support(c) as f64)
            .sum::<f64>()
            / total as f64
    }

    /// (correct, total) per class.
    pub fn per_class(&self) -> Vec<(usize, usize)> {
        (0..self.n_classes)
            .map(|c| (self.true_positives(c), self.support(c)))
            .collect()
    }

    /// Table with one row per true label, using `names` for headers.
    pub fn render(&self, names: &[String]) -> String {
        let name = |i: usize| names.get(i).cloned().unwrap_or_else(|| i.to_string());
        let width = (0..self.n_classes).map(|i| name(i).len()).max().unwrap_or(1).max(5);

        let mut out = format!("{:>width$} |", "true\\pred");
        for p in 0..self.n_classes {
            out.push_str(&format!(" {:>width$}", name(p)));
        }
        out.push('\n');
        for t in 0..self.n_classes {
            out.push_str(&format!("{:>width$} |", name(t)));
            for p in 0..self.n_classes {
                out.push_str(&format!(" {:>width$}", self.counts[t][p]));
            }
            out.push('\n');
        }
        out
    }
}

/// Index of the highest score; first index wins ties.
pub fn argmax(row: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in row.iter().enumerate() {
        if v > row[best] {
            best = i;
        }
    }
    best
}

/// True when `label` is among the `k` highest scores of `row`.
/// Equal scores rank by index, as in `argmax`.
pub fn in_top_k(row: &[f32], label: usize, k: usize) -> bool {
    match row.get(label) {
        Some(&score) => {
            let ahead = row
                .iter()
                .enumerate()
                .filter(|&(i, &v)| v > score || (v == score && i < label))
                .count();
            ahead < k
        }
        None => false,
    }
}

pub fn softmax(row: &[f32]) -> Vec<f32> {
    let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = row.iter().map(|&v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn four_pair_scenario_keeps_absent_recall_class_in_macro_average() {
        // (true, predicted)
        let cm = ConfusionMatrix::from_pairs(3, &[(0, 0), (1, 1), (2, 0), (0, 0)]);

        // class 0: p = 2/3, r = 1 -> f1 = 0.8; class 1: 1.0; class 2: 0.0
        assert!(close(cm.f1(0), 0.8));
        assert!(close(cm.f1(1), 1.0));
        assert!(close(cm.f1(2), 0.0));
        assert!(close(cm.macro_f1(), 1.8 / 3.0));
        assert!(close(cm.weighted_f1(), (0.8 * 2.0 + 1.0) / 4.0));
        assert!(close(cm.accuracy(), 0.75));
    }

    #[test]
    fn classes_without_support_do_not_panic() {
        let cm = ConfusionMatrix::from_pairs(5, &[(1, 1), (1, 1)]);
        assert!(close(cm.macro_f1(), 1.0 / 5.0));
        assert!(close(cm.weighted_f1(), 1.0));
        assert_eq!(cm.per_class()[4], (0, 0));
    }

    #[test]
    fn empty_matrix_scores_zero() {
        let cm = ConfusionMatrix::new(3);
        assert_eq!(cm.macro_f1(), 0.0);
        assert_eq!(cm.weighted_f1(), 0.0);
        assert_eq!(cm.accuracy(), 0.0);
    }

    #[test]
    fn out_of_range_labels_are_ignored() {
        let cm = ConfusionMatrix::from_pairs(2, &[(0, 0), (7, 1), (1, 9)]);
        assert_eq!(cm.total(), 1);
    }

    #[test]
    fn top_k_membership() {
        let row = [0.1, 0.7, 0.3, 0.9];
        assert!(in_top_k(&row, 3, 1));
        assert!(!in_top_k(&row, 1, 1));
        assert!(in_top_k(&row, 2, 3));
        assert!(!in_top_k(&row, 0, 3));
        assert!(!in_top_k(&row, 10, 3));
    }

    #[test]
    fn top_k_breaks_ties_by_index() {
        let row = [0.5, 0.5, 0.5, 0.1];
        assert!(in_top_k(&row, 0, 1));
        assert!(!in_top_k(&row, 1, 1));
        assert!(!in_top_k(&row, 2, 1));
        assert!(in_top_k(&row, 1, 2));
        assert!(!in_top_k(&row, 2, 2));
        assert_eq!(argmax(&row), 0);
    }

    #[test]
    fn argmax_prefers_first_on_ties() {
        assert_eq!(argmax(&[1.0, 3.0, 3.0]), 1);
    }

    #[test]
    fn batch_averager_ignores_nothing_it_never_saw() {
        let mut avg = BatchAverager::new();
        assert_eq!(avg.mean_loss(), 0.0);
        avg.add(2.0, 50.0);
        avg.add(1.0, 100.0);
        assert_eq!(avg.batches(), 2);
        assert!(close(avg.mean_loss(), 1.5));
        assert!(close(avg.mean_accuracy(), 75.0));
    }

    #[test]
    fn render_uses_label_names() {
        let cm = ConfusionMatrix::from_pairs(2, &[(0, 1)]);
        let table = cm.render(&["joyful".to_string(), "sad".to_string()]);
        assert!(table.contains("joyful"));
        assert!(table.contains("sad"));
    }

    proptest! {
        #[test]
        fn f1_scores_are_bounded(pairs in proptest::collection::vec((0usize..4, 0usize..4), 0..64)) {
            let cm = ConfusionMatrix::from_pairs(4, &pairs);
            for score in [cm.macro_f1(), cm.weighted_f1(), cm.accuracy()] {
                prop_assert!((0.0..=1.0).contains(&score));
            }
        }

        #[test]
        fn softmax_sums_to_one(row in proptest::collection::vec(-20.0f32..20.0, 1..16)) {
            let probs = softmax(&row);
            let sum: f32 = probs.iter().sum();
            prop_assert!((sum - 1.0).abs() < 1e-4);
            prop_assert!(probs.iter().all(|&p| (0.0..=1.0).contains(&p)));
        }
    }
}
