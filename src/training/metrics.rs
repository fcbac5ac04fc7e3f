// Classification metrics over class indices
//
// Empty inputs score 0.0 and undefined ratios (0 / 0) count as 0.0.

/// Fraction of matching predictions
pub fn accuracy(y_true: &[u32], y_pred: &[u32]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let hits = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    hits as f64 / y_true.len() as f64
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// (precision, recall, f1) for one class treated as positive
pub fn precision_recall_f1(y_true: &[u32], y_pred: &[u32], positive: u32) -> (f64, f64, f64) {
    let mut tp = 0;
    let mut fp = 0;
    let mut fn_ = 0;
    for (&t, &p) in y_true.iter().zip(y_pred) {
        match (t == positive, p == positive) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = ratio(2 * tp, 2 * tp + fp + fn_);
    (precision, recall, f1)
}

/// Binary F1 for `positive`
pub fn f1_score(y_true: &[u32], y_pred: &[u32], positive: u32) -> f64 {
    precision_recall_f1(y_true, y_pred, positive).2
}

/// Unweighted mean of per-class (precision, recall, f1)
pub fn macro_scores(y_true: &[u32], y_pred: &[u32], num_classes: usize) -> (f64, f64, f64) {
    if num_classes == 0 {
        return (0.0, 0.0, 0.0);
    }
    let (mut p, mut r, mut f) = (0.0, 0.0, 0.0);
    for class in 0..num_classes as u32 {
        let (cp, cr, cf) = precision_recall_f1(y_true, y_pred, class);
        p += cp;
        r += cr;
        f += cf;
    }
    let n = num_classes as f64;
    (p / n, r / n, f / n)
}

/// counts[true][predicted]
pub fn confusion_matrix(y_true: &[u32], y_pred: &[u32], num_classes: usize) -> Vec<Vec<usize>> {
    let mut counts = vec![vec![0usize; num_classes]; num_classes];
    for (&t, &p) in y_true.iter().zip(y_pred) {
        if (t as usize) < num_classes && (p as usize) < num_classes {
            counts[t as usize][p as usize] += 1;
        }
    }
    counts
}

/// Area under the ROC curve of `scores` for the `positive` class
///
/// Computed from average ranks (Mann-Whitney U), so tied scores count half.
/// Returns `None` when either class is absent.
pub fn roc_auc(y_true: &[u32], scores: &[f32], positive: u32) -> Option<f64> {
    let n_pos = y_true.iter().filter(|&&t| t == positive).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len().min(y_true.len())).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // 1-based average rank of the tie group
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            if y_true[idx] == positive {
                rank_sum_pos += avg_rank;
            }
        }
        i = j + 1;
    }

    let u = rank_sum_pos - (n_pos * (n_pos + 1)) as f64 / 2.0;
    Some(u / (n_pos * n_neg) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accuracy_and_empty() {
        assert_eq!(accuracy(&[0, 1, 1, 0], &[0, 1, 0, 0]), 0.75);
        assert_eq!(accuracy(&[], &[]), 0.0);
    }

    #[test]
    fn test_f1_with_lie_positive() {
        // lie = 0: tp = 2, fp = 1, fn = 1
        let y_true = [0, 0, 0, 1, 1];
        let y_pred = [0, 0, 1, 0, 1];
        let (p, r, f) = precision_recall_f1(&y_true, &y_pred, 0);
        assert!((p - 2.0 / 3.0).abs() < 1e-12);
        assert!((r - 2.0 / 3.0).abs() < 1e-12);
        assert!((f - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(f1_score(&[1, 1], &[1, 1], 0), 0.0, "no positives scores zero");
    }

    #[test]
    fn test_macro_scores() {
        let y_true = [0, 0, 1, 1];
        let y_pred = [0, 1, 1, 1];
        let (p, r, _) = macro_scores(&y_true, &y_pred, 2);
        // class 0: p = 1, r = 0.5; class 1: p = 2/3, r = 1
        assert!((p - (1.0 + 2.0 / 3.0) / 2.0).abs() < 1e-12);
        assert!((r - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_confusion_matrix() {
        let cm = confusion_matrix(&[0, 0, 1], &[0, 1, 1], 2);
        assert_eq!(cm, vec![vec![1, 1], vec![0, 1]]);
    }

    #[test]
    fn test_roc_auc() {
        let y_true = [0, 0, 1, 1];
        assert_eq!(roc_auc(&y_true, &[0.9, 0.8, 0.3, 0.1], 0), Some(1.0));
        assert_eq!(roc_auc(&y_true, &[0.1, 0.2, 0.8, 0.9], 0), Some(0.0));
        assert_eq!(roc_auc(&y_true, &[0.5, 0.5, 0.5, 0.5], 0), Some(0.5));
        assert_eq!(roc_auc(&[0, 0], &[0.2, 0.4], 0), None);
    }
}
