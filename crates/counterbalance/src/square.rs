//! Balanced Latin square construction.
//!
//! Rows follow the standard zigzag ordering: row `i`, column `j` holds
//! `(n - j/2 + i) mod n` for even `j` and `(j/2 + 1 + i) mod n` for odd
//! `j`. Every row is a permutation of `0..n` and every column takes each
//! value exactly once across the first `n` rows. First-order carryover is
//! balanced only for even `n`; for odd `n` the square is doubled with the
//! reverse of each base row, which restores it across the `2n` rows.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::assigner::TrialOrder;
use crate::error::CounterbalanceError;

/// A balanced Latin square over condition indices `0..n`.
///
/// Construction is pure: the same order always yields the same square.
/// Generated once at startup and shared read-only thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancedLatinSquare {
    n: usize,
    rows: Vec<TrialOrder>,
}

impl BalancedLatinSquare {
    /// Generate the balanced square for `n` conditions.
    ///
    /// Returns `n` rows for even `n` and `2n` rows for odd `n`.
    pub fn generate(n: usize) -> Result<Self, CounterbalanceError> {
        if n < 1 {
            return Err(CounterbalanceError::SizeTooSmall(n));
        }

        let mut rows: Vec<TrialOrder> = (0..n)
            .map(|i| {
                let cells = (0..n)
                    .map(|j| {
                        if j % 2 == 0 {
                            (n - j / 2 + i) % n
                        } else {
                            (j / 2 + 1 + i) % n
                        }
                    })
                    .collect();
                TrialOrder::new(cells)
            })
            .collect();

        // Odd orders only balance carryover once each row is also seen
        // reversed, so the square doubles to 2n rows.
        if n % 2 == 1 {
            let reversed: Vec<TrialOrder> = rows.iter().map(TrialOrder::reversed).collect();
            rows.extend(reversed);
        }

        Ok(Self { n, rows })
    }

    /// Number of conditions ordered by each row.
    pub fn order(&self) -> usize {
        self.n
    }

    /// Number of rows: `n` for even orders, `2n` for odd orders.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// The row assigned to a given run index.
    pub fn row(&self, run_index: usize) -> Result<&TrialOrder, CounterbalanceError> {
        self.rows
            .get(run_index)
            .ok_or(CounterbalanceError::RunIndexOutOfRange {
                index: run_index,
                rows: self.rows.len(),
            })
    }

    /// Like [`row`](Self::row), but wraps the run index modulo the row
    /// count. Callers that can overrun the square must opt into wrapping
    /// explicitly; the plain selector stays strict.
    pub fn row_wrapping(&self, run_index: usize) -> &TrialOrder {
        &self.rows[run_index % self.rows.len()]
    }

    /// Iterate over all rows in order.
    pub fn rows(&self) -> impl Iterator<Item = &TrialOrder> {
        self.rows.iter()
    }
}

impl fmt::Display for BalancedLatinSquare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.rows.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{row}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_permutation(row: &TrialOrder, n: usize) -> bool {
        let mut seen = vec![false; n];
        for &v in row.as_slice() {
            if v >= n || seen[v] {
                return false;
            }
            seen[v] = true;
        }
        seen.iter().all(|&x| x)
    }

    #[test]
    fn rejects_empty_square() {
        assert_eq!(
            BalancedLatinSquare::generate(0),
            Err(CounterbalanceError::SizeTooSmall(0))
        );
    }

    #[test]
    fn pinned_rows_for_order_four() {
        let square = BalancedLatinSquare::generate(4).unwrap();
        let rows: Vec<&[usize]> = square.rows().map(TrialOrder::as_slice).collect();
        assert_eq!(
            rows,
            vec![
                &[0, 1, 3, 2][..],
                &[1, 2, 0, 3][..],
                &[2, 3, 1, 0][..],
                &[3, 0, 2, 1][..],
            ]
        );
    }

    #[test]
    fn every_row_is_a_permutation() {
        for n in 1..=12 {
            let square = BalancedLatinSquare::generate(n).unwrap();
            for row in square.rows() {
                assert!(
                    is_permutation(row, n),
                    "order {} row {:?} is not a permutation",
                    n,
                    row
                );
            }
        }
    }

    #[test]
    fn even_orders_have_n_rows() {
        for n in [2, 4, 6, 10, 20] {
            assert_eq!(BalancedLatinSquare::generate(n).unwrap().row_count(), n);
        }
    }

    #[test]
    fn odd_orders_double_the_rows() {
        assert_eq!(BalancedLatinSquare::generate(3).unwrap().row_count(), 6);
        for n in [1, 5, 7, 9] {
            assert_eq!(BalancedLatinSquare::generate(n).unwrap().row_count(), 2 * n);
        }
    }

    #[test]
    fn odd_extension_rows_are_exact_reverses() {
        let square = BalancedLatinSquare::generate(5).unwrap();
        for i in 0..5 {
            let base: Vec<usize> = square.row(i).unwrap().as_slice().to_vec();
            let mut reversed: Vec<usize> = base.clone();
            reversed.reverse();
            assert_eq!(square.row(5 + i).unwrap().as_slice(), &reversed[..]);
        }
    }

    #[test]
    fn columns_are_balanced_for_even_orders() {
        for n in [2, 4, 6, 8] {
            let square = BalancedLatinSquare::generate(n).unwrap();
            for col in 0..n {
                let mut seen = vec![false; n];
                for row in square.rows().take(n) {
                    let v = row.as_slice()[col];
                    assert!(!seen[v], "order {} column {} repeats {}", n, col, v);
                    seen[v] = true;
                }
            }
        }
    }

    #[test]
    fn generation_is_deterministic() {
        for n in [3, 4, 7, 20] {
            assert_eq!(
                BalancedLatinSquare::generate(n).unwrap(),
                BalancedLatinSquare::generate(n).unwrap()
            );
        }
    }

    #[test]
    fn row_selection_is_strict_at_the_bound() {
        let square = BalancedLatinSquare::generate(4).unwrap();
        assert!(square.row(3).is_ok());
        assert_eq!(
            square.row(4),
            Err(CounterbalanceError::RunIndexOutOfRange { index: 4, rows: 4 })
        );
    }

    #[test]
    fn wrapping_selection_wraps_modulo_row_count() {
        let square = BalancedLatinSquare::generate(4).unwrap();
        assert_eq!(square.row_wrapping(4), square.row(0).unwrap());
        assert_eq!(square.row_wrapping(7), square.row(3).unwrap());
    }

    #[test]
    fn single_condition_square() {
        let square = BalancedLatinSquare::generate(1).unwrap();
        assert_eq!(square.row_count(), 2);
        assert_eq!(square.row(0).unwrap().as_slice(), &[0]);
        assert_eq!(square.row(1).unwrap().as_slice(), &[0]);
    }

    #[test]
    fn display_joins_rows_with_newlines() {
        let square = BalancedLatinSquare::generate(2).unwrap();
        assert_eq!(format!("{square}"), "0 1\n1 0");
    }
}
