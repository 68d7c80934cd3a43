//! Symmetric sparse matrix in compressed sparse column (CSC) format.
//!
//! CSC is the factorization-facing format: the upper triangle is stored
//! column by column, which is what the LDL backend consumes directly.
//! Matrices are either built incrementally (`insert` + `finalize_column`)
//! or converted from COO with [`SymmetricCsc::from_coo`], which also
//! returns a scatter map so numeric values can be refreshed in place when
//! only entry values change between factorizations.

use super::coo::SymmetricCoo;

/// Symmetric matrix, upper triangle, compressed sparse column format.
#[derive(Debug, Clone)]
pub struct SymmetricCsc {
    dimension: usize,
    column_starts: Vec<usize>,
    row_indices: Vec<usize>,
    entries: Vec<f64>,
    current_column: usize,
    use_regularization: bool,
    // per-column index of the diagonal entry, if present
    diagonal_slots: Vec<Option<usize>>,
    // diagonal value excluding regularization
    base_diagonal: Vec<f64>,
}

impl SymmetricCsc {
    pub fn new(dimension: usize, capacity: usize, use_regularization: bool) -> Self {
        Self {
            dimension,
            column_starts: vec![0; dimension + 1],
            row_indices: Vec::with_capacity(capacity),
            entries: Vec::with_capacity(capacity),
            current_column: 0,
            use_regularization,
            diagonal_slots: vec![None; dimension],
            base_diagonal: vec![0.0; dimension],
        }
    }

    /// The identity matrix of the given dimension.
    pub fn identity(dimension: usize) -> Self {
        let mut matrix = Self::new(dimension, dimension, false);
        for i in 0..dimension {
            matrix.insert(i, i, 1.0);
            matrix.finalize_column(i);
        }
        matrix
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    pub fn column_starts(&self) -> &[usize] {
        &self.column_starts
    }

    pub fn row_indices(&self) -> &[usize] {
        &self.row_indices
    }

    pub fn entries(&self) -> &[f64] {
        &self.entries
    }

    /// Insert an upper-triangle entry into the current column. Columns must
    /// be filled in order and closed with [`finalize_column`].
    ///
    /// [`finalize_column`]: SymmetricCsc::finalize_column
    pub fn insert(&mut self, row: usize, column: usize, value: f64) {
        assert!(column == self.current_column, "previous columns are final");
        assert!(row <= column, "only the upper triangle is stored");
        if row == column {
            assert!(
                self.diagonal_slots[column].is_none(),
                "duplicate diagonal entry in column {}",
                column
            );
            self.diagonal_slots[column] = Some(self.entries.len());
            self.base_diagonal[column] = value;
        }
        self.row_indices.push(row);
        self.entries.push(value);
        self.column_starts[column + 1] += 1;
    }

    /// Close the current column. With regularization enabled, a zero
    /// diagonal slot is appended when the column has no diagonal entry.
    /// Each column is finalized exactly once, in order.
    pub fn finalize_column(&mut self, column: usize) {
        assert!(column == self.current_column, "columns are finalized in order");
        assert!(column < self.dimension);
        if self.use_regularization && self.diagonal_slots[column].is_none() {
            self.diagonal_slots[column] = Some(self.entries.len());
            self.row_indices.push(column);
            self.entries.push(0.0);
            self.column_starts[column + 1] += 1;
        }
        self.current_column += 1;
        // start the next column where this one ended
        if column + 1 < self.dimension {
            self.column_starts[column + 2] = self.column_starts[column + 1];
        }
    }

    /// Visit every stored entry as `(row, column, value)`.
    pub fn for_each(&self, mut f: impl FnMut(usize, usize, f64)) {
        for column in 0..self.dimension {
            for k in self.column_starts[column]..self.column_starts[column + 1] {
                f(self.row_indices[k], column, self.entries[k]);
            }
        }
    }

    /// Visit the entries of one column as `(row, value)`.
    pub fn for_each_in_column(&self, column: usize, mut f: impl FnMut(usize, f64)) {
        for k in self.column_starts[column]..self.column_starts[column + 1] {
            f(self.row_indices[k], self.entries[k]);
        }
    }

    /// Smallest diagonal entry, including any regularization in effect.
    pub fn smallest_diagonal_entry(&self) -> f64 {
        let mut smallest = f64::INFINITY;
        for column in 0..self.dimension {
            let value = match self.diagonal_slots[column] {
                Some(k) => self.entries[k],
                None => 0.0,
            };
            smallest = smallest.min(value);
        }
        smallest
    }

    /// Overwrite each diagonal with its base value plus
    /// `regularization(index)`.
    pub fn set_regularization(&mut self, regularization: impl Fn(usize) -> f64) {
        assert!(self.use_regularization, "regularization was not preallocated");
        for column in 0..self.dimension {
            let k = self.diagonal_slots[column].expect("column was not finalized");
            self.entries[k] = self.base_diagonal[column] + regularization(column);
        }
    }

    /// Convert a lower-triangle COO matrix into upper-triangle CSC,
    /// summing duplicate coordinates. The returned scatter map sends COO
    /// entry `k` to its CSC position, so values can be refreshed with
    /// [`refresh_from_coo`] while the pattern is unchanged.
    ///
    /// [`refresh_from_coo`]: SymmetricCsc::refresh_from_coo
    pub fn from_coo(coo: &SymmetricCoo) -> (Self, Vec<usize>) {
        let n = coo.dimension();
        let nnz = coo.nnz();
        let rows = coo.row_indices();
        let cols = coo.column_indices();

        // lower (i, j), i >= j maps to upper (j, i): csc column = i, row = j
        // sort entry ids by (column, row) and merge duplicates
        let mut order: Vec<usize> = (0..nnz).collect();
        order.sort_unstable_by_key(|&k| (rows[k], cols[k]));

        let mut matrix = Self::new(n, nnz, false);
        let mut scatter = vec![0usize; nnz];
        let mut position = 0usize;
        let mut last: Option<(usize, usize)> = None;
        let mut counts = vec![0usize; n];
        for &k in &order {
            let coord = (rows[k], cols[k]);
            if last != Some(coord) {
                if last.is_some() {
                    position += 1;
                }
                matrix.row_indices.push(coord.1);
                matrix.entries.push(0.0);
                counts[coord.0] += 1;
                if coord.0 == coord.1 {
                    matrix.diagonal_slots[coord.0] = Some(position);
                }
                last = Some(coord);
            }
            scatter[k] = position;
        }
        for column in 0..n {
            matrix.column_starts[column + 1] = matrix.column_starts[column] + counts[column];
        }
        matrix.current_column = n;
        matrix.refresh_from_coo(coo, &scatter);
        (matrix, scatter)
    }

    /// Refresh entry values from a COO matrix with the same pattern.
    pub fn refresh_from_coo(&mut self, coo: &SymmetricCoo, scatter: &[usize]) {
        debug_assert_eq!(scatter.len(), coo.nnz());
        self.entries.fill(0.0);
        let values = coo.entries();
        for (k, &position) in scatter.iter().enumerate() {
            self.entries[position] += values[k];
        }
        for column in 0..self.dimension {
            if let Some(k) = self.diagonal_slots[column] {
                self.base_diagonal[column] = self.entries[k];
            }
        }
    }

    /// Symmetric matrix-vector product `y = A x`.
    pub fn multiply(&self, x: &[f64], y: &mut [f64]) {
        debug_assert_eq!(x.len(), self.dimension);
        debug_assert_eq!(y.len(), self.dimension);
        y.fill(0.0);
        self.for_each(|row, column, value| {
            y[row] += value * x[column];
            if row != column {
                y[column] += value * x[row];
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_for_each_roundtrip() {
        let mut matrix = SymmetricCsc::new(3, 4, false);
        matrix.insert(0, 0, 1.0);
        matrix.finalize_column(0);
        matrix.insert(0, 1, 2.0);
        matrix.insert(1, 1, 3.0);
        matrix.finalize_column(1);
        matrix.finalize_column(2);

        let mut seen = Vec::new();
        matrix.for_each(|i, j, v| seen.push((i, j, v)));
        assert_eq!(seen, vec![(0, 0, 1.0), (0, 1, 2.0), (1, 1, 3.0)]);

        // column-start differences equal the per-column nonzero counts
        assert_eq!(matrix.column_starts(), &[0, 1, 3, 3]);
    }

    #[test]
    fn test_regularization_slot_appended() {
        let mut matrix = SymmetricCsc::new(2, 4, true);
        matrix.insert(0, 0, 4.0);
        matrix.finalize_column(0);
        matrix.insert(0, 1, 1.0);
        matrix.finalize_column(1); // no diagonal inserted: slot created

        matrix.set_regularization(|_| 0.5);
        assert_eq!(matrix.smallest_diagonal_entry(), 0.5);

        matrix.set_regularization(|_| 0.0);
        assert_eq!(matrix.smallest_diagonal_entry(), 0.0);

        // base diagonal is preserved under repeated regularization
        matrix.set_regularization(|_| 1.0);
        let mut diag = Vec::new();
        matrix.for_each(|i, j, v| {
            if i == j {
                diag.push(v);
            }
        });
        assert_eq!(diag, vec![5.0, 1.0]);
    }

    #[test]
    fn test_identity_multiply() {
        let identity = SymmetricCsc::identity(3);
        let x = vec![0.5, -1.0, 2.0];
        let mut y = vec![0.0; 3];
        identity.multiply(&x, &mut y);
        assert_eq!(y, x);
    }

    #[test]
    fn test_from_coo_merges_duplicates() {
        // lower triangle of [[2, 1], [1, 3]] with a split diagonal entry
        let mut coo = SymmetricCoo::new(2);
        coo.insert(0, 0, 1.5);
        coo.insert(0, 0, 0.5);
        coo.insert(1, 0, 1.0);
        coo.insert(1, 1, 3.0);

        let (csc, scatter) = SymmetricCsc::from_coo(&coo);
        assert_eq!(csc.nnz(), 3);
        assert_eq!(scatter.len(), 4);

        let mut y = vec![0.0; 2];
        csc.multiply(&[1.0, 1.0], &mut y);
        assert_eq!(y, vec![3.0, 4.0]);
    }

    #[test]
    fn test_refresh_from_coo() {
        let mut coo = SymmetricCoo::new(2);
        coo.insert(0, 0, 1.0);
        coo.insert(1, 1, 1.0);
        coo.add_regularization_slots();

        let (mut csc, scatter) = SymmetricCsc::from_coo(&coo);
        coo.set_regularization(|_| 10.0);
        csc.refresh_from_coo(&coo, &scatter);
        assert_eq!(csc.smallest_diagonal_entry(), 11.0);
    }
}
