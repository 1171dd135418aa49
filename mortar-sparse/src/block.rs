use crate::{AlgebraError, Map, SparseMatrix};
use std::ops::Range;
use std::sync::Arc;

/// A rectangular grid of sparse blocks whose row and column maps partition larger maps.
///
/// Blocks are owned behind [`Arc`] so that a *view* can share them with another block matrix.
/// Mutating a block while it is shared is a programming error and panics.
#[derive(Debug, Clone)]
pub struct BlockMatrix {
    row_maps: Vec<Arc<Map>>,
    col_maps: Vec<Arc<Map>>,
    // Row-major
    blocks: Vec<Arc<SparseMatrix>>,
}

impl BlockMatrix {
    /// A block matrix whose blocks are empty and assembling.
    pub fn new(row_maps: Vec<Arc<Map>>, col_maps: Vec<Arc<Map>>) -> Self {
        let blocks = row_maps
            .iter()
            .flat_map(|row_map| col_maps.iter().map(move |_| Arc::new(SparseMatrix::new(row_map.clone()))))
            .collect();
        Self {
            row_maps,
            col_maps,
            blocks,
        }
    }

    /// Splits a filled matrix into filled blocks.
    pub fn split(matrix: &SparseMatrix, row_maps: Vec<Arc<Map>>, col_maps: Vec<Arc<Map>>) -> Result<Self, AlgebraError> {
        let mut blocks = Vec::with_capacity(row_maps.len() * col_maps.len());
        for row_map in &row_maps {
            for col_map in &col_maps {
                blocks.push(Arc::new(matrix.extract(row_map, col_map)?));
            }
        }
        Ok(Self {
            row_maps,
            col_maps,
            blocks,
        })
    }

    pub fn num_block_rows(&self) -> usize {
        self.row_maps.len()
    }

    pub fn num_block_cols(&self) -> usize {
        self.col_maps.len()
    }

    pub fn row_map(&self, i: usize) -> &Arc<Map> {
        &self.row_maps[i]
    }

    pub fn col_map(&self, j: usize) -> &Arc<Map> {
        &self.col_maps[j]
    }

    fn index(&self, i: usize, j: usize) -> usize {
        assert!(
            i < self.num_block_rows() && j < self.num_block_cols(),
            "block ({}, {}) out of bounds",
            i,
            j
        );
        i * self.num_block_cols() + j
    }

    pub fn block(&self, i: usize, j: usize) -> &SparseMatrix {
        &self.blocks[self.index(i, j)]
    }

    /// # Panics
    ///
    /// Panics if the block is shared with a view.
    pub fn block_mut(&mut self, i: usize, j: usize) -> &mut SparseMatrix {
        let idx = self.index(i, j);
        match Arc::get_mut(&mut self.blocks[idx]) {
            Some(block) => block,
            None => panic!("block ({}, {}) is shared with a view and cannot be modified", i, j),
        }
    }

    /// # Panics
    ///
    /// Panics if the row map of `block` differs from the block row map.
    pub fn set_block(&mut self, i: usize, j: usize, block: SparseMatrix) {
        assert_eq!(
            block.row_map().as_ref(),
            self.row_maps[i].as_ref(),
            "block row map must match the block row"
        );
        let idx = self.index(i, j);
        self.blocks[idx] = Arc::new(block);
    }

    pub fn is_shared(&self, i: usize, j: usize) -> bool {
        Arc::strong_count(&self.blocks[self.index(i, j)]) > 1
    }

    /// Makes block `(i, j)` share storage with block `(k, l)` of `source`.
    pub fn assign_view(&mut self, i: usize, j: usize, source: &BlockMatrix, k: usize, l: usize) {
        assert_eq!(
            source.row_maps[k].as_ref(),
            self.row_maps[i].as_ref(),
            "viewed block must have the same row map"
        );
        let idx = self.index(i, j);
        self.blocks[idx] = Arc::clone(&source.blocks[source.index(k, l)]);
    }

    /// A block matrix sharing the blocks in the given block ranges.
    pub fn view(&self, rows: Range<usize>, cols: Range<usize>) -> BlockMatrix {
        let blocks = rows
            .clone()
            .flat_map(|i| cols.clone().map(move |j| (i, j)))
            .map(|(i, j)| Arc::clone(&self.blocks[self.index(i, j)]))
            .collect();
        BlockMatrix {
            row_maps: self.row_maps[rows].to_vec(),
            col_maps: self.col_maps[cols].to_vec(),
            blocks,
        }
    }

    /// Fills every assembling block against its block column map.
    pub fn fill(&mut self) -> Result<(), AlgebraError> {
        for i in 0..self.num_block_rows() {
            for j in 0..self.num_block_cols() {
                if !self.block(i, j).is_filled() {
                    let col_map = self.col_maps[j].clone();
                    self.block_mut(i, j).fill_with_col_map(col_map)?;
                }
            }
        }
        Ok(())
    }

    /// # Panics
    ///
    /// Panics if any filled block is shared with a view.
    pub fn unfill(&mut self) {
        for i in 0..self.num_block_rows() {
            for j in 0..self.num_block_cols() {
                if self.block(i, j).is_filled() {
                    self.block_mut(i, j).unfill();
                }
            }
        }
    }

    /// A single filled matrix over the union of the block maps.
    pub fn merge(&self) -> Result<SparseMatrix, AlgebraError> {
        let row_map = Arc::new(Map::union_all(self.row_maps.iter().map(AsRef::as_ref)));
        let col_map = Arc::new(Map::union_all(self.col_maps.iter().map(AsRef::as_ref)));
        let nnz = self.blocks.iter().map(|block| block.nnz()).sum();
        let mut merged = SparseMatrix::with_capacity(row_map, nnz);
        for block in &self.blocks {
            merged.add(block, 1.0)?;
        }
        merged.fill_with_col_map(col_map)?;
        Ok(merged)
    }

    /// Zeros the rows in `rows` across every block row, writing one on the diagonal of diagonal blocks.
    ///
    /// All affected blocks must be filled.
    pub fn apply_dirichlet(&mut self, rows: &Map) -> Result<(), AlgebraError> {
        for i in 0..self.num_block_rows() {
            if self.row_maps[i].intersection(rows).is_empty() {
                continue;
            }
            for j in 0..self.num_block_cols() {
                self.block_mut(i, j).apply_dirichlet(rows, i == j)?;
            }
        }
        Ok(())
    }
}
