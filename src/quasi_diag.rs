use crate::linkage::Merge;

/// Leaf order of the dendrogram: a permutation of `0..n_assets` in which
/// assets merged at low distance end up adjacent.
///
/// The original pandas formulation repeatedly splices cluster ids into a
/// relabelled index sequence; expanding the merge tree directly is equivalent
/// and avoids the index bookkeeping. Each cluster id expands into its left
/// child followed by its right child until only leaf ids remain.
pub fn quasi_diagonal_order(n_assets: usize, merges: &[Merge]) -> Vec<usize> {
    if merges.is_empty() {
        return (0..n_assets).collect();
    }
    let mut order = Vec::with_capacity(n_assets);
    expand(n_assets, merges, n_assets + merges.len() - 1, &mut order);
    order
}

fn expand(n_assets: usize, merges: &[Merge], id: usize, out: &mut Vec<usize>) {
    if id < n_assets {
        out.push(id);
        return;
    }
    let merge = &merges[id - n_assets];
    expand(n_assets, merges, merge.left, out);
    expand(n_assets, merges, merge.right, out);
}
