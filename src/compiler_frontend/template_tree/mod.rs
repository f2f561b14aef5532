pub mod line_lookup;
pub mod tree_nodes;
