pub mod search;
pub mod seed;
pub mod tree_ops;
