pub mod btree;
pub mod config;
pub mod map;

pub use btree::{
    BTree, BTreeError, BTreeResult, Compare, Iter, MIN_DEGREE_FLOOR, Natural, NodeId, Reverse,
};
pub use config::{ConfigError, ConfigResult, DEFAULT_MIN_DEGREE, TreeConfig};
pub use map::{ByKey, OrderedMap};
