pub mod seen_store;

pub use seen_store::{SeenSet, SeenStore};
