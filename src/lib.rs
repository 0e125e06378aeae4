pub mod db;
pub mod error;
pub mod evaluator;
pub mod model;
pub mod ops;
pub mod output;
pub mod paths;
pub mod recurrence;
pub mod store;
pub mod streak;
pub mod tree;

pub use error::StoreError;
pub use evaluator::{effective_checked, should_recur};
pub use model::{CheckEvent, Task, TaskView};
pub use ops::SqliteStore;
pub use recurrence::{parse, validate, Recurrence, Recurs};
pub use store::{CheckRequest, MemoryStore, NewTask, Snapshot, TaskStore, TaskUpdate};
pub use streak::streak;
pub use tree::{build_forest, Filter};
