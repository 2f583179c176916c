// Function object storage
// Generation-checked pools for prototypes and closures, addressed by
// ProtoId / ClosureId handles instead of references.
mod function_store;
mod pool;
mod pool_id;

pub use function_store::FunctionStore;
pub use pool::Pool;
pub use pool_id::{ClosureId, ProtoId};
