//! Document transformation: recursive editing, field injection and small
//! value helpers.

pub mod edit;
pub mod fields;
pub mod util;

pub use edit::{Editor, KeyRewrite, RegexRules, ValueRewrite};
pub use fields::{FieldAdder, FieldValue};
pub use util::{
    camel_case, date_to_epoch_millis, flatten, get_path, human_size, parse_scalar, remove_empty,
    split_chunks,
};

use rayon::prelude::*;
use tracing::debug;

use crate::error::Result;

/// Splits `items` into `workers` near-equal ordered chunks, processes them on
/// a dedicated thread pool and concatenates the results in original order.
///
/// # Errors
///
/// Returns an error if the thread pool cannot be built.
pub fn fan_out<T, U, F>(items: Vec<T>, workers: usize, f: F) -> Result<Vec<U>>
where
    T: Send,
    U: Send,
    F: Fn(Vec<T>) -> Vec<U> + Send + Sync,
{
    let workers = workers.max(1);
    if workers == 1 || items.len() < 2 {
        return Ok(f(items));
    }

    let chunks = split_chunks(items, workers);
    debug!("Fanning out {} chunks over {} workers", chunks.len(), workers);

    let pool = rayon::ThreadPoolBuilder::new().num_threads(workers).build()?;
    let results: Vec<Vec<U>> = pool.install(|| chunks.into_par_iter().map(&f).collect());

    Ok(results.into_iter().flatten().collect())
}
