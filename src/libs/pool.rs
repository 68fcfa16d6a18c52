use crate::libs::error::{GofmError, Result};
use rayon::prelude::*;
use tracing::warn;

/// A work item that failed, with the reason.
#[derive(Debug, Clone)]
pub struct WorkError<I> {
    pub item: I,
    pub message: String,
}

/// Fixed-size worker pool that processes items in bounded chunks.
///
/// Items of one chunk run in parallel; the chunk's results reach the sink in
/// input order before the next chunk starts, so at most `chunk` results are
/// held in memory and output order never depends on scheduling.
pub struct Pool {
    pool: rayon::ThreadPool,
    chunk: usize,
}

impl Pool {
    pub fn new(threads: usize, chunk: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .build()
            .map_err(|e| GofmError::InvalidParameter(format!("thread pool: {}", e)))?;
        Ok(Self {
            pool,
            chunk: chunk.max(1),
        })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `work` over `items`, handing each chunk's successes to `sink`.
    ///
    /// Failed items are collected and returned; an error from `sink` aborts the run.
    pub fn run<I, R, W, S>(&self, items: &[I], work: W, mut sink: S) -> Result<Vec<WorkError<I>>>
    where
        I: Clone + Sync,
        R: Send,
        W: Fn(&I) -> Result<R> + Sync,
        S: FnMut(Vec<R>) -> Result<()>,
    {
        let mut errors = vec![];

        for chunk in items.chunks(self.chunk) {
            let outcomes: Vec<Result<R>> =
                self.pool.install(|| chunk.par_iter().map(&work).collect());

            let mut results = Vec::with_capacity(outcomes.len());
            for (item, outcome) in chunk.iter().zip(outcomes) {
                match outcome {
                    Ok(r) => results.push(r),
                    Err(e) => {
                        warn!("work item failed: {}", e);
                        errors.push(WorkError {
                            item: item.clone(),
                            message: e.to_string(),
                        });
                    }
                }
            }
            sink(results)?;
        }

        Ok(errors)
    }

    /// Collect all successes in input order
    pub fn map<I, R, W>(&self, items: &[I], work: W) -> Result<(Vec<R>, Vec<WorkError<I>>)>
    where
        I: Clone + Sync,
        R: Send,
        W: Fn(&I) -> Result<R> + Sync,
    {
        let mut all = Vec::with_capacity(items.len());
        let errors = self.run(items, work, |mut rs| {
            all.append(&mut rs);
            Ok(())
        })?;
        Ok((all, errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_results_and_errors() {
        let pool = Pool::new(4, 3).unwrap();
        let items: Vec<u32> = (0..10).collect();

        let (results, errors) = pool
            .map(&items, |&x| {
                if x == 7 {
                    Err(GofmError::InvalidParameter("seven".to_string()))
                } else {
                    Ok(x * 10)
                }
            })
            .unwrap();

        assert_eq!(results, vec![0, 10, 20, 30, 40, 50, 60, 80, 90]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].item, 7);
        assert!(errors[0].message.contains("seven"));
    }

    #[test]
    fn sink_sees_bounded_chunks() {
        let pool = Pool::new(2, 4).unwrap();
        let items: Vec<usize> = (0..10).collect();
        let mut sizes = vec![];
        pool.run(&items, |&x| Ok(x), |rs| {
            sizes.push(rs.len());
            Ok(())
        })
        .unwrap();
        assert_eq!(sizes, vec![4, 4, 2]);
    }
}
