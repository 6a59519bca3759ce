// ==========================================
// 记录导入引擎 - 任务执行器
// ==========================================
// 职责: 试运行开关（execute）+ 行迭代进度日志（progress）
// 说明: progress 为逐项透传，不缓冲、不改变顺序与数量
// ==========================================

use crate::config::RunOptions;
use crate::importer::error::ImportResult;
use std::future::Future;
use tracing::{debug, info};

// ==========================================
// TaskRunner
// ==========================================
#[derive(Debug, Clone)]
pub struct TaskRunner {
    dry_run: bool,
    progress_interval: usize,
}

impl TaskRunner {
    pub fn new(dry_run: bool, progress_interval: usize) -> Self {
        Self {
            dry_run,
            progress_interval,
        }
    }

    pub fn from_options(options: &RunOptions) -> Self {
        Self::new(options.dry_run, options.progress_interval)
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// 执行有副作用的动作（试运行时跳过，返回 None）
    pub async fn execute<T, Fut>(&self, description: &str, action: Fut) -> ImportResult<Option<T>>
    where
        Fut: Future<Output = ImportResult<T>>,
    {
        if self.dry_run {
            info!(action = description, "试运行模式，跳过执行");
            return Ok(None);
        }
        action.await.map(Some)
    }

    /// 包装迭代器，按间隔输出进度
    pub fn progress<I: Iterator>(&self, inner: I, description: &str) -> Progress<I> {
        Progress {
            inner,
            description: description.to_string(),
            interval: self.progress_interval,
            count: 0,
            finished: false,
        }
    }
}

impl Default for TaskRunner {
    fn default() -> Self {
        Self::from_options(&RunOptions::default())
    }
}

// ==========================================
// Progress - 进度透传迭代器
// ==========================================
pub struct Progress<I> {
    inner: I,
    description: String,
    interval: usize,
    count: usize,
    finished: bool,
}

impl<I> Progress<I> {
    /// 已透传的元素数
    pub fn processed(&self) -> usize {
        self.count
    }
}

impl<I: Iterator> Iterator for Progress<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        match self.inner.next() {
            Some(item) => {
                self.count += 1;
                if self.interval > 0 && self.count % self.interval == 0 {
                    debug!(task = %self.description, processed = self.count, "处理中");
                }
                Some(item)
            }
            None => {
                if !self.finished {
                    self.finished = true;
                    info!(task = %self.description, total = self.count, "处理完成");
                }
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_preserves_order_and_count() {
        let runner = TaskRunner::new(false, 2);
        let mut progress = runner.progress(vec![3, 1, 2].into_iter(), "rows");
        let items: Vec<i32> = progress.by_ref().collect();
        assert_eq!(items, vec![3, 1, 2]);
        assert_eq!(progress.processed(), 3);
        assert_eq!(progress.next(), None);
    }

    #[tokio::test]
    async fn test_execute_skipped_on_dry_run() {
        let runner = TaskRunner::new(true, 0);
        let result = runner.execute("commit", async { Ok(42) }).await.unwrap();
        assert_eq!(result, None);

        let runner = TaskRunner::new(false, 0);
        let result = runner.execute("commit", async { Ok(42) }).await.unwrap();
        assert_eq!(result, Some(42));
    }
}
