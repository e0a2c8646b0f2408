//! 解析路径管理
//!
//! 每条解析调用链持有自己的路径副本：解析依赖时把路径复制一份再压入，
//! 调用工厂时把当前路径放进 task-local，工厂内部的 `resolve` 从这里接续。
//! 同一工厂内并发解析的多个分支各自从同一父路径派生，互不影响；
//! 只有同一条调用链上重复出现的服务才算循环依赖。

use crate::registration::Registration;
use di_abstractions::ResolutionPath;
use std::future::Future;

tokio::task_local! {
    static RESOLUTION_PATH: ResolutionPath;
}

/// 当前所在工厂的解析路径，不在任何工厂内时为空路径
pub(crate) fn current_path() -> ResolutionPath {
    RESOLUTION_PATH.try_with(Clone::clone).unwrap_or_default()
}

/// 在给定路径下执行工厂
pub(crate) async fn within<F>(path: ResolutionPath, future: F) -> F::Output
where
    F: Future,
{
    RESOLUTION_PATH.scope(path, future).await
}

/// 单个服务的解析守卫
///
/// 进入时增加解析计数；无论成功、失败还是被取消，离开时都会撤销。
pub(crate) struct ResolutionGuard<'a> {
    registration: &'a Registration,
    contended: bool,
}

impl<'a> ResolutionGuard<'a> {
    pub(crate) fn enter(registration: &'a Registration) -> Self {
        let previous = registration.begin_resolving();
        Self {
            registration,
            contended: previous > 0,
        }
    }

    /// 进入时是否已有其他调用链在处理同一服务
    pub(crate) fn is_contended(&self) -> bool {
        self.contended
    }
}

impl Drop for ResolutionGuard<'_> {
    fn drop(&mut self) {
        self.registration.end_resolving();
    }
}
