//! 智能体运行时

use crate::agent::{Agent, AgentState};
use crate::context::{AgentContext, AgentResult};
use crate::error::{AgentError, AgentLifecycleError, AgentLifecycleResult};
use async_trait::async_trait;
use di_abstractions::{Disposable, ServiceResolver};
use di_impl::ServiceContainer;
use futures::FutureExt;
use infrastructure_common::{BoxError, HealthCheckResult, HealthCheckable, HealthStatus};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// 智能体运行时
///
/// 状态流转：`Created → Started → (Executing) → Started → Stopped`，
/// 启动失败或执行中出现 [`AgentError::Fatal`] 时进入 `Failed`。
/// `start` 与 `stop` 互斥执行；`execute` 可以并发调用。
pub struct AgentRuntime<A: Agent> {
    agent: Arc<A>,
    container: ServiceContainer,
    /// 串行化 start / stop
    lifecycle: tokio::sync::Mutex<()>,
    /// 只保存 Created / Started / Stopped / Failed，Executing 由 in_flight 推导
    state: RwLock<AgentState>,
    in_flight: AtomicUsize,
    /// 执行中计数归零时通知 stop
    idle: Notify,
    heartbeat: Mutex<Option<Heartbeat>>,
    last_health: Arc<RwLock<Option<HealthCheckResult>>>,
}

struct Heartbeat {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// 执行中计数守卫，最后一个执行结束时唤醒等待中的 stop
struct InFlight<'a> {
    counter: &'a AtomicUsize,
    idle: &'a Notify,
}

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, idle: &'a Notify) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self { counter, idle }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

impl<A: Agent> AgentRuntime<A> {
    /// 创建运行时，依赖从给定容器解析
    pub fn new(agent: A, container: ServiceContainer) -> Self {
        Self::from_arc(Arc::new(agent), container)
    }

    /// 用共享的智能体实例创建运行时
    pub fn from_arc(agent: Arc<A>, container: ServiceContainer) -> Self {
        Self {
            agent,
            container,
            lifecycle: tokio::sync::Mutex::new(()),
            state: RwLock::new(AgentState::Created),
            in_flight: AtomicUsize::new(0),
            idle: Notify::new(),
            heartbeat: Mutex::new(None),
            last_health: Arc::new(RwLock::new(None)),
        }
    }

    /// 被托管的智能体
    pub fn agent(&self) -> &Arc<A> {
        &self.agent
    }

    /// 智能体标识，取自配置中的 `id`
    pub fn id(&self) -> &str {
        &self.agent.config().id
    }

    /// 当前状态
    pub fn state(&self) -> AgentState {
        let state = *self.state.read();
        if state == AgentState::Started && self.in_flight.load(Ordering::SeqCst) > 0 {
            AgentState::Executing
        } else {
            state
        }
    }

    fn invalid_state(&self, state: AgentState, operation: &'static str) -> AgentLifecycleError {
        AgentLifecycleError::InvalidState {
            agent_id: self.id().to_string(),
            state,
            operation,
        }
    }

    /// 启动智能体
    ///
    /// 已启动时直接返回成功；已停止或已失败的运行时不能再次启动。
    /// 配置无效或被禁用时状态保持不变。
    pub async fn start(&self) -> AgentLifecycleResult<()> {
        let _lifecycle = self.lifecycle.lock().await;
        let config = self.agent.config();

        match self.state() {
            AgentState::Created => {}
            AgentState::Started | AgentState::Executing => {
                debug!("智能体已启动, 忽略重复启动: {}", config.id);
                return Ok(());
            }
            other => return Err(self.invalid_state(other, "start")),
        }

        config.validate()?;
        if !config.enabled {
            warn!("智能体已禁用, 拒绝启动: {}", config.id);
            return Err(AgentLifecycleError::Disabled {
                agent_id: config.id.clone(),
            });
        }

        info!("启动智能体: {} ({} v{})", config.id, config.name, config.version);

        if let Err(source) = self.initialize().await {
            *self.state.write() = AgentState::Failed;
            error!("智能体启动失败: {} - {}", config.id, source);
            return Err(AgentLifecycleError::StartFailed {
                agent_id: config.id.clone(),
                source,
            });
        }

        *self.state.write() = AgentState::Started;
        self.spawn_heartbeat();
        info!("智能体启动完成: {}", config.id);
        Ok(())
    }

    async fn initialize(&self) -> Result<(), AgentError> {
        for dependency in &self.agent.config().dependencies {
            debug!("解析智能体依赖: {}", dependency);
            self.container.resolve_any(*dependency).await?;
        }
        guarded(self.agent.on_start(&self.container)).await
    }

    /// 执行一次请求
    ///
    /// 整个调用（包括所有重试和退避）受 `timeout_ms` 限制。
    /// 业务失败、超时和 panic 都以失败的 [`AgentResult`] 返回。
    pub async fn execute(
        &self,
        payload: A::Input,
        mut context: AgentContext,
    ) -> AgentLifecycleResult<AgentResult<A::Output>> {
        let config = self.agent.config();

        let _in_flight = {
            // 在读锁内计数，stop 无法在检查与计数之间插入
            let state = self.state.read();
            if *state != AgentState::Started {
                return Err(self.invalid_state(*state, "execute"));
            }
            InFlight::enter(&self.in_flight, &self.idle)
        };

        if context.agent_id.is_none() {
            context.agent_id = Some(config.id.clone());
        }

        let span = info_span!(
            "agent_execute",
            agent_id = %config.id,
            session_id = %context.session_id
        );

        async {
            let started = Instant::now();
            let attempts = AtomicU32::new(0);

            let outcome = match tokio::time::timeout(
                config.timeout(),
                self.run_with_retries(&payload, &context, &attempts),
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(AgentError::Timeout {
                    timeout_ms: config.timeout_ms,
                }),
            };

            let attempts = attempts.load(Ordering::SeqCst);
            let elapsed = started.elapsed();

            match outcome {
                Ok(output) => {
                    info!(attempts, duration_ms = elapsed.as_millis() as u64, "执行成功");
                    Ok(AgentResult::success(output, attempts, elapsed))
                }
                Err(error) => {
                    if matches!(error, AgentError::Fatal(_)) {
                        let mut state = self.state.write();
                        if *state == AgentState::Started {
                            *state = AgentState::Failed;
                        }
                        error!(attempts, error = %error, "不可恢复的错误, 智能体进入失败状态");
                    } else {
                        warn!(attempts, error = %error, "执行失败");
                    }
                    Ok(AgentResult::failure(&error, attempts, elapsed))
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_with_retries(
        &self,
        payload: &A::Input,
        context: &AgentContext,
        attempts: &AtomicU32,
    ) -> Result<A::Output, AgentError> {
        let config = self.agent.config();
        let max_attempts = config.max_attempts();

        loop {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            match guarded(self.agent.process(payload, context)).await {
                Ok(output) => return Ok(output),
                Err(error) if attempt < max_attempts && self.agent.is_retriable(&error) => {
                    let backoff = config.retry_backoff(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %error,
                        "执行失败, 准备重试"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// 停止智能体，任何状态下都可以调用，重复调用无副作用
    ///
    /// 进入后立即拒绝新的执行，并等待已在执行中的请求结束（最多 `timeout_ms`）
    /// 再调用 `on_stop`。
    pub async fn stop(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        let previous = {
            let mut state = self.state.write();
            std::mem::replace(&mut *state, AgentState::Stopped)
        };
        if previous == AgentState::Stopped {
            return;
        }

        self.cancel_heartbeat().await;
        self.wait_idle().await;

        if matches!(previous, AgentState::Started | AgentState::Failed) {
            if let Err(e) = guarded(self.agent.on_stop()).await {
                error!("智能体停止回调失败: {} - {}", self.id(), e);
            }
        }

        info!("智能体已停止: {}", self.id());
    }

    /// 等待执行中的请求全部结束
    async fn wait_idle(&self) {
        let drained = async {
            loop {
                let notified = self.idle.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if self.in_flight.load(Ordering::SeqCst) == 0 {
                    return;
                }
                notified.await;
            }
        };

        let timeout = self.agent.config().timeout();
        if tokio::time::timeout(timeout, drained).await.is_err() {
            warn!(
                "等待执行中请求结束超时: {} ({} 个未完成)",
                self.id(),
                self.in_flight.load(Ordering::SeqCst)
            );
        }
    }

    fn spawn_heartbeat(&self) {
        let interval = self.agent.config().health_check_interval();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let agent = Arc::clone(&self.agent);
        let last_health = Arc::clone(&self.last_health);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let result = run_agent_check(agent.as_ref(), interval).await;
                        if !result.status.is_healthy() {
                            warn!("智能体心跳异常: {} - {:?}", result.component_name, result.status);
                        }
                        *last_health.write() = Some(result);
                    }
                }
            }
            debug!("心跳任务退出: {}", agent.config().id);
        });

        *self.heartbeat.lock() = Some(Heartbeat { cancel, handle });
    }

    async fn cancel_heartbeat(&self) {
        let heartbeat = self.heartbeat.lock().take();
        if let Some(heartbeat) = heartbeat {
            heartbeat.cancel.cancel();
            if let Err(e) = heartbeat.handle.await {
                warn!("心跳任务异常结束: {} - {}", self.id(), e);
            }
        }
    }

    /// 立即执行一次健康检查并记录结果
    pub async fn health_check(&self) -> HealthCheckResult {
        let result = run_agent_check(self.agent.as_ref(), self.agent.config().health_check_interval()).await;
        *self.last_health.write() = Some(result.clone());
        result
    }

    /// 最近一次心跳结果
    pub fn last_heartbeat(&self) -> Option<HealthCheckResult> {
        self.last_health.read().clone()
    }

    /// 运行中且超过两个心跳间隔没有新的心跳
    pub fn is_stalled(&self) -> bool {
        if !matches!(self.state(), AgentState::Started | AgentState::Executing) {
            return false;
        }
        let Some(last) = self.last_heartbeat() else {
            return false;
        };
        chrono::Duration::from_std(self.agent.config().health_check_interval() * 2)
            .map(|limit| last.age() > limit)
            .unwrap_or(false)
    }
}

impl<A: Agent> Drop for AgentRuntime<A> {
    fn drop(&mut self) {
        if let Some(heartbeat) = self.heartbeat.get_mut().take() {
            heartbeat.cancel.cancel();
        }
    }
}

#[async_trait]
impl<A: Agent> HealthCheckable for AgentRuntime<A> {
    async fn check_health(&self) -> HealthStatus {
        match self.state() {
            AgentState::Created => HealthStatus::degraded("智能体尚未启动"),
            AgentState::Stopped => HealthStatus::unhealthy("智能体已停止"),
            AgentState::Failed => HealthStatus::unhealthy("智能体处于失败状态"),
            AgentState::Started | AgentState::Executing => {
                if self.is_stalled() {
                    HealthStatus::degraded("心跳中断")
                } else {
                    self.health_check().await.status
                }
            }
        }
    }

    fn name(&self) -> &str {
        self.id()
    }

    fn check_interval(&self) -> Duration {
        self.agent.config().health_check_interval()
    }
}

#[async_trait]
impl<A: Agent> Disposable for AgentRuntime<A> {
    async fn dispose(&self) -> Result<(), BoxError> {
        self.stop().await;
        Ok(())
    }
}

async fn run_agent_check<A: Agent>(agent: &A, timeout: Duration) -> HealthCheckResult {
    let started = Instant::now();
    let status = match tokio::time::timeout(timeout, agent.check_health()).await {
        Ok(status) => status,
        Err(_) => HealthStatus::unhealthy(format!("健康检查超时 ({}ms)", timeout.as_millis())),
    };
    HealthCheckResult::new(agent.config().id.clone(), status, started.elapsed())
}

/// 执行业务回调，把 panic 转换为 [`AgentError::Panicked`]
async fn guarded<F, T>(future: F) -> Result<T, AgentError>
where
    F: Future<Output = Result<T, AgentError>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(AgentError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "未知 panic".to_string())
}
