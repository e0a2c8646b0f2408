//! 依赖注入容器的并发场景集成测试

use di_abstractions::{DiContainer, ServiceRegistrar, ServiceResolver, ServiceToken};
use di_impl::ServiceContainer;
use infrastructure_common::{BoxError, DependencyError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
struct AppSettings {
    log_level: String,
}

#[derive(Debug)]
struct AppLogger {
    level: String,
}

/// 注册 config 与依赖它的 logger，返回两者的工厂调用计数
fn register_config_and_logger(
    container: &ServiceContainer,
    config: ServiceToken<AppSettings>,
    logger: ServiceToken<AppLogger>,
) -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let config_calls = Arc::new(AtomicUsize::new(0));
    let logger_calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&config_calls);
    container
        .register_singleton(&config, &[], move |_| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                // 模拟读取配置文件
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<_, BoxError>(Arc::new(AppSettings {
                    log_level: "debug".to_string(),
                }))
            }
        })
        .unwrap();

    let counter = Arc::clone(&logger_calls);
    container
        .register_singleton(&logger, &[config.erase()], move |container: ServiceContainer| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                let settings = container.resolve(&config).await?;
                Ok::<_, BoxError>(Arc::new(AppLogger {
                    level: settings.log_level.clone(),
                }))
            }
        })
        .unwrap();

    (config_calls, logger_calls)
}

#[tokio::test]
async fn test_concurrent_resolution_constructs_singleton_once() {
    let container = ServiceContainer::new();
    let config = ServiceToken::new("config");
    let logger = ServiceToken::new("logger");
    let (config_calls, logger_calls) = register_config_and_logger(&container, config, logger);

    let (first, second, settings) = futures::join!(
        container.resolve(&logger),
        container.resolve(&logger),
        container.resolve(&config),
    );

    let first = first.unwrap();
    let second = second.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.level, "debug");
    assert_eq!(settings.unwrap().log_level, "debug");

    assert_eq!(config_calls.load(Ordering::SeqCst), 1);
    assert_eq!(logger_calls.load(Ordering::SeqCst), 1);
    assert_eq!(container.stats().in_flight, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_singleton_race_across_worker_threads() {
    let container = ServiceContainer::new();
    let config = ServiceToken::new("config");
    let logger = ServiceToken::new("logger");
    let (config_calls, logger_calls) = register_config_and_logger(&container, config, logger);

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let container = container.clone();
            tokio::spawn(async move { container.resolve(&logger).await })
        })
        .collect();

    let mut instances = Vec::new();
    for handle in handles {
        instances.push(handle.await.unwrap().unwrap());
    }

    assert!(instances.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    assert_eq!(config_calls.load(Ordering::SeqCst), 1);
    assert_eq!(logger_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_declared_cycle_is_rejected_without_deadlock() {
    let container = ServiceContainer::new();
    let a: ServiceToken<AppSettings> = ServiceToken::new("a");
    let b: ServiceToken<AppSettings> = ServiceToken::new("b");

    let factory = |_| async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok::<_, BoxError>(Arc::new(AppSettings {
            log_level: String::new(),
        }))
    };
    container.register_singleton(&a, &[b.erase()], factory).unwrap();
    container.register_singleton(&b, &[a.erase()], factory).unwrap();

    let left = tokio::spawn({
        let container = container.clone();
        async move { container.resolve(&a).await }
    });
    let right = tokio::spawn({
        let container = container.clone();
        async move { container.resolve(&b).await }
    });

    let (left, right) = tokio::time::timeout(Duration::from_secs(2), async {
        (left.await.unwrap(), right.await.unwrap())
    })
    .await
    .expect("并发解析循环依赖不应死锁");

    assert!(matches!(left, Err(DependencyError::CircularDependency { .. })));
    assert!(matches!(right, Err(DependencyError::CircularDependency { .. })));
    assert_eq!(container.stats().cached_singletons, 0);
}

#[tokio::test]
async fn test_waiters_retry_after_failed_construction() {
    let container = ServiceContainer::new();
    let config: ServiceToken<AppSettings> = ServiceToken::new("config");
    let attempts = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&attempts);
    container
        .register_singleton(&config, &[], move |_| {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                if attempt == 0 {
                    return Err(BoxError::from("配置文件暂时不可读"));
                }
                Ok(Arc::new(AppSettings {
                    log_level: "info".to_string(),
                }))
            }
        })
        .unwrap();

    let (first, second) = futures::join!(container.resolve(&config), container.resolve(&config));

    // 首次构造失败只影响发起它的调用方，等待者重新调用工厂
    let first = first.unwrap_err();
    assert!(first.is_factory_error());
    assert_eq!(second.unwrap().log_level, "info");
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert!(container.resolve_sync(&config).is_ok());
}

#[tokio::test]
async fn test_failed_construction_leaves_service_unresolved() {
    let container = ServiceContainer::new();
    let config: ServiceToken<AppSettings> = ServiceToken::new("config");

    container
        .register_singleton(&config, &[], |_| async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err::<Arc<AppSettings>, BoxError>("配置源不可用".into())
        })
        .unwrap();

    let (first, second) = futures::join!(container.resolve(&config), container.resolve(&config));
    assert!(first.unwrap_err().is_factory_error());
    assert!(second.unwrap_err().is_factory_error());

    assert!(matches!(
        container.resolve_sync(&config),
        Err(DependencyError::NotResolved { .. })
    ));

    let stats = container.stats();
    assert_eq!(stats.in_flight, 0);
    assert_eq!(stats.cached_singletons, 0);
    assert_eq!(stats.factory_failures, 2);
}

#[tokio::test]
async fn test_parallel_branches_share_dependency_without_false_cycle() {
    let container = ServiceContainer::new();
    let config: ServiceToken<AppSettings> = ServiceToken::new("config");
    let logger: ServiceToken<AppLogger> = ServiceToken::new("logger");
    let (config_calls, _) = register_config_and_logger(&container, config, logger);

    let database: ServiceToken<String> = ServiceToken::new("database");
    let ai: ServiceToken<String> = ServiceToken::new("ai");
    let app: ServiceToken<(String, String)> = ServiceToken::new("app");

    container
        .register_singleton(&database, &[config.erase()], move |container: ServiceContainer| async move {
            let settings = container.resolve(&config).await?;
            Ok::<_, BoxError>(Arc::new(format!("db@{}", settings.log_level)))
        })
        .unwrap();
    // ai 不声明依赖，只在工厂内部解析 config
    container
        .register_singleton(&ai, &[], move |container: ServiceContainer| async move {
            let settings = container.resolve(&config).await?;
            Ok::<_, BoxError>(Arc::new(format!("ai@{}", settings.log_level)))
        })
        .unwrap();
    container
        .register_singleton(&app, &[], move |container: ServiceContainer| async move {
            let (db, model) = futures::try_join!(container.resolve(&database), container.resolve(&ai))?;
            Ok::<_, BoxError>(Arc::new(((*db).clone(), (*model).clone())))
        })
        .unwrap();

    let resolved = tokio::time::timeout(Duration::from_secs(2), container.resolve(&app))
        .await
        .expect("共享依赖的并行分支不应互相等待到超时")
        .unwrap();

    assert_eq!(resolved.0, "db@debug");
    assert_eq!(resolved.1, "ai@debug");
    assert_eq!(config_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cycle_inside_parallel_branch_is_still_reported() {
    let container = ServiceContainer::new();
    let app: ServiceToken<String> = ServiceToken::new("app");
    let left: ServiceToken<String> = ServiceToken::new("left");
    let right: ServiceToken<String> = ServiceToken::new("right");

    container
        .register_singleton(&left, &[], |_| async { Ok::<_, BoxError>(Arc::new("left".to_string())) })
        .unwrap();
    container
        .register_singleton(&right, &[], move |container: ServiceContainer| async move {
            container.resolve(&app).await?;
            Ok::<_, BoxError>(Arc::new("right".to_string()))
        })
        .unwrap();
    container
        .register_singleton(&app, &[], move |container: ServiceContainer| async move {
            futures::try_join!(container.resolve(&left), container.resolve(&right))?;
            Ok::<_, BoxError>(Arc::new("app".to_string()))
        })
        .unwrap();

    match container.resolve(&app).await {
        Err(DependencyError::CircularDependency { dependency_chain }) => {
            assert_eq!(dependency_chain, "app -> right -> app");
        }
        other => panic!("期望循环依赖错误, 实际: {:?}", other.map(|_| ())),
    }
}
