//! 依赖注入容器的集成测试

use di_abstractions::{
    DiContainer, Disposable, ServiceDescriptor, ServiceRegistrar, ServiceResolver, ServiceToken,
};
use di_impl::ServiceContainer;
use infrastructure_common::{BoxError, DependencyError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// 测试用配置服务
#[derive(Debug)]
struct Settings {
    endpoint: String,
}

/// 测试用日志服务
#[derive(Debug)]
struct Journal {
    prefix: String,
}

#[derive(Debug, Error)]
#[error("连接被拒绝: {0}")]
struct ConnectionRefused(String);

trait Greeter: Send + Sync {
    fn greet(&self) -> String;
}

struct English;

impl Greeter for English {
    fn greet(&self) -> String {
        "hello".to_string()
    }
}

/// 记录释放调用的资源
struct TrackedResource {
    name: &'static str,
    fail: bool,
    journal: Arc<Mutex<Vec<&'static str>>>,
    dispose_calls: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl Disposable for TrackedResource {
    async fn dispose(&self) -> Result<(), BoxError> {
        self.dispose_calls.fetch_add(1, Ordering::SeqCst);
        self.journal.lock().unwrap().push(self.name);
        if self.fail {
            return Err(format!("{} 关闭失败", self.name).into());
        }
        Ok(())
    }
}

fn tracked(
    name: &'static str,
    fail: bool,
    journal: &Arc<Mutex<Vec<&'static str>>>,
    dispose_calls: &Arc<AtomicUsize>,
) -> impl Fn(ServiceContainer) -> futures::future::Ready<Result<Arc<TrackedResource>, BoxError>>
       + Send
       + Sync
       + 'static {
    let journal = Arc::clone(journal);
    let dispose_calls = Arc::clone(dispose_calls);
    move |_| {
        futures::future::ready(Ok(Arc::new(TrackedResource {
            name,
            fail,
            journal: Arc::clone(&journal),
            dispose_calls: Arc::clone(&dispose_calls),
        })))
    }
}

#[tokio::test]
async fn test_singleton_returns_same_instance() {
    let container = ServiceContainer::new();
    let settings: ServiceToken<Settings> = ServiceToken::new("settings");
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&calls);
    container
        .register_singleton(&settings, &[], move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async {
                Ok::<_, BoxError>(Arc::new(Settings {
                    endpoint: "localhost:5432".to_string(),
                }))
            }
        })
        .unwrap();

    let first = container.resolve(&settings).await.unwrap();
    let second = container.resolve(&settings).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.endpoint, "localhost:5432");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_transient_returns_new_instance_each_time() {
    let container = ServiceContainer::new();
    let journal: ServiceToken<Journal> = ServiceToken::new("journal");
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&calls);
    container
        .register_transient(&journal, &[], move |_| {
            let index = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok::<_, BoxError>(Arc::new(Journal {
                    prefix: format!("req-{index}"),
                }))
            }
        })
        .unwrap();

    let first = container.resolve(&journal).await.unwrap();
    let second = container.resolve(&journal).await.unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(first.prefix, "req-0");
    assert_eq!(second.prefix, "req-1");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_resolve_unregistered_service() {
    let container = ServiceContainer::new();
    let missing: ServiceToken<Settings> = ServiceToken::new("missing");

    let error = container.resolve(&missing).await.unwrap_err();
    assert!(matches!(error, DependencyError::NotRegistered { ref token } if token == "missing"));
}

#[tokio::test]
async fn test_duplicate_registration_is_rejected() {
    let container = ServiceContainer::new();
    let settings: ServiceToken<Settings> = ServiceToken::new("settings");

    container
        .register_instance(
            &settings,
            Arc::new(Settings {
                endpoint: "a".to_string(),
            }),
        )
        .unwrap();
    let error = container
        .register_instance(
            &settings,
            Arc::new(Settings {
                endpoint: "b".to_string(),
            }),
        )
        .unwrap_err();

    assert!(matches!(error, DependencyError::DuplicateRegistration { .. }));
    // 原注册保持不变
    assert_eq!(container.resolve(&settings).await.unwrap().endpoint, "a");
    assert_eq!(container.get_registered_services().len(), 1);
}

#[tokio::test]
async fn test_two_node_declared_cycle_reports_path() {
    let container = ServiceContainer::new();
    let a: ServiceToken<Settings> = ServiceToken::new("a");
    let b: ServiceToken<Settings> = ServiceToken::new("b");

    let factory = |_| async {
        Ok::<_, BoxError>(Arc::new(Settings {
            endpoint: String::new(),
        }))
    };
    container.register_singleton(&a, &[b.erase()], factory).unwrap();
    container.register_singleton(&b, &[a.erase()], factory).unwrap();

    let error = tokio::time::timeout(Duration::from_secs(1), container.resolve(&a))
        .await
        .expect("循环依赖不应导致挂起")
        .unwrap_err();

    match error {
        DependencyError::CircularDependency { dependency_chain } => {
            assert_eq!(dependency_chain, "a -> b -> a");
        }
        other => panic!("期望循环依赖错误, 实际: {other:?}"),
    }

    assert!(matches!(
        container.validate(),
        Err(DependencyError::CircularDependency { .. })
    ));
    assert_eq!(container.stats().in_flight, 0);
}

#[tokio::test]
async fn test_three_node_cycle_through_factory_resolution() {
    let container = ServiceContainer::new();
    let a: ServiceToken<Settings> = ServiceToken::new("a");
    let b: ServiceToken<Settings> = ServiceToken::new("b");
    let c: ServiceToken<Settings> = ServiceToken::new("c");

    // 依赖没有声明，只在工厂内部解析
    container
        .register_singleton(&a, &[], move |container: ServiceContainer| async move {
            container.resolve(&b).await
        })
        .unwrap();
    container
        .register_singleton(&b, &[], move |container: ServiceContainer| async move {
            container.resolve(&c).await
        })
        .unwrap();
    container
        .register_singleton(&c, &[], move |container: ServiceContainer| async move {
            container.resolve(&a).await
        })
        .unwrap();

    let error = tokio::time::timeout(Duration::from_secs(1), container.resolve(&a))
        .await
        .expect("循环依赖不应导致挂起")
        .unwrap_err();

    // 最内层的循环错误经由各层工厂原样传出
    match error {
        DependencyError::CircularDependency { dependency_chain } => {
            assert_eq!(dependency_chain, "a -> b -> c -> a");
        }
        other => panic!("期望循环依赖错误, 实际: {other:?}"),
    }

    // 失败后不缓存任何实例
    let stats = container.stats();
    assert_eq!(stats.cached_singletons, 0);
    assert_eq!(stats.in_flight, 0);
}

#[tokio::test]
async fn test_failed_factory_is_retried_on_next_resolve() {
    let container = ServiceContainer::new();
    let settings: ServiceToken<Settings> = ServiceToken::new("settings");
    let attempts = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&attempts);
    container
        .register_singleton(&settings, &[], move |_| {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    return Err(ConnectionRefused("db:5432".to_string()));
                }
                Ok(Arc::new(Settings {
                    endpoint: "db:5432".to_string(),
                }))
            }
        })
        .unwrap();

    let error = container.resolve(&settings).await.unwrap_err();
    assert!(error.is_factory_error());
    let original = error.downcast_factory_error::<ConnectionRefused>().unwrap();
    assert_eq!(original.0, "db:5432");
    assert_eq!(error.to_string(), "连接被拒绝: db:5432");

    // 失败没有被缓存
    assert!(matches!(
        container.resolve_sync(&settings),
        Err(DependencyError::NotResolved { .. })
    ));

    let resolved = container.resolve(&settings).await.unwrap();
    assert_eq!(resolved.endpoint, "db:5432");
    assert_eq!(attempts.load(Ordering::SeqCst), 2);

    let stats = container.stats();
    assert_eq!(stats.factory_invocations, 2);
    assert_eq!(stats.factory_failures, 1);
    assert_eq!(stats.cached_singletons, 1);
}

#[tokio::test]
async fn test_resolve_sync_rules() {
    let container = ServiceContainer::new();
    let settings: ServiceToken<Settings> = ServiceToken::new("settings");
    let journal: ServiceToken<Journal> = ServiceToken::new("journal");
    let missing: ServiceToken<Journal> = ServiceToken::new("missing");

    container
        .register_singleton(&settings, &[], |_| async {
            Ok::<_, BoxError>(Arc::new(Settings {
                endpoint: "cache".to_string(),
            }))
        })
        .unwrap();
    container
        .register_transient(&journal, &[], |_| async {
            Ok::<_, BoxError>(Arc::new(Journal {
                prefix: String::new(),
            }))
        })
        .unwrap();

    assert!(matches!(
        container.resolve_sync(&missing),
        Err(DependencyError::NotRegistered { .. })
    ));
    assert!(matches!(
        container.resolve_sync(&journal),
        Err(DependencyError::TransientNotCached { .. })
    ));
    assert!(matches!(
        container.resolve_sync(&settings),
        Err(DependencyError::NotResolved { .. })
    ));

    let resolved = container.resolve(&settings).await.unwrap();
    let cached = container.resolve_sync(&settings).unwrap();
    assert!(Arc::ptr_eq(&resolved, &cached));

    // 瞬时服务即使解析过也不能同步获取
    container.resolve(&journal).await.unwrap();
    assert!(matches!(
        container.resolve_sync(&journal),
        Err(DependencyError::TransientNotCached { .. })
    ));
}

#[tokio::test]
async fn test_resolve_sync_during_construction_reports_already_resolving() {
    let container = ServiceContainer::new();
    let settings: ServiceToken<Settings> = ServiceToken::new("settings");
    let observed = Arc::new(Mutex::new(None));

    let slot = Arc::clone(&observed);
    container
        .register_singleton(&settings, &[], move |container: ServiceContainer| {
            let slot = Arc::clone(&slot);
            async move {
                let result = container.resolve_sync(&settings);
                *slot.lock().unwrap() = Some(result.map(|_| ()));
                Ok::<_, BoxError>(Arc::new(Settings {
                    endpoint: String::new(),
                }))
            }
        })
        .unwrap();

    container.resolve(&settings).await.unwrap();

    let observed = observed.lock().unwrap().take().unwrap();
    assert!(matches!(
        observed,
        Err(DependencyError::AlreadyResolving { .. })
    ));
}

#[tokio::test]
async fn test_cancelled_resolution_leaves_no_marker() {
    let container = ServiceContainer::new();
    let settings: ServiceToken<Settings> = ServiceToken::new("slow-settings");

    container
        .register_singleton(&settings, &[], |_| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, BoxError>(Arc::new(Settings {
                endpoint: String::new(),
            }))
        })
        .unwrap();

    let outcome = tokio::time::timeout(Duration::from_millis(20), container.resolve(&settings)).await;
    assert!(outcome.is_err());

    assert_eq!(container.stats().in_flight, 0);
    assert!(matches!(
        container.resolve_sync(&settings),
        Err(DependencyError::NotResolved { .. })
    ));
}

#[tokio::test]
async fn test_dependencies_are_constructed_first() {
    let container = ServiceContainer::new();
    let settings: ServiceToken<Settings> = ServiceToken::new("config");
    let journal: ServiceToken<Journal> = ServiceToken::new("logger");
    let order = Arc::new(Mutex::new(Vec::new()));

    let log = Arc::clone(&order);
    container
        .register_singleton(&settings, &[], move |_| {
            log.lock().unwrap().push("config");
            async {
                Ok::<_, BoxError>(Arc::new(Settings {
                    endpoint: "file".to_string(),
                }))
            }
        })
        .unwrap();

    let log = Arc::clone(&order);
    container
        .register_singleton(&journal, &[settings.erase()], move |container: ServiceContainer| {
            log.lock().unwrap().push("logger");
            async move {
                // 声明的依赖已构造完成，可以同步获取
                let settings = container.resolve_sync(&settings)?;
                Ok::<_, BoxError>(Arc::new(Journal {
                    prefix: settings.endpoint.clone(),
                }))
            }
        })
        .unwrap();

    let logger = container.resolve(&journal).await.unwrap();
    assert_eq!(logger.prefix, "file");
    assert_eq!(*order.lock().unwrap(), vec!["config", "logger"]);
}

#[tokio::test]
async fn test_trait_object_service() {
    let container = ServiceContainer::new();
    let greeter: ServiceToken<dyn Greeter> = ServiceToken::new("greeter");

    container
        .register_singleton(&greeter, &[], |_| async {
            Ok::<Arc<dyn Greeter>, BoxError>(Arc::new(English))
        })
        .unwrap();

    let resolved = container.resolve(&greeter).await.unwrap();
    assert_eq!(resolved.greet(), "hello");

    let erased = container.resolve_any(greeter.erase()).await.unwrap();
    let recovered = erased.downcast_ref::<Arc<dyn Greeter>>().unwrap();
    assert!(Arc::ptr_eq(recovered, &resolved));
}

#[tokio::test]
async fn test_registered_instance_is_available_synchronously() {
    let container = ServiceContainer::new();
    let settings: ServiceToken<Settings> = ServiceToken::new("settings");
    let instance = Arc::new(Settings {
        endpoint: "preset".to_string(),
    });

    container.register_instance(&settings, Arc::clone(&instance)).unwrap();

    let cached = container.resolve_sync(&settings).unwrap();
    assert!(Arc::ptr_eq(&cached, &instance));
    assert_eq!(container.stats().factory_invocations, 0);
}

#[tokio::test]
async fn test_dispose_runs_each_hook_once_and_survives_failures() {
    let container = ServiceContainer::new();
    let faulty: ServiceToken<TrackedResource> = ServiceToken::new("faulty");
    let healthy: ServiceToken<TrackedResource> = ServiceToken::new("healthy");
    let journal = Arc::new(Mutex::new(Vec::new()));
    let faulty_calls = Arc::new(AtomicUsize::new(0));
    let healthy_calls = Arc::new(AtomicUsize::new(0));

    container
        .register(
            ServiceDescriptor::singleton(&healthy, tracked("healthy", false, &journal, &healthy_calls))
                .disposable(),
        )
        .unwrap();
    container
        .register(
            ServiceDescriptor::singleton(&faulty, tracked("faulty", true, &journal, &faulty_calls))
                .disposable(),
        )
        .unwrap();

    container.resolve(&healthy).await.unwrap();
    container.resolve(&faulty).await.unwrap();

    let report = container.dispose().await;
    assert_eq!(report.attempted(), 2);
    assert_eq!(report.disposed, vec![healthy.erase()]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].token, faulty.erase());
    assert!(!report.is_clean());

    // 再次释放不会重复调用钩子
    let second = container.dispose().await;
    assert_eq!(second.attempted(), 0);
    assert_eq!(faulty_calls.load(Ordering::SeqCst), 1);
    assert_eq!(healthy_calls.load(Ordering::SeqCst), 1);
    assert!(container.get_registered_services().is_empty());
}

#[tokio::test]
async fn test_dispose_in_reverse_construction_order() {
    let container = ServiceContainer::new();
    let config: ServiceToken<TrackedResource> = ServiceToken::new("config");
    let logger: ServiceToken<TrackedResource> = ServiceToken::new("logger");
    let database: ServiceToken<TrackedResource> = ServiceToken::new("database");
    let never_built: ServiceToken<TrackedResource> = ServiceToken::new("never-built");
    let journal = Arc::new(Mutex::new(Vec::new()));
    let calls = Arc::new(AtomicUsize::new(0));

    // 注册顺序与构造顺序不同
    container
        .register(
            ServiceDescriptor::singleton(&database, tracked("database", false, &journal, &calls))
                .depends_on(&logger)
                .disposable(),
        )
        .unwrap();
    container
        .register(
            ServiceDescriptor::singleton(&logger, tracked("logger", false, &journal, &calls))
                .depends_on(&config)
                .disposable(),
        )
        .unwrap();
    container
        .register(
            ServiceDescriptor::singleton(&config, tracked("config", false, &journal, &calls))
                .disposable(),
        )
        .unwrap();
    container
        .register(
            ServiceDescriptor::singleton(&never_built, tracked("never-built", false, &journal, &calls))
                .disposable(),
        )
        .unwrap();

    container.resolve(&database).await.unwrap();

    let report = container.dispose().await;
    assert!(report.is_clean());
    assert_eq!(*journal.lock().unwrap(), vec!["database", "logger", "config"]);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_dispose_service_is_not_repeated_by_dispose() {
    let container = ServiceContainer::new();
    let client: ServiceToken<TrackedResource> = ServiceToken::new("client");
    let journal = Arc::new(Mutex::new(Vec::new()));
    let calls = Arc::new(AtomicUsize::new(0));

    container
        .register(
            ServiceDescriptor::singleton(&client, tracked("client", false, &journal, &calls))
                .disposable(),
        )
        .unwrap();

    // 尚未构造时没有可释放的实例
    let early = container.dispose_service(&client).await.unwrap();
    assert_eq!(early.attempted(), 0);

    container.resolve(&client).await.unwrap();
    let report = container.dispose_service(&client).await.unwrap();
    assert_eq!(report.disposed, vec![client.erase()]);

    let sweep = container.dispose().await;
    assert_eq!(sweep.attempted(), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_clear_removes_registrations() {
    let container = ServiceContainer::new();
    let settings: ServiceToken<Settings> = ServiceToken::new("settings");

    container
        .register_instance(
            &settings,
            Arc::new(Settings {
                endpoint: String::new(),
            }),
        )
        .unwrap();
    assert!(container.is_registered(&settings));

    container.clear();

    assert!(!container.is_registered(&settings));
    assert!(matches!(
        container.resolve(&settings).await,
        Err(DependencyError::NotRegistered { .. })
    ));
}

#[tokio::test]
async fn test_registered_services_keep_registration_order() {
    let container = ServiceContainer::new();
    let names = ["config", "logger", "database", "ai", "mail"];

    for name in names {
        let token: ServiceToken<Settings> = ServiceToken::new(name);
        container
            .register_instance(
                &token,
                Arc::new(Settings {
                    endpoint: name.to_string(),
                }),
            )
            .unwrap();
    }

    let registered: Vec<_> = container
        .get_registered_services()
        .iter()
        .map(|token| token.name())
        .collect();
    assert_eq!(registered, names);
}

#[tokio::test]
async fn test_validate_reports_missing_dependency() {
    let container = ServiceContainer::new();
    let journal: ServiceToken<Journal> = ServiceToken::new("logger");
    let settings: ServiceToken<Settings> = ServiceToken::new("config");

    container
        .register_singleton(&journal, &[settings.erase()], |_| async {
            Ok::<_, BoxError>(Arc::new(Journal {
                prefix: String::new(),
            }))
        })
        .unwrap();

    let error = container.validate().unwrap_err();
    assert!(matches!(error, DependencyError::NotRegistered { ref token } if token.contains("config")));

    container
        .register_instance(
            &settings,
            Arc::new(Settings {
                endpoint: String::new(),
            }),
        )
        .unwrap();
    assert!(container.validate().is_ok());
}
