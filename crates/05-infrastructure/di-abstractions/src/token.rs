//! 服务标识

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TOKEN_ID: AtomicU64 = AtomicU64::new(1);

/// 服务标识编号，进程内唯一
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(u64);

impl TokenId {
    fn next() -> Self {
        Self(NEXT_TOKEN_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// 原始编号
    pub fn get(self) -> u64 {
        self.0
    }
}

/// 类型化的服务标识
///
/// 相等性只比较创建时分配的编号，名称仅用于诊断输出，
/// 因此两个同名标识互不相等。类型参数保证解析结果的类型，
/// 也可以是 trait 对象，例如 `ServiceToken<dyn MailClient>`。
pub struct ServiceToken<T: ?Sized> {
    id: TokenId,
    name: &'static str,
    _marker: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized> ServiceToken<T> {
    /// 创建新的服务标识
    pub fn new(name: &'static str) -> Self {
        Self {
            id: TokenId::next(),
            name,
            _marker: PhantomData,
        }
    }

    /// 标识编号
    pub fn id(&self) -> TokenId {
        self.id
    }

    /// 标识名称
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T: ?Sized + 'static> ServiceToken<T> {
    /// 擦除类型参数
    pub fn erase(&self) -> AnyToken {
        AnyToken {
            id: self.id,
            name: self.name,
            type_name: std::any::type_name::<T>(),
        }
    }
}

impl<T: ?Sized> Clone for ServiceToken<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for ServiceToken<T> {}

impl<T: ?Sized> PartialEq for ServiceToken<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T: ?Sized> Eq for ServiceToken<T> {}

impl<T: ?Sized> Hash for ServiceToken<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T: ?Sized> fmt::Debug for ServiceToken<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceToken")
            .field("id", &self.id.0)
            .field("name", &self.name)
            .finish()
    }
}

impl<T: ?Sized> fmt::Display for ServiceToken<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id.0)
    }
}

/// 擦除类型后的服务标识
///
/// 用于依赖声明、注册枚举和循环依赖诊断。
#[derive(Debug, Clone, Copy)]
pub struct AnyToken {
    id: TokenId,
    name: &'static str,
    type_name: &'static str,
}

impl AnyToken {
    /// 标识编号
    pub fn id(&self) -> TokenId {
        self.id
    }

    /// 标识名称
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 服务类型名称
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl PartialEq for AnyToken {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for AnyToken {}

impl Hash for AnyToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for AnyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl<T: ?Sized + 'static> From<&ServiceToken<T>> for AnyToken {
    fn from(token: &ServiceToken<T>) -> Self {
        token.erase()
    }
}

impl<T: ?Sized + 'static> From<ServiceToken<T>> for AnyToken {
    fn from(token: ServiceToken<T>) -> Self {
        token.erase()
    }
}

/// 按解析顺序格式化依赖链，例如 `a -> b -> a`
pub fn format_chain(chain: &[AnyToken]) -> String {
    chain
        .iter()
        .map(AnyToken::name)
        .collect::<Vec<_>>()
        .join(" -> ")
}
