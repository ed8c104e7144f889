// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::TokioAsyncResolver;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::models::check::{BounceRisk, CheckReport};

/// 地址检查错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckError {
    /// 暂时性失败（网络超时等），可以重试
    #[error("Transient check failure: {0}")]
    Transient(String),

    /// 不可恢复的失败，重试没有意义
    #[error("Check failed: {0}")]
    Permanent(String),
}

impl CheckError {
    pub fn is_transient(&self) -> bool {
        matches!(self, CheckError::Transient(_))
    }
}

/// 单地址校验能力
///
/// 工作器只通过此特质调用校验逻辑。实现必须是地址的纯函数
/// （同一地址多次检查得到相同结论），以保证任务重复投递时的幂等性。
#[async_trait]
pub trait AddressCheck: Send + Sync {
    /// 检查单个地址
    async fn check(&self, address: &str) -> Result<CheckReport, CheckError>;
}

#[async_trait]
impl<T: AddressCheck + ?Sized> AddressCheck for Arc<T> {
    async fn check(&self, address: &str) -> Result<CheckReport, CheckError> {
        (**self).check(address).await
    }
}

/// 域名解析能力
#[async_trait]
pub trait DomainResolver: Send + Sync {
    /// 域名能否解析
    ///
    /// * `Ok(false)` - 域名确定不存在
    /// * `Err(CheckError::Transient)` - 解析超时或网络故障
    async fn resolves(&self, domain: &str) -> Result<bool, CheckError>;
}

/// 单次 DNS 查询的结论
#[derive(Debug, Clone, PartialEq, Eq)]
enum DnsOutcome {
    /// 查到了记录
    Found,
    /// 域名存在但没有该类型记录（NODATA）
    NoRecords,
    /// 域名不存在（NXDOMAIN）
    NoDomain,
    /// 超时或网络故障
    Failed(String),
}

impl DnsOutcome {
    fn from_error(err: &ResolveError) -> Self {
        match err.kind() {
            ResolveErrorKind::NoRecordsFound { response_code, .. }
                if *response_code == ResponseCode::NXDomain =>
            {
                DnsOutcome::NoDomain
            }
            ResolveErrorKind::NoRecordsFound { .. } => DnsOutcome::NoRecords,
            _ => DnsOutcome::Failed(err.to_string()),
        }
    }
}

/// 先看 MX 记录，没有 MX 时按隐式 MX 规则回退到 A/AAAA
async fn mail_domain_exists<F, Fut>(mx: DnsOutcome, address_lookup: F) -> Result<bool, CheckError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = DnsOutcome>,
{
    match mx {
        DnsOutcome::Found => Ok(true),
        DnsOutcome::NoDomain => Ok(false),
        DnsOutcome::Failed(message) => Err(CheckError::Transient(message)),
        DnsOutcome::NoRecords => match address_lookup().await {
            DnsOutcome::Found => Ok(true),
            DnsOutcome::NoRecords | DnsOutcome::NoDomain => Ok(false),
            DnsOutcome::Failed(message) => Err(CheckError::Transient(message)),
        },
    }
}

/// 基于 DNS 的域名检查
///
/// 使用系统解析配置，读取失败时退回默认上游。
pub struct SystemResolver {
    resolver: TokioAsyncResolver,
    timeout: Duration,
}

impl SystemResolver {
    pub fn new(timeout: Duration) -> Self {
        let resolver = TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|e| {
            warn!("Failed to load system resolver config, using defaults: {}", e);
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
        });
        Self { resolver, timeout }
    }

    async fn lookup_mx(&self, domain: &str) -> DnsOutcome {
        match self.resolver.mx_lookup(domain).await {
            Ok(lookup) if lookup.iter().next().is_some() => DnsOutcome::Found,
            Ok(_) => DnsOutcome::NoRecords,
            Err(e) => DnsOutcome::from_error(&e),
        }
    }

    async fn lookup_ip(&self, domain: &str) -> DnsOutcome {
        match self.resolver.lookup_ip(domain).await {
            Ok(lookup) if lookup.iter().next().is_some() => DnsOutcome::Found,
            Ok(_) => DnsOutcome::NoRecords,
            Err(e) => DnsOutcome::from_error(&e),
        }
    }
}

#[async_trait]
impl DomainResolver for SystemResolver {
    async fn resolves(&self, domain: &str) -> Result<bool, CheckError> {
        // 末尾加点避免搜索域拼接
        let fqdn = format!("{}.", domain.trim_end_matches('.'));
        let lookup = async {
            let mx = self.lookup_mx(&fqdn).await;
            mail_domain_exists(mx, || self.lookup_ip(&fqdn)).await
        };
        match tokio::time::timeout(self.timeout, lookup).await {
            Ok(result) => result,
            Err(_) => Err(CheckError::Transient(format!(
                "dns lookup timeout for {}",
                domain
            ))),
        }
    }
}

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
});

static DISPOSABLE_DOMAINS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "tempmail.com",
        "tempmail.net",
        "tempmail.org",
        "tempmail.io",
        "tempmail.plus",
        "tempmail.ninja",
        "tempmail.xyz",
        "tempmail.dev",
        "tempmailaddress.com",
        "throwawaymail.com",
        "throwawaymail.net",
        "mailinator.com",
        "mailinator.net",
        "disposablemail.com",
        "guerrillamail.com",
        "10minutemail.com",
        "yopmail.com",
        "trashmail.com",
    ]
    .into_iter()
    .collect()
});

const ROLE_PREFIXES: &[&str] = &[
    "admin",
    "administrator",
    "webmaster",
    "postmaster",
    "hostmaster",
    "info",
    "contact",
    "support",
    "help",
    "helpdesk",
    "sales",
    "marketing",
    "billing",
    "accounts",
    "careers",
    "jobs",
    "hr",
    "abuse",
    "security",
    "noc",
    "privacy",
    "legal",
];

const KNOWN_DOMAINS: &[&str] = &[
    "gmail.com",
    "yahoo.com",
    "hotmail.com",
    "outlook.com",
    "icloud.com",
    "protonmail.com",
    "aol.com",
    "live.com",
    "gmx.com",
    "yandex.com",
    "zoho.com",
    "fastmail.com",
];

/// 基于规则的默认校验实现
///
/// 语法正则、一次性域名集合、角色邮箱前缀、常见域名的编辑距离拼写检查，
/// 以及可选的在线域名解析。
pub struct RuleBasedChecker {
    resolver: Option<Arc<dyn DomainResolver>>,
    typo_max_distance: usize,
}

impl RuleBasedChecker {
    /// 创建新的规则校验器
    ///
    /// # 参数
    ///
    /// * `resolver` - 域名解析器，为 None 时跳过在线检查
    /// * `typo_max_distance` - 拼写建议允许的最大编辑距离
    pub fn new(resolver: Option<Arc<dyn DomainResolver>>, typo_max_distance: usize) -> Self {
        Self {
            resolver,
            typo_max_distance,
        }
    }

    /// 不做在线检查的校验器
    pub fn offline() -> Self {
        Self::new(None, 2)
    }

    fn check_syntax(address: &str) -> bool {
        if !EMAIL_PATTERN.is_match(address) {
            return false;
        }
        let Some((local, domain)) = address.rsplit_once('@') else {
            return false;
        };
        local.len() <= 64
            && domain.len() <= 255
            && !local.contains("..")
            && !domain.contains("..")
            && !local.starts_with('.')
            && !local.ends_with('.')
    }

    fn is_role_based(local: &str) -> bool {
        let local = local.to_lowercase();
        ROLE_PREFIXES.iter().any(|prefix| {
            local == *prefix
                || local
                    .strip_prefix(prefix)
                    .and_then(|rest| rest.chars().next())
                    .is_some_and(|c| !c.is_ascii_alphanumeric())
        })
    }

    fn suggest_domain(&self, domain: &str) -> Option<&'static str> {
        if KNOWN_DOMAINS.contains(&domain) {
            return None;
        }
        KNOWN_DOMAINS
            .iter()
            .map(|known| (*known, strsim::damerau_levenshtein(domain, known)))
            // 短域名容易误判，距离需要相对域名长度足够小
            .filter(|(known, d)| *d <= self.typo_max_distance && d * 4 <= known.len())
            .min_by_key(|(_, d)| *d)
            .map(|(known, _)| known)
    }

    fn bounce_risk(report: &CheckReport) -> BounceRisk {
        if !report.syntactically_valid
            || report.is_disposable
            || report.domain_resolvable == Some(false)
        {
            BounceRisk::High
        } else if report.is_role_based || report.suggested_correction.is_some() {
            BounceRisk::Medium
        } else {
            BounceRisk::Low
        }
    }
}

#[async_trait]
impl AddressCheck for RuleBasedChecker {
    async fn check(&self, address: &str) -> Result<CheckReport, CheckError> {
        let trimmed = address.trim();
        let syntactically_valid = Self::check_syntax(trimmed);

        let (local, domain) = match trimmed.rsplit_once('@') {
            Some((local, domain)) => (local.to_string(), domain.to_lowercase()),
            None => (trimmed.to_string(), String::new()),
        };
        let normalized = if domain.is_empty() {
            trimmed.to_string()
        } else {
            format!("{}@{}", local, domain)
        };

        let mut report = CheckReport {
            normalized,
            syntactically_valid,
            is_disposable: DISPOSABLE_DOMAINS.contains(domain.as_str()),
            is_role_based: Self::is_role_based(&local),
            suggested_correction: None,
            domain_resolvable: None,
            bounce_risk: BounceRisk::High,
        };

        if syntactically_valid {
            report.suggested_correction = self
                .suggest_domain(&domain)
                .map(|known| format!("{}@{}", local, known));

            if let Some(resolver) = &self.resolver {
                if !report.is_disposable {
                    report.domain_resolvable = Some(resolver.resolves(&domain).await?);
                }
            }
        }

        report.bounce_risk = Self::bounce_risk(&report);
        debug!(address = %report.normalized, risk = %report.bounce_risk, "Address checked");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedResolver(Result<bool, CheckError>, AtomicUsize);

    #[async_trait]
    impl DomainResolver for FixedResolver {
        async fn resolves(&self, _domain: &str) -> Result<bool, CheckError> {
            self.1.fetch_add(1, Ordering::SeqCst);
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn test_syntax_check() {
        let checker = RuleBasedChecker::offline();

        let ok = checker.check("john.doe@example.com").await.unwrap();
        assert!(ok.syntactically_valid);
        assert_eq!(ok.bounce_risk, BounceRisk::Low);

        for bad in ["bad-address", "a@b", "a..b@example.com", "@example.com", ""] {
            let report = checker.check(bad).await.unwrap();
            assert!(!report.syntactically_valid, "{} should be rejected", bad);
            assert_eq!(report.bounce_risk, BounceRisk::High);
        }
    }

    #[tokio::test]
    async fn test_disposable_and_role_flags() {
        let checker = RuleBasedChecker::offline();

        let report = checker.check("someone@Mailinator.com").await.unwrap();
        assert!(report.is_disposable);
        assert_eq!(report.normalized, "someone@mailinator.com");

        let report = checker.check("support@example.com").await.unwrap();
        assert!(report.is_role_based);
        assert_eq!(report.bounce_risk, BounceRisk::Medium);

        let report = checker.check("helena@example.com").await.unwrap();
        assert!(!report.is_role_based);
    }

    #[tokio::test]
    async fn test_typo_suggestion() {
        let checker = RuleBasedChecker::offline();

        let report = checker.check("jane@gmial.com").await.unwrap();
        assert_eq!(report.suggested_correction.as_deref(), Some("jane@gmail.com"));

        let report = checker.check("jane@gmail.com").await.unwrap();
        assert!(report.suggested_correction.is_none());

        let report = checker.check("jane@abc.com").await.unwrap();
        assert!(report.suggested_correction.is_none());
    }

    #[tokio::test]
    async fn test_resolver_results_propagate() {
        let resolver = Arc::new(FixedResolver(Ok(false), AtomicUsize::new(0)));
        let checker = RuleBasedChecker::new(Some(resolver.clone()), 2);
        let report = checker.check("a@nowhere.example").await.unwrap();
        assert_eq!(report.domain_resolvable, Some(false));
        assert_eq!(report.bounce_risk, BounceRisk::High);

        // 语法错误的地址不做在线检查
        checker.check("bad-address").await.unwrap();
        assert_eq!(resolver.1.load(Ordering::SeqCst), 1);

        let failing = Arc::new(FixedResolver(
            Err(CheckError::Transient("timeout".into())),
            AtomicUsize::new(0),
        ));
        let checker = RuleBasedChecker::new(Some(failing), 2);
        let err = checker.check("a@example.com").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_mx_only_domain_is_resolvable() {
        // 有 MX 记录时不再查询 A/AAAA，回退查询的失败结果不会被看到
        let exists = mail_domain_exists(DnsOutcome::Found, || async {
            DnsOutcome::Failed("no A record".into())
        })
        .await
        .unwrap();
        assert!(exists);
    }

    #[tokio::test]
    async fn test_implicit_mx_falls_back_to_address_records() {
        let exists = mail_domain_exists(DnsOutcome::NoRecords, || async { DnsOutcome::Found })
            .await
            .unwrap();
        assert!(exists);

        let exists =
            mail_domain_exists(DnsOutcome::NoRecords, || async { DnsOutcome::NoRecords })
                .await
                .unwrap();
        assert!(!exists);
    }

    #[tokio::test]
    async fn test_nxdomain_and_lookup_failures() {
        let exists = mail_domain_exists(DnsOutcome::NoDomain, || async { DnsOutcome::Found })
        .await
        .unwrap();
        assert!(!exists);

        let err = mail_domain_exists(DnsOutcome::Failed("timed out".into()), || async {
            DnsOutcome::Found
        })
        .await
        .unwrap_err();
        assert!(err.is_transient());

        let err = mail_domain_exists(DnsOutcome::NoRecords, || async {
            DnsOutcome::Failed("connection refused".into())
        })
        .await
        .unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_resolver_timeout_is_a_failure() {
        let err = ResolveError::from(ResolveErrorKind::Timeout);
        assert!(matches!(DnsOutcome::from_error(&err), DnsOutcome::Failed(_)));
    }
}
