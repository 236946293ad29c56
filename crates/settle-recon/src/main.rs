//! 정산 파이프라인 실행 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 대기 정산 재계산
//! settle run -s pending
//!
//! # 입금 정산 재계산 (기준일 지정, 재처리용)
//! settle run -s arrival -d 2025-03-31
//!
//! # 설정 파일 지정
//! settle run -s pending -c config/default.toml
//! ```
//!
//! 연결 주소는 `DATABASE_URL` / `REDIS_URL` 환경 변수로 받고, 풀
//! 크기·타임아웃·TTL·로깅 등 나머지 설정은 설정 파일과 `SETTLE__*`
//! 오버라이드에서 가져옵니다.

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use settle_core::config::AppConfig;
use settle_core::domain::{CurrencyConverter, SettlementSource};
use settle_core::logging::{init_logging, LogConfig, LogFormat};
use settle_data::storage::postgres::{Database, DatabaseConfig};
use settle_data::storage::redis::{RedisCache, RedisConfig};
use settle_recon::ReconPipeline;

#[derive(Parser)]
#[command(name = "settle")]
#[command(about = "정산 재계산 파이프라인 실행 도구", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 정산 재계산 실행
    Run {
        /// 정산 소스 (pending: 대기, arrival: 입금 30일)
        #[arg(short, long)]
        source: String,

        /// 기준일 (YYYY-MM-DD, 생략 시 오늘)
        #[arg(short, long)]
        date: Option<String>,

        /// 설정 파일 경로
        #[arg(short, long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            source,
            date,
            config,
        } => run(&source, date.as_deref(), config.as_deref()).await,
    }
}

async fn run(source: &str, date: Option<&str>, config_path: Option<&str>) -> Result<()> {
    let source = parse_source(source)?;

    let app_config = match config_path {
        Some(path) => AppConfig::load(path).context("Failed to load config file")?,
        None => AppConfig::default(),
    };

    // 설정 파일이 있으면 logging 섹션을, 없으면 RUST_LOG/LOG_FORMAT을 따른다
    let logging = match config_path {
        Some(_) => log_config(&app_config.logging),
        None => LogConfig::from_env(),
    };
    init_logging(logging).map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
    let database =
        Database::connect(&database_config(database_url, &app_config.database)).await?;

    // Redis는 선택적이다. 없으면 실행 잠금과 캐시 무효화 없이 동작한다.
    let cache = match std::env::var("REDIS_URL") {
        Ok(url) => match RedisCache::connect(&redis_config(url, &app_config.redis)).await {
            Ok(cache) => Some(cache),
            Err(e) => {
                warn!(error = %e, "Redis unavailable, running without run lock and cache eviction");
                None
            }
        },
        Err(_) => None,
    };

    let converter = CurrencyConverter::new(&app_config.currency);
    let pipeline = ReconPipeline::new(
        database.pool().clone(),
        cache,
        converter,
        app_config.pipeline.clone(),
    );

    let report = match date {
        Some(raw) => {
            let today = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .context("Invalid date, expected YYYY-MM-DD")?;
            pipeline.run_for_date(source, today).await?
        }
        None => pipeline.run(source).await?,
    };

    info!(
        source = %report.source,
        processed = report.processed,
        upserted = report.upserted,
        failed = report.failed.len(),
        "Reconciliation run complete"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.failed.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}

fn parse_source(raw: &str) -> Result<SettlementSource> {
    match raw.to_lowercase().as_str() {
        "pending" => Ok(SettlementSource::Pending),
        "arrival" => Ok(SettlementSource::Arrival),
        other => Err(anyhow!(
            "Unknown settlement source: {} (expected pending or arrival)",
            other
        )),
    }
}

/// logging 섹션을 로그 설정으로 변환합니다. 알 수 없는 형식은 pretty.
fn log_config(cfg: &settle_core::config::LoggingConfig) -> LogConfig {
    let format: LogFormat = cfg.format.parse().unwrap_or_default();
    LogConfig::new(cfg.level.clone()).with_format(format)
}

/// database 섹션을 연결 설정에 적용합니다. URL은 환경 변수에서 온다.
fn database_config(url: String, cfg: &settle_core::config::DatabaseConfig) -> DatabaseConfig {
    DatabaseConfig {
        url,
        max_connections: cfg.max_connections,
        connect_timeout_secs: cfg.connection_timeout_secs,
        idle_timeout_secs: cfg.idle_timeout_secs,
        ..Default::default()
    }
}

/// redis 섹션을 연결 설정에 적용합니다.
fn redis_config(url: String, cfg: &settle_core::config::RedisConfig) -> RedisConfig {
    RedisConfig {
        url,
        default_ttl_secs: cfg.default_ttl_secs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_source() {
        assert_eq!(parse_source("pending").unwrap(), SettlementSource::Pending);
        assert_eq!(parse_source("ARRIVAL").unwrap(), SettlementSource::Arrival);
        assert!(parse_source("refund").is_err());
    }

    #[test]
    fn test_database_section_applied() {
        let section = settle_core::config::DatabaseConfig {
            max_connections: 3,
            connection_timeout_secs: 7,
            idle_timeout_secs: 99,
        };
        let cfg = database_config("postgresql://settle@db/settle".to_string(), &section);

        assert_eq!(cfg.url, "postgresql://settle@db/settle");
        assert_eq!(cfg.max_connections, 3);
        assert_eq!(cfg.connect_timeout_secs, 7);
        assert_eq!(cfg.idle_timeout_secs, 99);
    }

    #[test]
    fn test_redis_section_applied() {
        let section = settle_core::config::RedisConfig {
            default_ttl_secs: 42,
        };
        let cfg = redis_config("redis://cache:6379/0".to_string(), &section);

        assert_eq!(cfg.url, "redis://cache:6379/0");
        assert_eq!(cfg.default_ttl_secs, 42);
    }

    #[test]
    fn test_logging_section_applied() {
        let section = settle_core::config::LoggingConfig {
            level: "debug".to_string(),
            format: "json".to_string(),
        };
        let cfg = log_config(&section);
        assert_eq!(cfg.level, "debug");
        assert_eq!(cfg.format, LogFormat::Json);

        // 알 수 없는 형식은 기본값으로
        let section = settle_core::config::LoggingConfig {
            level: "info".to_string(),
            format: "xml".to_string(),
        };
        assert_eq!(log_config(&section).format, LogFormat::Pretty);
    }
}
