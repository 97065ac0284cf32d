// ==========================================
// 收获记录导入系统 - 命令行入口
// ==========================================
// 子命令: init-db / import / search / summary / options / batches / config
// 输出: 结果写 stdout（JSON / CSV），日志写 stderr
// ==========================================

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use harvest_ingest::api::{HarvestApi, ImportApi};
use harvest_ingest::config::{ConfigManager, IngestConfig};
use harvest_ingest::db::{get_default_db_path, open_and_init, read_schema_version, DB_PATH_ENV};
use harvest_ingest::domain::HarvestFilter;
use harvest_ingest::logging;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "harvest-ingest")]
#[command(version, about = "収穫記録 CSV/Excel の正規化・重複排除取込")]
struct Cli {
    /// 数据库文件路径（默认: 用户数据目录/harvest-ingest/harvest.db）
    #[arg(long, global = true, env = DB_PATH_ENV)]
    db: Option<String>,

    /// 默认日志级别（RUST_LOG 优先）
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 创建数据库表结构
    InitDb,

    /// 导入文件或目录（*.csv / *.xlsx）
    Import {
        /// 文件或目录
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// 忽略导入日志，已导入过的路径也重新导入
        #[arg(long)]
        force: bool,

        /// 未来日判定基准（YYYY-MM-DD，默认今天）
        #[arg(long, value_parser = parse_date)]
        today: Option<NaiveDate>,

        /// 只执行解析与校验，不写入数据库
        #[arg(long)]
        dry_run: bool,
    },

    /// 条件查询，输出 CSV
    Search {
        #[command(flatten)]
        filter: FilterArgs,

        /// 写入文件（UTF-8 BOM），省略时输出到 stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// 条件汇总（JSON）
    Summary {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// 可选筛选项: 日期范围、企业、作物（JSON）
    Options,

    /// 最近的导入批次（JSON）
    Batches {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// 导入配置
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// 显示生效配置
    Show,
    /// 设置配置项（如 ingest.future_date_policy FAIL_FILE）
    Set { key: String, value: String },
}

#[derive(Args)]
struct FilterArgs {
    /// 开始日期（含）
    #[arg(long, value_parser = parse_date)]
    from: Option<NaiveDate>,

    /// 结束日期（含）
    #[arg(long, value_parser = parse_date)]
    to: Option<NaiveDate>,

    /// 企业名（可多次指定）
    #[arg(long = "company")]
    companies: Vec<String>,

    /// 作物名（可多次指定）
    #[arg(long = "crop")]
    crops: Vec<String>,
}

impl FilterArgs {
    fn into_filter(self) -> HarvestFilter {
        HarvestFilter {
            date_from: self.from,
            date_to: self.to,
            companies: self.companies,
            crops: self.crops,
        }
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| format!("日期格式应为 YYYY-MM-DD: {}", e))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_with_level(&cli.log_level);

    let db_path = cli.db.unwrap_or_else(get_default_db_path);
    info!(db_path = %db_path, version = harvest_ingest::VERSION, "使用数据库");

    match cli.command {
        Command::InitDb => {
            let conn = open_and_init(&db_path).context("数据库初始化失败")?;
            let version = read_schema_version(&conn)?;
            println!("{} (schema_version={:?})", db_path, version);
        }

        Command::Import {
            paths,
            force,
            today,
            dry_run,
        } => {
            let today = today.unwrap_or_else(|| Local::now().date_naive());
            let api = ImportApi::new(db_path);

            if dry_run {
                print_json(&api.dry_run_paths(&paths, today)?)?;
                return Ok(());
            }

            let responses = api.import_paths(&paths, today, force)?;
            print_json(&responses)?;

            let failed = responses.iter().filter(|r| r.status == "failed").count();
            if failed > 0 {
                bail!("{} 个文件导入失败", failed);
            }
        }

        Command::Search { filter, out } => {
            let api = HarvestApi::open(&db_path)?;
            let filter = filter.into_filter();
            match out {
                Some(path) => {
                    let rows = api.export_csv_to(&filter, &path)?;
                    eprintln!("{} 行 → {}", rows, path.display());
                }
                None => {
                    let bytes = api.export_csv(&filter)?;
                    // 终端输出不带 BOM
                    let text = String::from_utf8_lossy(bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&bytes));
                    print!("{}", text);
                }
            }
        }

        Command::Summary { filter } => {
            let api = HarvestApi::open(&db_path)?;
            print_json(&api.summary(&filter.into_filter())?)?;
        }

        Command::Options => {
            let api = HarvestApi::open(&db_path)?;
            print_json(&api.filter_options()?)?;
        }

        Command::Batches { limit } => {
            let api = ImportApi::new(db_path);
            print_json(&api.recent_batches(limit)?)?;
        }

        Command::Config { action } => {
            let manager = ConfigManager::new(&db_path)?;
            match action {
                ConfigAction::Show => {
                    let config = IngestConfig::load(&manager)?;
                    print_json(&config)?;
                }
                ConfigAction::Set { key, value } => {
                    manager.set_global_config_value(&key, &value)?;
                    println!("{} = {}", key, value);
                }
            }
        }
    }

    Ok(())
}
